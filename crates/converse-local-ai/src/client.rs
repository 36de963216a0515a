//! HTTP client for llama-server's native completion API.

use serde::{Deserialize, Serialize};

use crate::error::LocalAIError;
use crate::DEFAULT_PORT;

/// Client for communicating with llama-server.
#[derive(Debug, Clone)]
pub struct LlamaCppClient {
    client: reqwest::Client,
    base_url: String,
}

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 150,
        }
    }
}

/// Raw prompt completion request (`POST /completion`).
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stream: bool,
}

/// Completion response; only the generated text is used.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    #[allow(dead_code)]
    stop: bool,
}

impl LlamaCppClient {
    /// Create a new client with default URL (localhost:11435).
    pub fn new() -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", DEFAULT_PORT))
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a new client with a custom port on localhost.
    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", port))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the server is running and healthy.
    pub async fn check_health(&self) -> Result<(), LocalAIError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    LocalAIError::ServerNotRunning(self.base_url.clone())
                } else {
                    LocalAIError::Http(e)
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LocalAIError::ServerNotRunning(self.base_url.clone()))
        }
    }

    /// Generate a continuation of `prompt`.
    ///
    /// The prompt is sent verbatim; callers are expected to have already
    /// framed it (personality, context, role labels).
    pub async fn complete(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LocalAIError> {
        let request = CompletionRequest {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let url = format!("{}/completion", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LocalAIError::ServerNotRunning(self.base_url.clone())
                } else {
                    LocalAIError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LocalAIError::Api(format!("{}: {}", status, text)));
        }

        let completion: CompletionResponse = response.json().await?;
        Ok(completion.content.trim().to_string())
    }
}

impl Default for LlamaCppClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_url() {
        let client = LlamaCppClient::new();
        assert_eq!(client.base_url(), "http://127.0.0.1:11435");
    }

    #[test]
    fn test_custom_port() {
        let client = LlamaCppClient::with_port(9000);
        assert_eq!(client.base_url(), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_complete_sends_prompt_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "User: hi\nAssistant:",
                "n_predict": 64,
                "stream": false
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "content": " Hello there!\n", "stop": true })),
            )
            .mount(&server)
            .await;

        let client = LlamaCppClient::with_url(server.uri());
        let params = GenerationParams {
            temperature: 0.2,
            max_tokens: 64,
        };
        let text = client.complete("User: hi\nAssistant:", params).await.unwrap();
        assert_eq!(text, "Hello there!");
    }

    #[tokio::test]
    async fn test_complete_reports_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .mount(&server)
            .await;

        let client = LlamaCppClient::with_url(server.uri());
        let err = client
            .complete("hi", GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LocalAIError::Api(ref msg) if msg.contains("loading model")));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client = LlamaCppClient::with_url("http://127.0.0.1:9");
        let err = client.check_health().await.unwrap_err();
        assert!(matches!(err, LocalAIError::ServerNotRunning(_)));
    }
}
