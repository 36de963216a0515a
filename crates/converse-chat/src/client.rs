//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;

/// Errors from the remote transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response from completion API")]
    EmptyResponse,
    #[error("missing API key - set CONVERSE_API_KEY or OPENAI_API_KEY")]
    MissingApiKey,
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),
}

/// A message in the completion request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request to the chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Response from the chat completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if it carries any text.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .filter(|text| !text.trim().is_empty())
    }
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Transport for remote completions.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Send `request` authorized by `api_key`.
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, TransportError>;
}

/// HTTP implementation of [`CompletionTransport`].
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ChatCompletionClient {
    /// Create a new client for the configured base URL.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionTransport for ChatCompletionClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, TransportError> {
        if api_key.is_empty() {
            return Err(TransportError::MissingApiKey);
        }
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| TransportError::InvalidApiKey(e.to_string()))?;

        debug!("POST {} (model {})", self.endpoint, request.model);
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, auth)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-test".to_string(),
            messages: vec![ChatMessage::user("Hello")],
            temperature: 0.5,
            max_tokens: 32,
        }
    }

    fn client_for(server: &MockServer) -> ChatCompletionClient {
        let config = ClientConfig::builder().base_url(format!("{}/v1/", server.uri())).build();
        ChatCompletionClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "gpt-test",
                "messages": [{ "role": "user", "content": "Hello" }],
                "temperature": 0.5,
                "max_tokens": 32
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cmpl-1",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Hi!" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 }
            })))
            .mount(&server)
            .await;

        let response = client_for(&server).complete("sk-test", &request()).await.unwrap();
        assert_eq!(response.id, "cmpl-1");
        assert_eq!(response.first_content(), Some("Hi!"));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(5));
    }

    #[tokio::test]
    async fn test_api_error_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sk-bad", &request()).await.unwrap_err();
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("sk-test", &request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Json(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start().await;
        let err = client_for(&server).complete("", &request()).await.unwrap_err();
        assert!(matches!(err, TransportError::MissingApiKey));
    }

    #[test]
    fn test_first_content_skips_blank() {
        let response: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  " } }]
        }))
        .unwrap();
        assert_eq!(response.first_content(), None);
    }
}
