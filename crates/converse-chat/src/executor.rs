//! Turn execution against the remote or local backend.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use converse_local_ai::{GenerationParams, LocalAIError};

use crate::client::{ChatCompletionRequest, ChatMessage, CompletionTransport, TransportError};
use crate::config::Configuration;
use crate::local::ModelResolver;
use crate::router::Backend;
use crate::turn::{Turn, TurnClock};

/// Failure of a single backend attempt.
#[derive(Debug, Error)]
enum BackendError {
    #[error(transparent)]
    Remote(#[from] TransportError),
    #[error(transparent)]
    Local(#[from] LocalAIError),
}

/// Runs one prompt on one backend and turns the outcome into a [`Turn`].
///
/// The remote request carries the engineered prompt as a single user
/// message; conversation context travels inside the prompt text.
pub struct TurnExecutor {
    transport: Arc<dyn CompletionTransport>,
    resolver: Arc<dyn ModelResolver>,
    api_key: String,
    clock: Arc<TurnClock>,
}

impl TurnExecutor {
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        resolver: Arc<dyn ModelResolver>,
        api_key: impl Into<String>,
        clock: Arc<TurnClock>,
    ) -> Self {
        Self {
            transport,
            resolver,
            api_key: api_key.into(),
            clock,
        }
    }

    /// Clock used to stamp produced turns.
    pub fn clock(&self) -> &Arc<TurnClock> {
        &self.clock
    }

    /// Execute `prompt` once.
    ///
    /// Success yields an Assistant turn; every failure yields a System turn
    /// reading `"Error: <message>"`.
    pub async fn execute(&self, prompt: &str, backend: Backend, config: &Configuration) -> Turn {
        let result = match backend {
            Backend::Remote => self.execute_remote(prompt, config).await,
            Backend::Local => self.execute_local(prompt, config).await,
        };

        match result {
            Ok(text) => Turn::assistant(text, &self.clock),
            Err(e) => {
                warn!("{} backend failed: {}", backend, e);
                Turn::system(format!("Error: {}", e), &self.clock)
            }
        }
    }

    async fn execute_remote(
        &self,
        prompt: &str,
        config: &Configuration,
    ) -> Result<String, BackendError> {
        let request = ChatCompletionRequest {
            model: config.active_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        debug!("Calling completion API with model {}", request.model);
        let response = self.transport.complete(&self.api_key, &request).await?;

        let text = response
            .first_content()
            .ok_or(TransportError::EmptyResponse)?
            .to_string();
        Ok(text)
    }

    async fn execute_local(
        &self,
        prompt: &str,
        config: &Configuration,
    ) -> Result<String, BackendError> {
        let model = self.resolver.resolve(&config.active_model).await?;
        info!("Generating with local model {}", config.active_model);

        let params = GenerationParams {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        Ok(model.generate(prompt, params).await?)
    }
}
