//! Local model access for the executor.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use converse_local_ai::{
    GenerationParams, LlamaCppClient, LlamaCppServer, LocalAIError, ModelManager, DEFAULT_PORT,
};

/// A loaded model that can continue a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams)
        -> Result<String, LocalAIError>;
}

/// Turns a model id into a loaded [`TextGenerator`].
#[async_trait]
pub trait ModelResolver: Send + Sync {
    /// Fails with [`LocalAIError::ModelNotFound`] when the model is not installed.
    async fn resolve(&self, model_id: &str) -> Result<Arc<dyn TextGenerator>, LocalAIError>;
}

/// Handle to a model served by a running llama-server.
pub struct LlamaModel {
    model_id: String,
    client: LlamaCppClient,
}

impl LlamaModel {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl TextGenerator for LlamaModel {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LocalAIError> {
        self.client.complete(prompt, params).await
    }
}

struct LoadedModel {
    server: LlamaCppServer,
    handle: Arc<LlamaModel>,
}

/// [`ModelResolver`] over installed GGUF models.
///
/// Keeps at most one model loaded; resolving a different id stops the
/// previous server before starting a new one.
pub struct LocalModelResolver {
    manager: ModelManager,
    binary: Option<PathBuf>,
    port: u16,
    ready_timeout: Duration,
    loaded: Mutex<Option<LoadedModel>>,
}

impl LocalModelResolver {
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager,
            binary: None,
            port: DEFAULT_PORT,
            ready_timeout: Duration::from_secs(120),
            loaded: Mutex::new(None),
        }
    }

    /// Use a specific llama-server binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    /// Stop the loaded model, if any.
    pub async fn unload(&self) -> Result<(), LocalAIError> {
        if let Some(mut loaded) = self.loaded.lock().await.take() {
            info!("Unloading model '{}'", loaded.handle.model_id);
            loaded.server.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ModelResolver for LocalModelResolver {
    async fn resolve(&self, model_id: &str) -> Result<Arc<dyn TextGenerator>, LocalAIError> {
        let path = self
            .manager
            .find(model_id)
            .ok_or_else(|| LocalAIError::ModelNotFound(model_id.to_string()))?;

        if path.extension().and_then(|e| e.to_str()) != Some("gguf") {
            return Err(LocalAIError::UnsupportedFormat(model_id.to_string()));
        }

        let mut loaded = self.loaded.lock().await;

        if let Some(current) = loaded.as_mut() {
            if current.handle.model_id == model_id && current.server.is_running() {
                return Ok(current.handle.clone());
            }
        }

        if let Some(mut previous) = loaded.take() {
            info!("Switching model from '{}' to '{}'", previous.handle.model_id, model_id);
            previous.server.shutdown().await?;
        }

        let mut server = LlamaCppServer::new(path).with_port(self.port);
        if let Some(binary) = &self.binary {
            server = server.with_binary(binary);
        }

        server.start()?;
        server.wait_ready(self.ready_timeout).await?;
        info!("Model '{}' loaded", model_id);

        let handle = Arc::new(LlamaModel {
            model_id: model_id.to_string(),
            client: server.client(),
        });
        *loaded = Some(LoadedModel {
            server,
            handle: handle.clone(),
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_resolve_missing_model() {
        let dir = tempdir().unwrap();
        let resolver = LocalModelResolver::new(ModelManager::with_dir(dir.path()));

        let err = resolver.resolve("default").await.err().unwrap();
        assert!(matches!(err, LocalAIError::ModelNotFound(ref id) if id == "default"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_onnx() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("vision.onnx"), b"x").unwrap();
        let resolver = LocalModelResolver::new(ModelManager::with_dir(dir.path()));

        let err = resolver.resolve("vision").await.err().unwrap();
        assert!(matches!(err, LocalAIError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_resolve_without_server_binary() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.gguf"), b"x").unwrap();
        let resolver = LocalModelResolver::new(ModelManager::with_dir(dir.path()))
            .with_binary(dir.path().join("no-such-binary"));

        let err = resolver.resolve("tiny").await.err().unwrap();
        assert!(matches!(err, LocalAIError::ServerBinaryNotFound(_)));
        assert!(resolver.loaded.lock().await.is_none());
    }
}
