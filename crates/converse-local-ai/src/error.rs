//! Error types for local model operations.

use thiserror::Error;

/// Errors that can occur during local model operations.
#[derive(Debug, Error)]
pub enum LocalAIError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error: {0}")]
    Api(String),

    /// Server is not running or not reachable.
    #[error("Local model server not running at {0}")]
    ServerNotRunning(String),

    /// Server failed to start.
    #[error("Failed to start server: {0}")]
    ServerStartFailed(String),

    /// Model not found locally.
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// Model file exists but cannot be served by llama-server.
    #[error("Model '{0}' has an unsupported format (expected .gguf)")]
    UnsupportedFormat(String),

    /// Model download failed.
    #[error("Failed to download model: {0}")]
    DownloadFailed(String),

    /// Checksum verification failed.
    #[error("Model checksum mismatch. Expected: {expected}, got: {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// llama-server binary not found.
    #[error("llama-server binary not found at {0}")]
    ServerBinaryNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for server to start.
    #[error("Timeout waiting for server to become ready")]
    ServerStartTimeout,
}
