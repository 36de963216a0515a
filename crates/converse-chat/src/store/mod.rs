//! Transcript and preference store contracts.
//!
//! The session only ever talks to these traits; the in-memory and JSON-file
//! implementations here are the reference collaborators.

mod json;
mod memory;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{ConfigError, Preferences};
use crate::turn::Turn;

pub use json::{JsonPreferenceStore, JsonTranscriptStore};
pub use memory::{MemoryPreferenceStore, MemoryTranscriptStore};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only log of conversation turns.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// All turns in append order.
    async fn read_all(&self) -> Result<Vec<Turn>, StoreError>;

    async fn append(&self, turn: Turn) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    /// Snapshot of the full transcript after every mutation.
    fn subscribe(&self) -> watch::Receiver<Vec<Turn>>;
}

/// Read-modify-write step applied by [`PreferenceStore::atomic_update`].
pub type PreferenceTransform =
    Box<dyn FnOnce(Preferences) -> Result<Preferences, ConfigError> + Send>;

/// Durable key/value preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn read_snapshot(&self) -> Result<Preferences, StoreError>;

    /// Records in the order they were written; intermediate values may be skipped.
    fn subscribe(&self) -> watch::Receiver<Preferences>;

    /// Apply `transform` to the current record and write the result, with no
    /// other update interleaving. Nothing is written if `transform` fails.
    async fn atomic_update(&self, transform: PreferenceTransform) -> Result<(), ConfigError>;
}

/// Write `bytes` next to `path` and rename over it.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
