//! In-memory stores.

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::{PreferenceStore, PreferenceTransform, StoreError, TranscriptStore};
use crate::config::{ConfigError, Preferences};
use crate::turn::Turn;

/// Transcript kept only for the life of the process.
pub struct MemoryTranscriptStore {
    turns: watch::Sender<Vec<Turn>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::with_turns(Vec::new())
    }

    pub fn with_turns(turns: Vec<Turn>) -> Self {
        let (tx, _rx) = watch::channel(turns);
        Self { turns: tx }
    }
}

impl Default for MemoryTranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn read_all(&self) -> Result<Vec<Turn>, StoreError> {
        Ok(self.turns.borrow().clone())
    }

    async fn append(&self, turn: Turn) -> Result<(), StoreError> {
        self.turns.send_modify(|turns| turns.push(turn));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.turns.send_replace(Vec::new());
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Turn>> {
        self.turns.subscribe()
    }
}

/// Preferences kept only for the life of the process.
pub struct MemoryPreferenceStore {
    record: watch::Sender<Preferences>,
    write_lock: Mutex<()>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::with_preferences(Preferences::default())
    }

    pub fn with_preferences(prefs: Preferences) -> Self {
        let (tx, _rx) = watch::channel(prefs);
        Self {
            record: tx,
            write_lock: Mutex::new(()),
        }
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn read_snapshot(&self) -> Result<Preferences, StoreError> {
        Ok(self.record.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.record.subscribe()
    }

    async fn atomic_update(&self, transform: PreferenceTransform) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let current = self.record.borrow().clone();
        let updated = transform(current)?;
        self.record.send_replace(updated);
        Ok(())
    }
}
