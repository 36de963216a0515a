//! JSON-file stores.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use super::{write_atomic, PreferenceStore, PreferenceTransform, StoreError, TranscriptStore};
use crate::config::{ConfigError, Preferences};
use crate::turn::Turn;

async fn read_json<T>(path: &Path) -> Result<Option<T>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Transcript persisted as a JSON array of turns.
///
/// The whole file is rewritten on each mutation; subscribers are notified
/// only after the write succeeds.
pub struct JsonTranscriptStore {
    path: PathBuf,
    turns: watch::Sender<Vec<Turn>>,
    write_lock: Mutex<()>,
}

impl JsonTranscriptStore {
    /// Open the transcript at `path`, starting empty if the file is absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let turns: Vec<Turn> = read_json(&path).await?.unwrap_or_default();
        debug!("Opened transcript {:?} with {} turns", path, turns.len());

        let (tx, _rx) = watch::channel(turns);
        Ok(Self {
            path,
            turns: tx,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, turns: Vec<Turn>) -> Result<(), StoreError> {
        write_atomic(&self.path, serde_json::to_vec_pretty(&turns)?).await?;
        self.turns.send_replace(turns);
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for JsonTranscriptStore {
    async fn read_all(&self) -> Result<Vec<Turn>, StoreError> {
        Ok(self.turns.borrow().clone())
    }

    async fn append(&self, turn: Turn) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut turns = self.turns.borrow().clone();
        turns.push(turn);
        self.persist(turns).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.persist(Vec::new()).await
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Turn>> {
        self.turns.subscribe()
    }
}

/// Preferences persisted as a single JSON object.
pub struct JsonPreferenceStore {
    path: PathBuf,
    record: watch::Sender<Preferences>,
    write_lock: Mutex<()>,
}

impl JsonPreferenceStore {
    /// Open the preferences at `path`; a missing file reads as an empty record.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let record: Preferences = read_json(&path).await?.unwrap_or_default();

        let (tx, _rx) = watch::channel(record);
        Ok(Self {
            path,
            record: tx,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreferenceStore for JsonPreferenceStore {
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

        let bytes = serde_json::to_vec_pretty(&updated).map_err(StoreError::from)?;
        write_atomic(&self.path, bytes).await?;
        self.record.send_replace(updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::turn::{Role, TurnClock};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_transcript_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat").join("transcript.json");
        let clock = TurnClock::new();

        let store = JsonTranscriptStore::open(&path).await.unwrap();
        store.append(Turn::user("hello", &clock)).await.unwrap();
        store.append(Turn::system("Error: offline", &clock)).await.unwrap();
        drop(store);

        let reopened = JsonTranscriptStore::open(&path).await.unwrap();
        let turns = reopened.read_all().await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::System);
        assert!(turns[0].id < turns[1].id);
    }

    #[tokio::test]
    async fn test_transcript_clear_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let clock = TurnClock::new();

        let store = JsonTranscriptStore::open(&path).await.unwrap();
        store.append(Turn::user("hello", &clock)).await.unwrap();
        store.clear().await.unwrap();

        let reopened = JsonTranscriptStore::open(&path).await.unwrap();
        assert!(reopened.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_transcript_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        std::fs::write(&path, b"not json").unwrap();

        let result = JsonTranscriptStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_preferences_written_as_full_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = JsonPreferenceStore::open(&path).await.unwrap();
        store
            .atomic_update(Box::new(|prefs: Preferences| -> Result<Preferences, ConfigError> {
                let mut config = Configuration::from_preferences(&prefs)?;
                config.online_mode = false;
                Ok(config.to_preferences())
            }))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["is_online_mode"], false);
        assert_eq!(raw["personality"], "FRIENDLY");
        assert_eq!(raw["max_tokens"], 150);

        let reopened = JsonPreferenceStore::open(&path).await.unwrap();
        let config = Configuration::from_preferences(&reopened.read_snapshot().await.unwrap()).unwrap();
        assert!(!config.online_mode);
    }
}
