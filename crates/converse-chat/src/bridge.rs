//! Live configuration view over a preference store.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::{ConfigError, Configuration, Personality, Preferences};
use crate::store::PreferenceStore;

/// Adapts a [`PreferenceStore`] into a stream of [`Configuration`] snapshots
/// and exposes updates as read-modify-write operations on the store.
///
/// Dropping the bridge stops forwarding and releases its store subscription.
pub struct ConfigurationBridge {
    store: Arc<dyn PreferenceStore>,
    view: watch::Receiver<Configuration>,
    forwarder: JoinHandle<()>,
}

impl ConfigurationBridge {
    /// Read the current configuration and start following store changes.
    ///
    /// Fails if the stored record names an unknown personality.
    pub async fn start(store: Arc<dyn PreferenceStore>) -> Result<Self, ConfigError> {
        let mut changes = store.subscribe();
        let initial = Configuration::from_preferences(&store.read_snapshot().await?)?;
        // The initial read already covers the current record
        let _ = changes.borrow_and_update();

        let (tx, view) = watch::channel(initial);
        let forwarder = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let prefs = changes.borrow_and_update().clone();
                match Configuration::from_preferences(&prefs) {
                    Ok(config) => {
                        debug!("Configuration updated: {:?}", config);
                        tx.send_replace(config);
                    }
                    Err(e) => {
                        error!("Invalid preferences, configuration view stopped: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            store,
            view,
            forwarder,
        })
    }

    /// Latest configuration snapshot.
    pub fn current(&self) -> Configuration {
        self.view.borrow().clone()
    }

    /// Subscribe to configuration snapshots; drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<Configuration> {
        self.view.clone()
    }

    /// Atomically apply `transform` to the stored configuration.
    ///
    /// The full record is written back, so fields the transform leaves alone
    /// keep whatever value a concurrent update gave them.
    pub async fn update<F>(&self, transform: F) -> Result<(), ConfigError>
    where
        F: FnOnce(Configuration) -> Configuration + Send + 'static,
    {
        self.store
            .atomic_update(Box::new(
                move |prefs: Preferences| -> Result<Preferences, ConfigError> {
                    let current = Configuration::from_preferences(&prefs)?;
                    Ok(transform(current).to_preferences())
                },
            ))
            .await
    }

    /// Flip between online and offline mode.
    pub async fn toggle_mode(&self) -> Result<(), ConfigError> {
        self.update(|mut c| {
            c.online_mode = !c.online_mode;
            c
        })
        .await
    }

    pub async fn set_connected(&self, connected: bool) -> Result<(), ConfigError> {
        self.update(move |mut c| {
            c.connected = connected;
            c
        })
        .await
    }

    pub async fn set_active_model(&self, model: impl Into<String>) -> Result<(), ConfigError> {
        let model = model.into();
        self.update(move |mut c| {
            c.active_model = model;
            c
        })
        .await
    }

    pub async fn set_personality(&self, personality: Personality) -> Result<(), ConfigError> {
        self.update(move |mut c| {
            c.personality = personality;
            c
        })
        .await
    }

    pub async fn set_temperature(&self, temperature: f32) -> Result<(), ConfigError> {
        self.update(move |mut c| {
            c.temperature = temperature;
            c
        })
        .await
    }

    pub async fn set_max_tokens(&self, max_tokens: u32) -> Result<(), ConfigError> {
        self.update(move |mut c| {
            c.max_tokens = max_tokens;
            c
        })
        .await
    }

    pub async fn set_custom_instructions(
        &self,
        instructions: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let instructions = instructions.into();
        self.update(move |mut c| {
            c.custom_instructions = instructions;
            c
        })
        .await
    }
}

impl Drop for ConfigurationBridge {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPreferenceStore;

    async fn bridge_over(prefs: Preferences) -> (ConfigurationBridge, Arc<MemoryPreferenceStore>) {
        let store = Arc::new(MemoryPreferenceStore::with_preferences(prefs));
        let bridge = ConfigurationBridge::start(store.clone()).await.unwrap();
        (bridge, store)
    }

    #[tokio::test]
    async fn test_defaults_for_empty_store() {
        let (bridge, _store) = bridge_over(Preferences::default()).await;
        assert_eq!(bridge.current(), Configuration::default());
    }

    #[tokio::test]
    async fn test_start_fails_on_unknown_personality() {
        let store = Arc::new(MemoryPreferenceStore::with_preferences(Preferences {
            personality: Some("GRUMPY".to_string()),
            ..Default::default()
        }));
        let result = ConfigurationBridge::start(store).await;
        assert!(matches!(result, Err(ConfigError::UnknownPersonality(_))));
    }

    #[tokio::test]
    async fn test_toggle_mode_roundtrip() {
        let (bridge, store) = bridge_over(Preferences {
            temperature: Some(0.2),
            custom_instructions: Some("Answer in French".to_string()),
            ..Default::default()
        })
        .await;

        bridge.toggle_mode().await.unwrap();

        let snapshot = Configuration::from_preferences(&store.read_snapshot().await.unwrap()).unwrap();
        assert!(!snapshot.online_mode);
        assert!(snapshot.connected);
        assert_eq!(snapshot.temperature, 0.2);
        assert_eq!(snapshot.custom_instructions, "Answer in French");
        assert_eq!(snapshot.personality, Personality::Friendly);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let (bridge, _store) = bridge_over(Preferences::default()).await;
        let mut rx = bridge.subscribe();

        bridge.set_personality(Personality::Technical).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().personality, Personality::Technical);

        bridge.set_max_tokens(512).await.unwrap();
        rx.changed().await.unwrap();
        let config = rx.borrow().clone();
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.personality, Personality::Technical);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_both_fields() {
        let (bridge, store) = bridge_over(Preferences::default()).await;
        let bridge = Arc::new(bridge);

        let a = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.set_temperature(1.1).await })
        };
        let b = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.set_active_model("tiny").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let snapshot = Configuration::from_preferences(&store.read_snapshot().await.unwrap()).unwrap();
        assert_eq!(snapshot.temperature, 1.1);
        assert_eq!(snapshot.active_model, "tiny");
    }
}
