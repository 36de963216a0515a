//! Conversation session: the stateful orchestrator.
//!
//! A session owns the in-memory transcript view, the sending flag and the
//! template catalog. `submit` moves it from idle to sending and back; every
//! other mutation is serialized behind a session-scoped lock. Observers read
//! through `watch` receivers and never block a submission.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::ConfigurationBridge;
use crate::config::{ConfigError, Configuration, Personality};
use crate::executor::TurnExecutor;
use crate::prompt::{build_prompt, default_templates, PromptTemplate};
use crate::router::select_backend;
use crate::store::{PreferenceStore, StoreError, TranscriptStore};
use crate::turn::{Turn, TurnClock};

/// Errors from session operations other than `submit`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transcript store error: {0}")]
    Store(#[from] StoreError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result of a [`ConversationSession::submit`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The message was empty or whitespace; nothing happened.
    Blank,
    /// Another submission is in flight; this one was dropped.
    Busy,
    /// The turn resolved; carries the Assistant or System reply.
    Completed(Turn),
}

/// Clears the sending flag when dropped, whatever happened in between.
struct SendingGuard<'a> {
    sending: &'a watch::Sender<bool>,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.sending.send_replace(false);
    }
}

/// Builder for [`ConversationSession`].
pub struct SessionBuilder {
    transcript: Arc<dyn TranscriptStore>,
    preferences: Arc<dyn PreferenceStore>,
    executor: TurnExecutor,
    templates: Arc<[PromptTemplate]>,
}

impl SessionBuilder {
    /// Replace the built-in template catalog.
    pub fn templates(mut self, templates: impl Into<Vec<PromptTemplate>>) -> Self {
        self.templates = templates.into().into();
        self
    }

    /// Start the session: read configuration, load history, follow both stores.
    pub async fn start(self) -> Result<ConversationSession, SessionError> {
        let bridge = ConfigurationBridge::start(self.preferences).await?;
        let clock = self.executor.clock().clone();
        let (transcript_tx, _) = watch::channel(Vec::new());
        let (sending_tx, _) = watch::channel(false);

        let session = ConversationSession {
            transcript: Arc::new(transcript_tx),
            sending: sending_tx,
            config: bridge.subscribe(),
            templates: self.templates,
            store: self.transcript,
            bridge,
            executor: self.executor,
            clock,
            mutation: Mutex::new(()),
            mirror: None,
        };
        session.start_mirroring().await
    }
}

/// Sequences user input through prompt building, routing and execution.
pub struct ConversationSession {
    transcript: Arc<watch::Sender<Vec<Turn>>>,
    sending: watch::Sender<bool>,
    config: watch::Receiver<Configuration>,
    templates: Arc<[PromptTemplate]>,
    store: Arc<dyn TranscriptStore>,
    bridge: ConfigurationBridge,
    executor: TurnExecutor,
    clock: Arc<TurnClock>,
    mutation: Mutex<()>,
    mirror: Option<JoinHandle<()>>,
}

impl ConversationSession {
    /// Configure a session over injected collaborators.
    pub fn builder(
        transcript: Arc<dyn TranscriptStore>,
        preferences: Arc<dyn PreferenceStore>,
        executor: TurnExecutor,
    ) -> SessionBuilder {
        SessionBuilder {
            transcript,
            preferences,
            executor,
            templates: default_templates().into(),
        }
    }

    /// Start a session with the built-in templates.
    pub async fn start(
        transcript: Arc<dyn TranscriptStore>,
        preferences: Arc<dyn PreferenceStore>,
        executor: TurnExecutor,
    ) -> Result<Self, SessionError> {
        Self::builder(transcript, preferences, executor).start().await
    }

    async fn start_mirroring(mut self) -> Result<Self, SessionError> {
        // Subscribe before the initial read so no append slips between them
        let updates = self.store.subscribe();
        self.load_history().await?;
        self.mirror = Some(tokio::spawn(mirror_transcript(
            updates,
            self.transcript.clone(),
        )));
        Ok(self)
    }

    /// Take the mutation lock once no submission is in flight.
    ///
    /// `submit` takes the same lock for its final step while still sending,
    /// so the lock is released while waiting.
    async fn lock_idle(&self) -> MutexGuard<'_, ()> {
        let mut sending = self.sending.subscribe();
        loop {
            let guard = self.mutation.lock().await;
            let idle = !*self.sending.borrow();
            if idle {
                return guard;
            }
            drop(guard);
            debug!("Waiting for in-flight submission");
            // The sender lives in `self`, so this cannot fail
            let _ = sending.wait_for(|s| !*s).await;
        }
    }

    /// Replace the in-memory transcript with a full read of the store.
    ///
    /// Waits for an in-flight submission to finish first.
    pub async fn load_history(&self) -> Result<(), SessionError> {
        let _lock = self.lock_idle().await;
        let turns = self.store.read_all().await?;
        if let Some(last) = turns.iter().map(|t| t.id).max() {
            self.clock.observe(last);
        }
        info!("Loaded {} turns", turns.len());
        self.transcript.send_replace(turns);
        Ok(())
    }

    /// Submit a user message, optionally through a template.
    ///
    /// Never fails: backend errors come back as a System turn and the sending
    /// flag is always cleared before this returns.
    pub async fn submit(&self, message: &str, template: Option<&PromptTemplate>) -> SubmitOutcome {
        if message.trim().is_empty() {
            return SubmitOutcome::Blank;
        }

        let claimed = self.sending.send_if_modified(|sending| {
            if *sending {
                false
            } else {
                *sending = true;
                true
            }
        });
        if !claimed {
            debug!("Submission ignored, another one is in flight");
            return SubmitOutcome::Busy;
        }
        let _guard = SendingGuard {
            sending: &self.sending,
        };

        let config = self.config.borrow().clone();
        let user_turn = Turn::user(message, &self.clock);

        let history = {
            let _lock = self.mutation.lock().await;
            let mut history = Vec::new();
            self.transcript.send_modify(|turns| {
                turns.push(user_turn.clone());
                history.clone_from(turns);
            });
            history
        };

        let prompt = build_prompt(message, &history, &config, template);
        let backend = select_backend(&config);
        info!("Routing turn to {} backend", backend);

        let reply = self.executor.execute(&prompt, backend, &config).await;

        {
            let _lock = self.mutation.lock().await;
            self.transcript.send_modify(|turns| turns.push(reply.clone()));
            for turn in [user_turn, reply.clone()] {
                if let Err(e) = self.store.append(turn).await {
                    warn!("Failed to persist turn: {}", e);
                }
            }
        }

        SubmitOutcome::Completed(reply)
    }

    /// Clear the stored and in-memory transcript.
    ///
    /// Waits for an in-flight submission to finish, so none of its turns
    /// survive. The in-memory view is only cleared once the store has been
    /// cleared.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let _lock = self.lock_idle().await;
        self.store.clear().await?;
        self.transcript.send_replace(Vec::new());
        info!("Transcript cleared");
        Ok(())
    }

    pub async fn toggle_mode(&self) -> Result<(), SessionError> {
        let _lock = self.mutation.lock().await;
        Ok(self.bridge.toggle_mode().await?)
    }

    pub async fn set_personality(&self, personality: Personality) -> Result<(), SessionError> {
        let _lock = self.mutation.lock().await;
        Ok(self.bridge.set_personality(personality).await?)
    }

    pub async fn set_temperature(&self, temperature: f32) -> Result<(), SessionError> {
        let _lock = self.mutation.lock().await;
        Ok(self.bridge.set_temperature(temperature).await?)
    }

    pub async fn set_max_tokens(&self, max_tokens: u32) -> Result<(), SessionError> {
        let _lock = self.mutation.lock().await;
        Ok(self.bridge.set_max_tokens(max_tokens).await?)
    }

    /// Current transcript snapshot.
    pub fn transcript(&self) -> Vec<Turn> {
        self.transcript.borrow().clone()
    }

    pub fn is_sending(&self) -> bool {
        *self.sending.borrow()
    }

    /// Configuration as last published by the bridge.
    pub fn config(&self) -> Configuration {
        self.config.borrow().clone()
    }

    pub fn templates(&self) -> &[PromptTemplate] {
        &self.templates
    }

    /// Look up a template by id.
    pub fn template(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Vec<Turn>> {
        self.transcript.subscribe()
    }

    pub fn subscribe_sending(&self) -> watch::Receiver<bool> {
        self.sending.subscribe()
    }

    pub fn subscribe_config(&self) -> watch::Receiver<Configuration> {
        self.bridge.subscribe()
    }

    /// Stop following the transcript store.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.mirror.take() {
            task.abort();
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forward store snapshots into the session view.
///
/// A snapshot that is a strict prefix of the view is a persistence step the
/// view already reflects, and is skipped so the view never moves backwards.
async fn mirror_transcript(
    mut updates: watch::Receiver<Vec<Turn>>,
    view: Arc<watch::Sender<Vec<Turn>>>,
) {
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        view.send_if_modified(move |current| {
            let behind = !snapshot.is_empty()
                && snapshot.len() < current.len()
                && current.starts_with(&snapshot);
            if behind || *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}
