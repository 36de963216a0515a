//! # Converse Chat
//!
//! Message orchestration for a conversational assistant: turns user input
//! into an engineered prompt, routes it to a remote or local model, and
//! records the outcome in a persistent transcript.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  User Message   │ --> │  PromptBuilder  │ --> │   ModeRouter    │
//! │   (+template)   │     │ (history, cfg)  │     │ (remote/local)  │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//! ┌─────────────────┐     ┌─────────────────┐     ┌────────┴────────┐
//! │   Transcript    │ <-- │  Conversation   │ <-- │  TurnExecutor   │
//! │     Store       │     │     Session     │     │ (API/llama.cpp) │
//! └─────────────────┘     └────────┬────────┘     └─────────────────┘
//!                                  │
//!                         ┌────────┴────────┐
//!                         │  Configuration  │
//!                         │     Bridge      │
//!                         └─────────────────┘
//! ```
//!
//! ## Backends
//!
//! - **Remote** - OpenAI-compatible chat completion API
//! - **Local** - llama.cpp server over an installed GGUF model
//!
//! ## Usage
//!
//! ```ignore
//! use converse_chat::*;
//!
//! let config = ClientConfig::from_env();
//! let executor = TurnExecutor::new(
//!     Arc::new(ChatCompletionClient::new(&config)?),
//!     Arc::new(LocalModelResolver::new(ModelManager::new())),
//!     config.api_key.clone(),
//!     Arc::new(TurnClock::new()),
//! );
//! let session = ConversationSession::start(
//!     Arc::new(JsonTranscriptStore::open("transcript.json").await?),
//!     Arc::new(JsonPreferenceStore::open("preferences.json").await?),
//!     executor,
//! )
//! .await?;
//!
//! session.submit("Hello!", None).await;
//! ```

mod bridge;
mod client;
mod config;
mod executor;
mod local;
mod prompt;
mod router;
mod session;
pub mod store;
mod turn;

pub use bridge::ConfigurationBridge;
pub use client::{
    ChatCompletionClient, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice,
    CompletionTransport, TransportError, Usage,
};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, Configuration, Personality, Preferences,
    DEFAULT_API_BASE_URL,
};
pub use executor::TurnExecutor;
pub use local::{LlamaModel, LocalModelResolver, ModelResolver, TextGenerator};
pub use prompt::{
    build_prompt, build_prompt_at, context_block, default_templates, personality_preamble,
    PromptTemplate, CONTEXT_WINDOW,
};
pub use router::{select_backend, Backend};
pub use session::{ConversationSession, SessionBuilder, SessionError, SubmitOutcome};
pub use store::{
    JsonPreferenceStore, JsonTranscriptStore, MemoryPreferenceStore, MemoryTranscriptStore,
    PreferenceStore, PreferenceTransform, StoreError, TranscriptStore,
};
pub use turn::{Role, Turn, TurnClock, TurnId};

// Re-export local AI types
pub use converse_local_ai::{
    paths as local_ai_paths, GenerationParams, InstalledModel, LlamaCppClient, LlamaCppServer,
    LocalAIError, ModelInfo, ModelManager, DEFAULT_MODEL_NAME,
    DEFAULT_PORT as DEFAULT_LOCAL_AI_PORT,
};
