//! Local model backend for Converse using llama.cpp.
//!
//! This crate owns the on-disk model directory (download, enumerate,
//! install, delete) and the llama-server process that turns an installed
//! model into something that can generate text from a prompt.

mod client;
mod error;
mod model;
pub mod paths;
mod server;

pub use client::{GenerationParams, LlamaCppClient};
pub use error::LocalAIError;
pub use model::{InstalledModel, ModelInfo, ModelManager, MODEL_EXTENSIONS};
pub use server::LlamaCppServer;

/// Default port for the local llama-server instance.
pub const DEFAULT_PORT: u16 = 11435;

/// Model id used when no model has been selected.
pub const DEFAULT_MODEL_NAME: &str = "default";
