//! Conversation configuration and remote client settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors reading or updating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown personality '{0}'")]
    UnknownPersonality(String),
    #[error("preference store error: {0}")]
    Store(#[from] StoreError),
}

/// Assistant personality used to frame every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Personality {
    Friendly,
    Professional,
    Creative,
    Technical,
    Humorous,
}

impl Personality {
    pub const ALL: [Personality; 5] = [
        Personality::Friendly,
        Personality::Professional,
        Personality::Creative,
        Personality::Technical,
        Personality::Humorous,
    ];

    /// Stored name of the personality.
    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Friendly => "FRIENDLY",
            Personality::Professional => "PROFESSIONAL",
            Personality::Creative => "CREATIVE",
            Personality::Technical => "TECHNICAL",
            Personality::Humorous => "HUMOROUS",
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPersonality(s.to_string()))
    }
}

/// Raw preference record as persisted by a preference store.
///
/// Every field is optional; absent fields take their default independently
/// when converted into a [`Configuration`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "is_online_mode", default, skip_serializing_if = "Option::is_none")]
    pub online_mode: Option<bool>,
    #[serde(rename = "is_connected", default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(rename = "current_model", default, skip_serializing_if = "Option::is_none")]
    pub active_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// A consistent snapshot of the conversation preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub online_mode: bool,
    pub connected: bool,
    pub active_model: String,
    pub personality: Personality,
    pub temperature: f32,
    pub max_tokens: u32,
    pub custom_instructions: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            online_mode: true,
            connected: true,
            active_model: "default".to_string(),
            personality: Personality::Friendly,
            temperature: 0.7,
            max_tokens: 150,
            custom_instructions: String::new(),
        }
    }
}

impl Configuration {
    /// Resolve a raw record, defaulting each missing field on its own.
    ///
    /// A personality name that is present but unrecognized is an error,
    /// never replaced by the default.
    pub fn from_preferences(prefs: &Preferences) -> Result<Self, ConfigError> {
        let defaults = Configuration::default();
        let personality = match &prefs.personality {
            Some(name) => name.parse()?,
            None => defaults.personality,
        };

        Ok(Self {
            online_mode: prefs.online_mode.unwrap_or(defaults.online_mode),
            connected: prefs.connected.unwrap_or(defaults.connected),
            active_model: prefs
                .active_model
                .clone()
                .unwrap_or(defaults.active_model),
            personality,
            temperature: prefs.temperature.unwrap_or(defaults.temperature),
            max_tokens: prefs.max_tokens.unwrap_or(defaults.max_tokens),
            custom_instructions: prefs
                .custom_instructions
                .clone()
                .unwrap_or(defaults.custom_instructions),
        })
    }

    /// Full record with every field set, for write-back.
    pub fn to_preferences(&self) -> Preferences {
        Preferences {
            online_mode: Some(self.online_mode),
            connected: Some(self.connected),
            active_model: Some(self.active_model.clone()),
            personality: Some(self.personality.as_str().to_string()),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            custom_instructions: Some(self.custom_instructions.clone()),
        }
    }
}

/// Configuration for the remote completion client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer token for the completion API
    pub api_key: String,
    /// API base URL; `/chat/completions` is appended
    pub base_url: String,
    /// Per-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let api_key = std::env::var("CONVERSE_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();

        let base_url = std::env::var("CONVERSE_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        let request_timeout = std::env::var("CONVERSE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        Self {
            api_key,
            base_url,
            request_timeout,
        }
    }

    /// Check if the config is usable (has an API key).
    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Create a builder for configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
