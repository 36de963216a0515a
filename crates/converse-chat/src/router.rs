//! Backend selection.

use std::fmt;

use crate::config::Configuration;

/// Where a turn is serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// The remote chat-completions API.
    Remote,
    /// A model loaded on this machine.
    Local,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Remote => f.write_str("remote"),
            Backend::Local => f.write_str("local"),
        }
    }
}

/// Remote only when online mode is on and the device reports connectivity.
pub fn select_backend(config: &Configuration) -> Backend {
    if config.online_mode && config.connected {
        Backend::Remote
    } else {
        Backend::Local
    }
}
