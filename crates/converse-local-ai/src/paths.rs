//! Path utilities for Converse data directories.

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CONVERSE_DATA_DIR";

/// Get the Converse data directory (`$CONVERSE_DATA_DIR` or `~/.converse/`).
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".converse")
}

/// Get the models directory (`<data>/models/`).
pub fn models_dir() -> PathBuf {
    data_dir().join("models")
}

/// Get the bin directory (`<data>/bin/`).
pub fn bin_dir() -> PathBuf {
    data_dir().join("bin")
}

/// Get the path to the llama-server binary.
pub fn llama_server_path() -> PathBuf {
    let binary_name = if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    };
    bin_dir().join(binary_name)
}

/// Ensure the Converse data directories exist.
pub fn ensure_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(data_dir())?;
    std::fs::create_dir_all(models_dir())?;
    std::fs::create_dir_all(bin_dir())?;
    Ok(())
}
