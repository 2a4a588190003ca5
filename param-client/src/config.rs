//! Configuration file loading.
//!
//! The file is flat TOML with the [`SyncConfig`] field names; anything left
//! out takes its default.
//!
//! ```toml
//! target_system = 1
//! target_component = 1
//! heartbeat_timeout_ms = 4000
//! reply_timeout_ms = 2000
//! ```

use std::path::{Path, PathBuf};

use mavparam_core::SyncConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or fails validation.
pub fn load(path: &Path) -> Result<SyncConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: SyncConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    config.validate().map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(config)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Parsed, but the values are unusable.
    #[error("invalid config file {path}: {reason}")]
    Invalid {
        /// Path to the configuration file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}
