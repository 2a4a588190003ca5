//! Configuration resolution for the mavparam CLI.

use anyhow::{Context, Result};
use mavparam_core::SyncConfig;
use std::path::Path;

/// File picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "mavparam.toml";

/// Build the effective configuration.
///
/// An explicit path must exist. Without one, `./mavparam.toml` is used if
/// present, otherwise the defaults. Command-line identity overrides apply last.
pub fn resolve(
    path: Option<&Path>,
    system: Option<u8>,
    component: Option<u8>,
) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load(Path::new(DEFAULT_CONFIG_FILE))?,
        None => SyncConfig::default(),
    };

    if let Some(system) = system {
        config.target_system = system;
    }
    if let Some(component) = component {
        config.target_component = component;
    }
    Ok(config)
}

fn load(path: &Path) -> Result<SyncConfig> {
    let config = mavparam_client::config::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_file_with_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vehicle.toml");
        std::fs::write(&path, "target_system = 3\nreply_timeout_ms = 900\n").unwrap();

        let config = resolve(Some(&path), None, Some(190)).unwrap();

        assert_eq!(config.target_system, 3);
        assert_eq!(config.target_component, 190);
        assert_eq!(config.reply_timeout_ms, 900);
    }

    #[test]
    fn explicit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.toml");

        let err = resolve(Some(&path), None, None).unwrap_err();

        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "outbound_capacity = 0\n").unwrap();

        assert!(resolve(Some(&path), None, None).is_err());
    }
}
