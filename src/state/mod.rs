//! Persistent state for brightsync, following XDG Base Directory standards.
//!
//! Calibration offsets live under `XDG_STATE_HOME`, separate from the
//! configuration. Each config directory gets its own namespace so a daemon
//! started with `--config` never shares offsets with the default one.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::get_custom_config_dir;

pub mod ipc;
pub mod offsets;

const OFFSETS_FILE_NAME: &str = "offsets.json";

/// Get the state directory for a given configuration directory.
///
/// State is stored in XDG_STATE_HOME/brightsync/{namespace} where namespace is:
/// - "default" for the default config directory
/// - "custom_<hash>" for custom config directories (via --config)
pub fn get_state_dir(config_dir: Option<&Path>) -> Result<PathBuf> {
    let state_home = match std::env::var("XDG_STATE_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
            .unwrap_or_else(|| PathBuf::from("/tmp")),
    };

    let namespace = match config_dir {
        None => "default".to_string(),
        Some(path) => {
            let default_config = dirs::config_dir()
                .context("Could not determine config directory")?
                .join("brightsync");
            if path == default_config {
                "default".to_string()
            } else {
                get_state_namespace(path)
            }
        }
    };

    Ok(state_home.join("brightsync").join(namespace))
}

/// Stable namespace for a custom config directory.
fn get_state_namespace(config_path: &Path) -> String {
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());

    let hash = sha256::digest(canonical.to_string_lossy().as_bytes());
    format!("custom_{}", &hash[..16])
}

/// Path of the offsets file for the active config directory.
pub fn offsets_path() -> Result<PathBuf> {
    let config_dir = get_custom_config_dir();
    Ok(get_state_dir(config_dir.as_deref())?.join(OFFSETS_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_default_namespace() {
        let dir = tempdir().unwrap();
        unsafe { std::env::set_var("XDG_STATE_HOME", dir.path()) };

        let state_dir = get_state_dir(None).unwrap();
        assert_eq!(state_dir, dir.path().join("brightsync/default"));

        unsafe { std::env::remove_var("XDG_STATE_HOME") };
    }

    #[test]
    #[serial]
    fn test_custom_namespace_is_stable() {
        let state = tempdir().unwrap();
        let config = tempdir().unwrap();
        unsafe { std::env::set_var("XDG_STATE_HOME", state.path()) };

        let first = get_state_dir(Some(config.path())).unwrap();
        let second = get_state_dir(Some(config.path())).unwrap();
        assert_eq!(first, second);

        let namespace = first.file_name().unwrap().to_str().unwrap();
        assert!(namespace.starts_with("custom_"));
        assert_eq!(namespace.len(), "custom_".len() + 16);

        unsafe { std::env::remove_var("XDG_STATE_HOME") };
    }
}
