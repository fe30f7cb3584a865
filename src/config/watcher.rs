//! Hot reloading of `brightsync.toml`.
//!
//! The config directory is watched rather than the file itself so editors that
//! save by writing a temporary file and renaming it over the original are
//! still noticed.

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use super::get_config_path;
use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;

/// Editors often write a file in several steps; collapse them into one reload.
const DEBOUNCE_MS: u64 = 500;

/// Whether a filesystem event at `event_path` concerns the config file.
pub fn is_config_event(event_path: &Path, config_path: &Path) -> bool {
    if event_path == config_path {
        return true;
    }
    let (Some(event_name), Some(config_name)) = (
        event_path.file_name().and_then(|n| n.to_str()),
        config_path.file_name().and_then(|n| n.to_str()),
    ) else {
        return false;
    };
    event_path.parent() == config_path.parent() && event_name.starts_with(config_name)
}

/// Start watching the config file and send `Reload` on changes.
pub fn start_config_watcher(
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    let config_path = get_config_path()?;
    let Some(config_dir) = config_path.parent().map(Path::to_path_buf) else {
        return Ok(());
    };
    if !config_dir.is_dir() {
        if debug_enabled {
            log_pipe!();
            log_debug!("No configuration directory to watch for hot reload");
        }
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res
                && matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                )
            {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(&config_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch directory: {}", config_dir.display()))?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Watching {} for changes", private_path(&config_path));
    }

    thread::Builder::new()
        .name("config-watcher".to_string())
        .spawn(move || watch_loop(watcher, rx, config_path, signal_sender, debug_enabled))
        .context("Failed to spawn config watcher thread")?;

    Ok(())
}

fn watch_loop(
    watcher: RecommendedWatcher,
    events: std::sync::mpsc::Receiver<Event>,
    config_path: PathBuf,
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
) {
    // The watcher stops delivering events once dropped.
    let _watcher = watcher;
    let mut last_reload: Option<Instant> = None;

    for event in events {
        if !event
            .paths
            .iter()
            .any(|path| is_config_event(path, &config_path))
        {
            continue;
        }

        if last_reload.is_some_and(|at| at.elapsed() < Duration::from_millis(DEBOUNCE_MS)) {
            continue;
        }

        if debug_enabled {
            log_pipe!();
            log_info!("Configuration file change detected");
        }

        if signal_sender.send(SignalMessage::Reload).is_err() {
            break;
        }
        last_reload = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_event_matching() {
        let config = Path::new("/home/u/.config/brightsync/brightsync.toml");

        assert!(is_config_event(config, config));
        assert!(is_config_event(
            Path::new("/home/u/.config/brightsync/brightsync.toml.swp"),
            config
        ));
        assert!(!is_config_event(
            Path::new("/home/u/.config/brightsync/notes.txt"),
            config
        ));
        assert!(!is_config_event(
            Path::new("/home/u/.config/other/brightsync.toml"),
            config
        ));
    }
}
