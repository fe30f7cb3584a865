//! High-level instance management for brightsync processes.
//!
//! Builds on the lock file in `io::lock`: finding the running daemon,
//! signalling it, and refusing to start a second one.

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::path::PathBuf;

use crate::common::utils;
use crate::io::lock::{self, LockFile};

/// Information about a running brightsync instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub pid: u32,
    /// Custom config directory if set
    pub config_dir: Option<PathBuf>,
}

impl InstanceInfo {
    /// Parse instance info from lock file contents.
    pub fn from_lock_contents(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();
        let pid = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .context("Lock file is empty")?
            .trim()
            .parse::<u32>()
            .context("Invalid PID format in lock file")?;

        let config_dir = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);

        Ok(Self { pid, config_dir })
    }
}

/// Find the running daemon, if any.
///
/// A custom config directory recorded by the daemon is adopted by this
/// process so client commands operate on the same state.
pub fn get_running_instance() -> Result<Option<InstanceInfo>> {
    let Ok(contents) = std::fs::read_to_string(lock::get_main_lock_path()) else {
        return Ok(None);
    };
    let Ok(info) = InstanceInfo::from_lock_contents(&contents) else {
        return Ok(None);
    };

    if info.pid == std::process::id() || !utils::is_process_running(info.pid) {
        return Ok(None);
    }

    if let Some(config_dir) = &info.config_dir {
        let _ = crate::config::set_config_dir(Some(config_dir.display().to_string()));
    }
    Ok(Some(info))
}

/// PID of the running daemon, or an error when none is running.
pub fn get_running_instance_pid() -> Result<u32> {
    get_running_instance()?
        .map(|info| info.pid)
        .ok_or_else(|| anyhow::anyhow!("No brightsync instance running"))
}

fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let raw = i32::try_from(pid).context("PID out of range")?;
    kill(Pid::from_raw(raw), signal)
        .with_context(|| format!("Failed to send {signal} to process {pid}"))
}

/// Ask an instance to shut down gracefully (SIGTERM).
pub fn terminate_instance(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGTERM)
}

/// Ask an instance to reload its configuration (SIGUSR2).
pub fn send_reload_signal(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGUSR2)
}

/// Flip the pause state of an instance (SIGUSR1).
pub fn send_toggle_signal(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGUSR1)
}

/// Acquire the daemon lock or explain who holds it.
///
/// Returns `Ok(None)` after logging the conflict when another daemon runs.
pub fn ensure_single_instance() -> Result<Option<LockFile>> {
    let lock_path = lock::get_main_lock_path();
    if let Some(lock) = LockFile::acquire(&lock_path)? {
        return Ok(Some(lock));
    }

    let pid = std::fs::read_to_string(&lock_path)
        .ok()
        .and_then(|contents| InstanceInfo::from_lock_contents(&contents).ok())
        .map(|info| info.pid.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    log_pipe!();
    log_error!("brightsync is already running (PID: {pid})");
    log_block_start!("Did you mean to:");
    log_indented!("• Check the current state: brightsync status");
    log_indented!("• Pause synchronization: brightsync pause");
    log_indented!("• Reload configuration: brightsync reload");
    log_indented!("• Stop the daemon: brightsync stop");
    log_block_start!("Cannot start - another brightsync instance is running");
    log_end!();
    Ok(None)
}
