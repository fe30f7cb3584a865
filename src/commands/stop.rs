//! Implementation of the stop command.
//!
//! Sends SIGTERM to the running daemon and waits briefly for it to exit, so
//! the user knows the rollback on shutdown has finished.

use anyhow::Result;
use std::time::Duration;

use crate::common::utils::is_process_running;
use crate::io::instance::{get_running_instance_pid, terminate_instance};

const STOP_TIMEOUT: Duration = Duration::from_secs(3);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle the stop command to terminate a running brightsync instance.
pub fn handle_stop_command() -> Result<()> {
    log_version!();

    let Ok(pid) = get_running_instance_pid() else {
        log_error_exit!("brightsync isn't running");
        return Ok(());
    };

    log_block_start!("Stopping brightsync (PID: {})...", pid);
    if let Err(e) = terminate_instance(pid) {
        log_error_exit!("Failed to terminate instance: {}", e);
        return Ok(());
    }

    let attempts = STOP_TIMEOUT.as_millis() / STOP_POLL_INTERVAL.as_millis();
    for _ in 0..attempts {
        if !is_process_running(pid) {
            log_pipe!();
            log_info!("Process terminated successfully");
            log_end!();
            return Ok(());
        }
        std::thread::sleep(STOP_POLL_INTERVAL);
    }

    log_pipe!();
    log_warning!("Process did not terminate within the expected time");
    log_indented!("The termination signal was sent, but the process may still be shutting down");
    log_end!();
    Ok(())
}

/// Display detailed help for the stop command.
pub fn display_help() {
    log_version!();
    log_block_start!("stop - Cleanly terminate running brightsync");
    log_block_start!("Usage: brightsync stop");
    log_block_start!("Description:");
    log_indented!("Sends a termination signal to the running daemon. On a clean");
    log_indented!("shutdown the daemon stops writing and releases its lock and socket.");
    log_indented!("Waits up to 3 seconds to confirm the process actually terminates.");
    log_block_start!("Examples:");
    log_indented!("brightsync stop");
    log_end!();
}
