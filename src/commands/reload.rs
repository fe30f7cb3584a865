//! Implementation of the reload command.
//!
//! Validates the configuration locally first so a broken file is reported
//! here instead of only in the daemon's log, then signals SIGUSR2.

use anyhow::Result;

pub fn handle_reload_command() -> Result<()> {
    log_version!();

    // Looked up before loading so the daemon's config directory is adopted.
    let Ok(pid) = crate::io::instance::get_running_instance_pid() else {
        log_error_exit!("brightsync isn't running");
        return Ok(());
    };

    if let Err(e) = crate::config::Config::load() {
        log_pipe!();
        log_error!("Configuration is invalid, not reloading: {e:#}");
        log_end!();
        return Ok(());
    }

    match crate::io::instance::send_reload_signal(pid) {
        Ok(()) => {
            log_block_start!("Sent reload signal to brightsync (PID: {pid})");
            log_indented!("Settings apply from the next synchronization tick");
        }
        Err(e) => {
            log_pipe!();
            log_error!("Failed to signal brightsync: {e}");
        }
    }
    log_end!();
    Ok(())
}

/// Display help for the reload command.
pub fn display_help() {
    log_version!();
    log_block_start!("reload - Reload the daemon's configuration");
    log_block_start!("Usage: brightsync reload");
    log_block_start!("Description:");
    log_indented!("Checks the configuration file and asks the running daemon to");
    log_indented!("re-read it. The daemon also reloads on its own when the file");
    log_indented!("changes, and on SIGUSR2.");
    log_indented!("Changes to ddcutil_path and hotplug_poll_interval need a restart.");
    log_end!();
}
