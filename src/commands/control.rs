//! Pause, resume and toggle commands.
//!
//! The request goes over the IPC socket and the command waits for the daemon
//! to publish the resulting state, so the printed result is what actually
//! happened rather than what was asked for.

use anyhow::{Context, Result};

use super::next_status;
use crate::args::ControlAction;
use crate::core::status::{Status, StatusKind};
use crate::state::ipc::client::IpcClient;
use crate::state::ipc::events::IpcRequest;

/// Whether the daemon should end up paused, given its current status.
fn wants_paused(action: ControlAction, current: &Status) -> bool {
    match action {
        ControlAction::Pause => true,
        ControlAction::Resume => false,
        ControlAction::Toggle => current.kind() != StatusKind::Paused,
    }
}

fn request_for(paused: bool) -> IpcRequest {
    if paused {
        IpcRequest::Pause
    } else {
        IpcRequest::Resume
    }
}

pub fn handle_control_command(action: ControlAction) -> Result<()> {
    log_version!();

    let mut client = match IpcClient::connect() {
        Ok(client) => client,
        Err(_) => {
            // Without the socket a toggle can still be delivered as SIGUSR1.
            if action == ControlAction::Toggle
                && let Ok(pid) = crate::io::instance::get_running_instance_pid()
            {
                crate::io::instance::send_toggle_signal(pid)?;
                log_block_start!("Sent pause toggle to brightsync (PID: {pid})");
                log_end!();
                return Ok(());
            }
            log_error_exit!("brightsync isn't running");
            return Ok(());
        }
    };

    let current = next_status(&mut client).context("Failed to read current state")?;
    let paused = wants_paused(action, &current);
    if (current.kind() == StatusKind::Paused) == paused {
        log_block_start!(
            "brightsync is already {}",
            if paused { "paused" } else { "running" }
        );
        log_end!();
        return Ok(());
    }

    client.send(&request_for(paused))?;

    let new_status = loop {
        let status = next_status(&mut client).context("No response from brightsync")?;
        if (status.kind() == StatusKind::Paused) == paused {
            break status;
        }
    };

    log_block_start!("Status: {}", new_status.display_text());
    log_end!();
    Ok(())
}

/// Display help for the control commands.
pub fn display_help() {
    log_version!();
    log_block_start!("pause / resume / toggle - Control synchronization");
    log_block_start!("Usage: brightsync pause | resume | toggle");
    log_block_start!("Description:");
    log_indented!("Pausing stops all brightness writes until resumed, regardless of");
    log_indented!("which displays are connected. Resuming samples the built-in panel");
    log_indented!("afresh before anything is written.");
    log_indented!("The toggle also works as a signal: kill -USR1 <pid>");
    log_block_start!("Examples:");
    log_indented!("brightsync pause");
    log_indented!("brightsync toggle");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_pause() {
        assert!(wants_paused(ControlAction::Toggle, &Status::Deactivated));
        assert!(!wants_paused(ControlAction::Toggle, &Status::Paused));
        assert!(wants_paused(ControlAction::Pause, &Status::Paused));
        assert!(!wants_paused(ControlAction::Resume, &Status::Deactivated));
    }

    #[test]
    fn test_request_mapping() {
        assert_eq!(request_for(true), IpcRequest::Pause);
        assert_eq!(request_for(false), IpcRequest::Resume);
    }
}
