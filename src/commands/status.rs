//! Status command - display the daemon's current state via IPC.
//!
//! The daemon sends its latest status to every new client, so a one-shot
//! query is a connect and a single read. Follow mode keeps the connection
//! open and prints every published status until interrupted.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::percent;
use crate::core::status::Status;
use crate::state::ipc::client::IpcClient;
use crate::state::ipc::events::IpcEvent;

const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn handle_status_command(json: bool, follow: bool) -> Result<()> {
    let mut ipc_client = match IpcClient::connect() {
        Ok(client) => client,
        Err(_) => {
            log_error_standalone!("No brightsync process is running");
            println!("  Start brightsync first or use 'brightsync --debug' to run");
            return Ok(());
        }
    };

    if follow {
        return follow_events(ipc_client, json);
    }

    let status = super::next_status(&mut ipc_client)
        .context("Failed to receive current state from brightsync")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &Status) {
    println!("Status: {}", status.display_text());
    if let Status::Running {
        source_brightness,
        targets,
    } = status
    {
        println!("  Source: {}", percent(*source_brightness));
        for target in targets {
            println!(
                "  {}: {} (offset {:+.3})",
                target.id,
                percent(target.brightness),
                target.offset
            );
        }
    }
}

/// One line per event for follow mode.
fn summarize(status: &Status) -> String {
    match status {
        Status::Running {
            source_brightness,
            targets,
        } => {
            let targets: Vec<String> = targets
                .iter()
                .map(|target| format!("{} {}", target.id, percent(target.brightness)))
                .collect();
            format!(
                "{} | source {} | {}",
                status.display_text(),
                percent(*source_brightness),
                targets.join(", ")
            )
        }
        _ => status.display_text().to_string(),
    }
}

fn follow_events(mut ipc_client: IpcClient, json: bool) -> Result<()> {
    // Flipped to true by Ctrl+C.
    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&interrupted))?;

    ipc_client.set_timeout(FOLLOW_POLL_INTERVAL)?;
    if !json {
        println!("Following brightsync state changes (press Ctrl+C to stop)...\n");
    }

    while !interrupted.load(Ordering::SeqCst) {
        let event = match ipc_client.try_receive() {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(_) => {
                if !json {
                    eprintln!("brightsync process stopped. Exiting follow mode.");
                }
                break;
            }
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else if let IpcEvent::StatusChanged {
            status, timestamp, ..
        } = &event
        {
            println!("[{}] {}", timestamp.format("%H:%M:%S"), summarize(status));
        }
        std::io::stdout().flush()?;
    }

    if !json {
        println!("\nStopped following brightsync state.");
    }
    Ok(())
}

/// Display help for the status command.
pub fn display_help() {
    log_version!();
    log_block_start!("status - Display current runtime state");
    log_block_start!("Usage: brightsync status [--json] [--follow]");
    log_block_start!("Description:");
    log_indented!("Shows the state of the running daemon (Activated, Paused or");
    log_indented!("Deactivated). While active, the source brightness and every");
    log_indented!("target's observed brightness and offset are listed.");
    log_block_start!("Options:");
    log_indented!("--json     Output state information in JSON format");
    log_indented!("--follow   Continuously display state changes");
    log_block_start!("Examples:");
    log_indented!("# Show current state once");
    log_indented!("brightsync status");
    log_pipe!();
    log_indented!("# Stream every event as JSON lines");
    log_indented!("brightsync status --json --follow");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::Target;
    use crate::platform::DisplayId;

    #[test]
    fn test_follow_summary() {
        let status = Status::Running {
            source_brightness: 0.5,
            targets: vec![Target {
                id: DisplayId::new("DEL-A0C4-1"),
                brightness: 0.42,
                offset: -0.05,
            }],
        };
        assert_eq!(
            summarize(&status),
            "Activated | source 50.0% | DEL-A0C4-1 42.0%"
        );
        assert_eq!(summarize(&Status::Paused), "Paused");
    }
}
