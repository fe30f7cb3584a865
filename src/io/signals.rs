//! Signal handling and the unified event channel of the daemon.
//!
//! Every asynchronous input (POSIX signals, D-Bus session and sleep events,
//! hotplug brackets, IPC control requests, config file changes) is funneled
//! into one `mpsc` channel of [`SignalMessage`]s. The main loop is the only
//! consumer, so engine state is only ever touched from that single thread.
//!
//! POSIX signal mapping:
//! - `SIGINT`, `SIGTERM`, `SIGHUP`: graceful shutdown
//! - `SIGUSR1`: toggle pause
//! - `SIGUSR2`: reload configuration

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::{Receiver, Sender},
    thread,
};

use crate::platform::{DisplayId, ReconfigurePhase};

/// Unified message type for everything the main loop reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// Display reconfiguration bracket (hotplug, sleep)
    Reconfigure(ReconfigurePhase),
    /// Console ownership or another topology input changed
    EnvironmentChanged,
    /// Explicit pause/resume request
    SetPaused(bool),
    /// Flip the pause state (SIGUSR1)
    TogglePause,
    /// Set a user offset for one display
    SetOffset { id: DisplayId, offset: f64 },
    /// Clear every stored offset
    ResetOffsets,
    /// Configuration reload (SIGUSR2 or file watcher)
    Reload,
    /// Shutdown (SIGTERM, SIGINT, SIGHUP)
    Shutdown { instant: bool },
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Cleared once a shutdown has been requested
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Cloned by every producer thread (D-Bus, hotplug, IPC, config watcher)
    pub signal_sender: Sender<SignalMessage>,
}

/// Set up POSIX signal handling.
///
/// Spawns a background thread that converts signals into messages on the
/// returned channel.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let signal_sender_clone = signal_sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let message = match sig {
                SIGUSR1 => {
                    log_pipe!();
                    log_info!("Received pause toggle signal");
                    SignalMessage::TogglePause
                }
                SIGUSR2 => {
                    log_pipe!();
                    log_info!("Received configuration reload signal");
                    SignalMessage::Reload
                }
                SIGINT => {
                    log_pipe!();
                    if debug_enabled {
                        log_info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                    } else {
                        log_info!("Received interrupt signal, initiating graceful shutdown...");
                    }
                    SignalMessage::Shutdown { instant: false }
                }
                SIGHUP => {
                    // Terminal is gone; skip logging to it.
                    SignalMessage::Shutdown { instant: true }
                }
                _ => {
                    log_pipe!();
                    log_info!("Received termination request, initiating graceful shutdown...");
                    SignalMessage::Shutdown { instant: false }
                }
            };

            let is_shutdown = matches!(message, SignalMessage::Shutdown { .. });
            if is_shutdown {
                running_clone.store(false, Ordering::SeqCst);
            }

            if let Err(e) = signal_sender_clone.send(message) {
                if is_shutdown {
                    log_warning!("Failed to send shutdown message: {e}");
                    log_indented!("Main loop appears to have already exited");
                }
                break;
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
