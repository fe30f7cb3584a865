//! Core application logic and the main event loop.
//!
//! The synchronization itself lives in [`engine::SyncEngine`]; this module
//! owns the loop that feeds it. Every producer (POSIX signals, logind,
//! hotplug polling, IPC requests, the config watcher) sends a
//! [`SignalMessage`] into one channel and the loop below is its only
//! consumer, so engine state is never touched from more than one thread.
//!
//! Between events the loop blocks on the channel for exactly as long as the
//! sampling clock allows, and for a long idle interval when the clock is
//! stopped.

pub mod clock;
pub mod curve;
pub mod engine;
pub mod rollback;
pub mod status;
pub mod topology;

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use crate::{
    common::{constants::IDLE_WAKE_INTERVAL_MS, utils},
    config::{self, Config},
    core::engine::SyncEngine,
    io::lock::LockFile,
    io::signals::{SignalMessage, SignalState},
    logger::Log,
    platform::ReconfigurePhase,
    state::ipc::IpcServer,
};

/// Parameters for creating a Core instance.
pub(crate) struct CoreParams {
    pub engine: SyncEngine,
    pub config: Config,
    pub signal_state: SignalState,
    pub debug_enabled: bool,
    pub lock: Option<LockFile>,
    pub ipc_server: Option<IpcServer>,
}

/// Owns the engine and the resources that live as long as the daemon.
pub(crate) struct Core {
    engine: SyncEngine,
    config: Config,
    signal_state: SignalState,
    debug_enabled: bool,
    lock: Option<LockFile>,
    ipc_server: Option<IpcServer>,
    instant_shutdown: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            engine: params.engine,
            config: params.config,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
            lock: params.lock,
            ipc_server: params.ipc_server,
            instant_shutdown: false,
        }
    }

    /// Run until a shutdown is requested, then release everything.
    pub fn execute(mut self) -> Result<()> {
        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", utils::private_path(&custom_dir));
        }
        log_block_start!("Using {} display platform", self.engine.platform_name());

        self.engine.refresh_topology(Instant::now());
        self.main_loop();

        if self.instant_shutdown {
            // The controlling terminal is gone.
            Log::set_enabled(false);
        } else {
            log_block_start!("Shutting down brightsync...");
        }

        self.engine.shutdown(Instant::now());
        self.signal_state.running.store(false, Ordering::SeqCst);

        if let Some(server) = self.ipc_server.take()
            && let Err(e) = server.shutdown()
        {
            log_warning!("IPC server did not shut down cleanly: {e}");
        }
        if let Some(lock) = self.lock.take() {
            lock.release();
        }

        log_end!();
        Ok(())
    }

    fn main_loop(&mut self) {
        while self.signal_state.running.load(Ordering::SeqCst) {
            let timeout = self
                .engine
                .time_until_tick(Instant::now())
                .unwrap_or(Duration::from_millis(IDLE_WAKE_INTERVAL_MS));

            match self.signal_state.signal_receiver.recv_timeout(timeout) {
                Ok(message) => {
                    if !self.handle_message(message) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // The core holds a sender itself, so this means a bug.
                    log_pipe!();
                    log_critical!("Event channel disconnected");
                    break;
                }
            }

            self.engine.poll(Instant::now());
        }
    }

    /// Apply one message to the engine. Returns false on shutdown.
    fn handle_message(&mut self, message: SignalMessage) -> bool {
        if self.debug_enabled && !matches!(message, SignalMessage::Shutdown { .. }) {
            log_pipe!();
            log_debug!("Event: {message:?}");
        }

        let now = Instant::now();
        match message {
            SignalMessage::Reconfigure(ReconfigurePhase::Begin) => {
                self.engine.reconfiguration_began(now);
            }
            SignalMessage::Reconfigure(ReconfigurePhase::End) => {
                self.engine.reconfiguration_ended(now);
            }
            SignalMessage::EnvironmentChanged => self.engine.refresh_topology(now),
            SignalMessage::SetPaused(paused) => self.engine.set_paused(paused, now),
            SignalMessage::TogglePause => self.engine.toggle_pause(now),
            SignalMessage::SetOffset { id, offset } => {
                if let Err(e) = self.engine.set_offset(&id, offset) {
                    log_pipe!();
                    log_error!("{e:#}");
                }
            }
            SignalMessage::ResetOffsets => {
                if let Err(e) = self.engine.reset_offsets() {
                    log_pipe!();
                    log_error!("{e:#}");
                }
            }
            SignalMessage::Reload => self.reload_config(now),
            SignalMessage::Shutdown { instant } => {
                self.instant_shutdown = instant;
                return false;
            }
        }
        true
    }

    /// Reload `brightsync.toml` and hand the result to the engine.
    ///
    /// An invalid file keeps the running configuration.
    fn reload_config(&mut self, now: Instant) {
        let new_config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_warning!("Configuration reload failed: {e:#}");
                log_indented!("Keeping the previous configuration");
                return;
            }
        };

        log_block_start!("Configuration reloaded");
        if new_config.ddcutil_path() != self.config.ddcutil_path()
            || new_config.hotplug_poll_interval() != self.config.hotplug_poll_interval()
        {
            log_indented!("Platform settings take effect after a restart");
        }
        if self.debug_enabled {
            new_config.log_config();
        }

        self.engine.apply_settings(
            new_config.engine_settings(),
            new_config.topology_rules(),
            now,
        );
        self.config = new_config;
    }
}
