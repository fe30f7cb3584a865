//! Application coordinator that manages the complete lifecycle of brightsync.
//!
//! Acquires every long-lived resource in order (configuration, the instance
//! lock, signal handling, the logind and config monitors, the display
//! platform, persisted offsets, the IPC socket), then hands them to
//! [`Core`] which runs the event loop.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::{
    common::constants::EXIT_FAILURE,
    config::{self, Config},
    core::engine::{EngineParams, SyncEngine},
    core::status::LogStatusSink,
    core::{Core, CoreParams},
    io::dbus,
    io::signals::setup_signal_handler,
    platform::create_platform,
    state::ipc::{IpcNotifier, IpcServer},
    state::offsets::OffsetStore,
};

/// Builder for a daemon run.
///
/// Normal startup: `Brightsync::new(debug_enabled).run()`
pub struct Brightsync {
    debug_enabled: bool,
}

impl Brightsync {
    pub fn new(debug_enabled: bool) -> Self {
        Self { debug_enabled }
    }

    pub fn run(self) -> Result<()> {
        log_version!();

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{:?}", e);
                std::process::exit(EXIT_FAILURE);
            }
        };

        let Some(lock) = crate::io::instance::ensure_single_instance()? else {
            return Ok(());
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        // Assume the console until logind says otherwise.
        let on_console = Arc::new(AtomicBool::new(true));
        if let Err(e) = dbus::start_logind_monitor(
            signal_state.signal_sender.clone(),
            on_console.clone(),
            self.debug_enabled,
        ) {
            log_pipe!();
            log_warning!("logind monitoring unavailable: {}", e);
            log_indented!("Sleep and session switches will not pause synchronization");
            log_indented!("This is normal in environments without systemd or D-Bus");
        }

        if let Err(e) =
            config::start_config_watcher(signal_state.signal_sender.clone(), self.debug_enabled)
            && self.debug_enabled
        {
            log_pipe!();
            log_warning!("Config file watching unavailable: {}", e);
            log_indented!("Hot config reload disabled, use SIGUSR2 for manual reload");
        }

        config.log_config();

        let mut platform = create_platform(&config, on_console, self.debug_enabled);
        if let Err(e) =
            platform.watch_reconfiguration(signal_state.signal_sender.clone(), self.debug_enabled)
        {
            log_pipe!();
            log_warning!("Hotplug detection unavailable: {}", e);
            log_indented!("Restart brightsync after connecting or disconnecting monitors");
        }

        let offsets_path =
            crate::state::offsets_path().context("Failed to resolve the offsets file")?;
        let offsets = Arc::new(OffsetStore::open(offsets_path));

        let (notifier, event_receiver) = IpcNotifier::new();
        let ipc_server = match IpcServer::start(
            event_receiver,
            signal_state.signal_sender.clone(),
            signal_state.running.clone(),
            self.debug_enabled,
        ) {
            Ok(server) => Some(server),
            Err(e) => {
                log_pipe!();
                log_warning!("IPC socket unavailable: {e:#}");
                log_indented!("Client commands will not reach this instance");
                None
            }
        };

        log_block_start!("Lock acquired, starting brightsync...");

        let engine = SyncEngine::new(EngineParams {
            platform,
            offsets,
            sink: Box::new(LogStatusSink),
            notifier: ipc_server.is_some().then_some(notifier),
            settings: config.engine_settings(),
            rules: config.topology_rules(),
            debug_enabled: self.debug_enabled,
        });

        let core = Core::new(CoreParams {
            engine,
            config,
            signal_state,
            debug_enabled: self.debug_enabled,
            lock: Some(lock),
            ipc_server,
        });

        core.execute()
    }
}
