//! systemd-logind monitoring over D-Bus.
//!
//! Two inputs come from logind:
//! - `PrepareForSleep(true/false)` on the manager, turned into a
//!   reconfiguration bracket around suspend so nothing is written to displays
//!   while their drivers are going down or coming back
//! - the `Active` property of this process's session, which decides whether
//!   we own the console; changes are mirrored into a shared flag read by the
//!   platform and announced as `EnvironmentChanged`
//!
//! Both monitors use zbus's blocking API on their own threads. Failing to
//! reach D-Bus is not fatal: the daemon then assumes it owns the console and
//! relies on hotplug polling alone.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use zbus::blocking::Connection;

use crate::io::signals::SignalMessage;
use crate::platform::ReconfigurePhase;

const MAX_THREAD_RESTARTS: u8 = 3;
const RESTART_DELAY_MS: u64 = 2000;

/// D-Bus proxy for the systemd-logind Manager interface.
#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true right before suspend and false after resume.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// D-Bus proxy for the logind session this process belongs to.
#[zbus::proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
trait LogindSession {
    #[zbus(property)]
    fn active(&self) -> zbus::Result<bool>;
}

/// Bracket phase for a `PrepareForSleep` argument.
fn sleep_phase(going_to_sleep: bool) -> ReconfigurePhase {
    if going_to_sleep {
        ReconfigurePhase::Begin
    } else {
        ReconfigurePhase::End
    }
}

/// Start the sleep and session monitors.
///
/// `on_console` is updated in place whenever the session's `Active`
/// property changes.
pub fn start_logind_monitor(
    signal_sender: Sender<SignalMessage>,
    on_console: Arc<AtomicBool>,
    debug_enabled: bool,
) -> Result<()> {
    spawn_with_restarts("sleep-monitor", debug_enabled, {
        let signal_sender = signal_sender.clone();
        move || monitor_sleep_signals(signal_sender.clone(), debug_enabled)
    })?;

    spawn_with_restarts("session-monitor", debug_enabled, move || {
        monitor_session(signal_sender.clone(), on_console.clone(), debug_enabled)
    })?;

    Ok(())
}

/// Run `monitor` on a named thread, restarting it a few times on error.
fn spawn_with_restarts<F>(name: &str, debug_enabled: bool, monitor: F) -> Result<()>
where
    F: Fn() -> Result<()> + Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let mut restart_count = 0;
            loop {
                match monitor() {
                    Ok(()) => {
                        if debug_enabled {
                            log_pipe!();
                            log_debug!("{thread_name} exiting normally");
                        }
                        return;
                    }
                    Err(e) => {
                        log_pipe!();
                        log_warning!("{thread_name} error: {e}");
                        if restart_count >= MAX_THREAD_RESTARTS {
                            log_indented!("Maximum restart attempts reached for {thread_name}");
                            return;
                        }
                        restart_count += 1;
                        log_indented!(
                            "Will restart {} (attempt {}/{})",
                            thread_name,
                            restart_count,
                            MAX_THREAD_RESTARTS
                        );
                        thread::sleep(Duration::from_millis(RESTART_DELAY_MS));
                    }
                }
            }
        })
        .with_context(|| format!("Failed to spawn {name} thread"))?;
    Ok(())
}

fn monitor_sleep_signals(signal_sender: Sender<SignalMessage>, debug_enabled: bool) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let logind_proxy =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let sleep_signals = logind_proxy
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    for signal in sleep_signals {
        let going_to_sleep = match signal.args() {
            Ok(args) => args.start,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse PrepareForSleep signal args: {e}");
                continue;
            }
        };

        log_pipe!();
        if going_to_sleep {
            log_info!("System entering sleep/suspend mode");
        } else {
            log_info!("System resuming from sleep/suspend");
        }

        let message = SignalMessage::Reconfigure(sleep_phase(going_to_sleep));
        if signal_sender.send(message).is_err() {
            // Main loop is gone.
            return Ok(());
        }
    }

    anyhow::bail!("D-Bus connection lost - PrepareForSleep signal stream ended")
}

fn monitor_session(
    signal_sender: Sender<SignalMessage>,
    on_console: Arc<AtomicBool>,
    debug_enabled: bool,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let session = LogindSessionProxyBlocking::new(&connection)
        .context("Failed to create logind session proxy")?;

    let active = session.active().context("Failed to read session state")?;
    update_console(&on_console, active, &signal_sender, debug_enabled);

    for change in session.receive_active_changed() {
        let active = match change.get() {
            Ok(active) => active,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to read session Active property: {e}");
                continue;
            }
        };
        if !update_console(&on_console, active, &signal_sender, debug_enabled) {
            return Ok(());
        }
    }

    anyhow::bail!("D-Bus connection lost - session property stream ended")
}

/// Store the new console state and notify the main loop if it changed.
///
/// Returns false once the main loop has gone away.
fn update_console(
    on_console: &AtomicBool,
    active: bool,
    signal_sender: &Sender<SignalMessage>,
    debug_enabled: bool,
) -> bool {
    if on_console.swap(active, Ordering::SeqCst) == active {
        return true;
    }

    if debug_enabled {
        log_pipe!();
        log_debug!(
            "Session is {} the active console",
            if active { "now" } else { "no longer" }
        );
    }
    signal_sender.send(SignalMessage::EnvironmentChanged).is_ok()
}
