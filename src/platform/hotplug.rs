//! Connector hotplug detection.
//!
//! Polls DRM connector status and reports each change as a reconfiguration
//! bracket: `Begin` as soon as a change is seen, `End` once the connector set
//! has been stable for one more poll.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use super::ReconfigurePhase;
use super::drm::connector_signature;
use crate::io::signals::SignalMessage;

/// Spawn the hotplug polling thread.
///
/// The thread exits when the receiving end of `sender` is dropped.
pub fn start_hotplug_monitor(
    drm_root: PathBuf,
    interval: Duration,
    sender: Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    thread::Builder::new()
        .name("hotplug-monitor".to_string())
        .spawn(move || monitor_connectors(drm_root, interval, sender, debug_enabled))
        .context("Failed to spawn hotplug monitor thread")?;
    Ok(())
}

fn monitor_connectors(
    drm_root: PathBuf,
    interval: Duration,
    sender: Sender<SignalMessage>,
    debug_enabled: bool,
) {
    let mut known = connector_signature(&drm_root);

    loop {
        thread::sleep(interval);
        let current = connector_signature(&drm_root);
        if current == known {
            continue;
        }

        if debug_enabled {
            log_pipe!();
            log_debug!("Display connectors changed, waiting for them to settle");
        }
        if sender
            .send(SignalMessage::Reconfigure(ReconfigurePhase::Begin))
            .is_err()
        {
            return;
        }

        let mut settled = current;
        loop {
            thread::sleep(interval);
            let next = connector_signature(&drm_root);
            if next == settled {
                break;
            }
            settled = next;
        }
        known = settled;

        if sender
            .send(SignalMessage::Reconfigure(ReconfigurePhase::End))
            .is_err()
        {
            return;
        }
    }
}
