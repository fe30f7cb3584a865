//! Offset command - inspect and change per-display calibration offsets.
//!
//! With a running daemon, changes are sent over IPC so the engine applies
//! them on its next tick and remains the only writer of the offsets file.
//! Without one, the file is edited directly.

use anyhow::{Context, Result, bail};

use super::{find_similar_display, next_status};
use crate::args::OffsetAction;
use crate::common::constants::MAXIMUM_OFFSET_MAGNITUDE;
use crate::common::utils::private_path;
use crate::platform::DisplayId;
use crate::state::ipc::client::{IpcClient, send_request};
use crate::state::ipc::events::IpcRequest;
use crate::state::offsets::OffsetStore;

pub fn handle_offset_command(action: OffsetAction) -> Result<()> {
    log_version!();
    // Adopts the daemon's config directory so both sides use one offsets file.
    let _ = crate::io::instance::get_running_instance();
    let store = OffsetStore::open(crate::state::offsets_path()?);
    let daemon_running = IpcClient::is_running();

    match action {
        OffsetAction::List => list_offsets(&store),
        OffsetAction::Set { id, offset } => {
            if !offset.is_finite() || offset.abs() > MAXIMUM_OFFSET_MAGNITUDE {
                bail!("Offset must be within ±{MAXIMUM_OFFSET_MAGNITUDE}");
            }
            warn_if_unknown(&id, &store, daemon_running);

            let id = DisplayId::new(id);
            if daemon_running {
                send_request(&IpcRequest::SetOffset {
                    id: id.clone(),
                    offset,
                })?;
            } else {
                store.set(&id, offset)?;
            }
            log_block_start!("Offset for {} set to {:+.4}", id, offset);
            log_end!();
            Ok(())
        }
        OffsetAction::Reset => {
            if daemon_running {
                send_request(&IpcRequest::ResetOffsets)?;
            } else {
                store.reset_all()?;
            }
            log_block_start!("All display offsets reset");
            log_end!();
            Ok(())
        }
    }
}

fn list_offsets(store: &OffsetStore) -> Result<()> {
    let entries = store.entries();
    if let Some(path) = store.path() {
        log_block_start!("Offsets file: {}", private_path(path));
    }
    if entries.is_empty() {
        log_block_start!("No offsets stored");
    } else {
        log_block_start!("Stored offsets (user brightness scale):");
        for (id, offset) in entries {
            log_indented!("{}: {:+.4}", id, offset);
        }
    }
    log_end!();
    Ok(())
}

/// Point out a likely typo; storing an offset for an unseen display is allowed.
fn warn_if_unknown(id: &str, store: &OffsetStore, daemon_running: bool) {
    let mut known: Vec<String> = store
        .entries()
        .into_iter()
        .map(|(known_id, _)| known_id.to_string())
        .collect();
    if daemon_running && let Ok(targets) = current_target_ids() {
        known.extend(targets);
    }
    if known.is_empty() || known.iter().any(|known_id| known_id == id) {
        return;
    }

    log_pipe!();
    log_warning!("No display with id '{}' has been seen yet", id);
    if let Some(similar) = find_similar_display(id, &known) {
        log_indented!("Did you mean '{}'?", similar);
    }
    log_indented!("Use `brightsync displays` to list display ids");
}

fn current_target_ids() -> Result<Vec<String>> {
    let mut client = IpcClient::connect()?;
    let status = next_status(&mut client).context("Failed to read current state")?;
    Ok(status
        .targets()
        .iter()
        .map(|target| target.id.to_string())
        .collect())
}

/// Display help for the offset command.
pub fn display_help() {
    log_version!();
    log_block_start!("offset - Per-display calibration offsets");
    log_block_start!("Usage: brightsync offset [list | set <id> <value> | reset]");
    log_block_start!("Description:");
    log_indented!("An offset shifts a display along the user brightness scale");
    log_indented!("relative to the built-in panel. Positive values make it brighter.");
    log_indented!("Offsets are also learned automatically when a monitor's brightness");
    log_indented!("is changed by hand, unless locked_offset is enabled.");
    log_indented!(
        "Values are limited to ±{}.",
        MAXIMUM_OFFSET_MAGNITUDE
    );
    log_block_start!("Examples:");
    log_indented!("# Show stored offsets");
    log_indented!("brightsync offset list");
    log_pipe!();
    log_indented!("# Make a monitor slightly darker than the panel");
    log_indented!("brightsync offset set DEL-A0C4-1 -0.05");
    log_pipe!();
    log_indented!("# Forget all calibration");
    log_indented!("brightsync offset reset");
    log_end!();
}
