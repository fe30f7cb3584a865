//! Displays command - enumerate displays and show how they would be synced.
//!
//! Runs the same enumeration and classification as the daemon, without
//! writing anything, so device matching rules can be checked before starting.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use super::percent;
use crate::config::Config;
use crate::core::topology::DisplayTopology;
use crate::platform::linux::LinuxPlatform;
use crate::platform::{DisplayId, DisplayPlatform};

/// How a display takes part in synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Source,
    Target,
    Ignored,
}

impl Role {
    fn of(id: &DisplayId, topology: &DisplayTopology) -> Self {
        if topology.source.as_ref() == Some(id) {
            Role::Source
        } else if topology.targets.contains(id) {
            Role::Target
        } else {
            Role::Ignored
        }
    }

    fn label(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Target => "target",
            Role::Ignored => "ignored",
        }
    }
}

fn vendor_model_text(vendor_model: Option<(u32, u32)>) -> String {
    match vendor_model {
        Some((vendor, model)) => format!("vendor 0x{vendor:04X}, model 0x{model:04X}"),
        None => "vendor/model unknown".to_string(),
    }
}

pub fn handle_displays_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let _ = crate::io::instance::get_running_instance();
    let config = Config::load()?;
    // Listing is informational; classify as if the session owned the console.
    let mut platform =
        LinuxPlatform::new(&config, Arc::new(AtomicBool::new(true)), debug_enabled);
    let scan = DisplayTopology::compute(&mut platform, &config.topology_rules())?;

    if scan.present.is_empty() {
        log_block_start!("No displays found");
        log_indented!("The built-in panel needs /sys/class/backlight and external");
        log_indented!("monitors need ddcutil with access to /dev/i2c-*");
        log_end!();
        return Ok(());
    }

    log_block_start!("Displays:");
    for id in &scan.present {
        let role = Role::of(id, &scan.topology);
        log_indented!("{} [{}]", id, role.label());
        if let Some(description) = platform.describe(id) {
            log_indented!("  {}", description);
        }
        log_indented!("  {}", vendor_model_text(platform.vendor_model(id)));
        match platform.linear_brightness(id) {
            Ok(brightness) => log_indented!("  Brightness: {}", percent(brightness)),
            Err(e) => log_indented!("  Brightness unavailable: {}", e),
        }
    }

    log_block_start!(
        "Synchronization would be {}",
        if scan.topology.is_active() {
            "active"
        } else {
            "inactive"
        }
    );
    if scan.topology.source.is_none() {
        log_indented!("No built-in panel or configured source fallback was found");
    } else if scan.topology.targets.is_empty() {
        log_indented!("No display is accepted as a target");
    }
    log_end!();
    Ok(())
}

/// Display help for the displays command.
pub fn display_help() {
    log_version!();
    log_block_start!("displays - List displays and their roles");
    log_block_start!("Usage: brightsync displays [--debug]");
    log_block_start!("Description:");
    log_indented!("Enumerates the built-in panel and DDC/CI monitors, then shows which");
    log_indented!("display would be the source and which would follow it, using the");
    log_indented!("current configuration. Nothing is written.");
    log_indented!("The ids shown here are the ones used by `brightsync offset`.");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_follow_topology() {
        let topology = DisplayTopology {
            source: Some(DisplayId::new("builtin")),
            targets: [DisplayId::new("DEL-A0C4-1")].into_iter().collect(),
        };
        assert_eq!(Role::of(&DisplayId::new("builtin"), &topology), Role::Source);
        assert_eq!(Role::of(&DisplayId::new("DEL-A0C4-1"), &topology), Role::Target);
        assert_eq!(Role::of(&DisplayId::new("GSM-5B08-7"), &topology), Role::Ignored);
    }

    #[test]
    fn test_vendor_model_text() {
        assert_eq!(
            vendor_model_text(Some((0x10AC, 0xA0C4))),
            "vendor 0x10AC, model 0xA0C4"
        );
        assert_eq!(vendor_model_text(None), "vendor/model unknown");
    }
}
