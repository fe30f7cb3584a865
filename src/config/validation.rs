//! Configuration validation.
//!
//! Rejects values that would make the engine misbehave (sampling faster than
//! the hardware can answer, non-finite intervals) and warns about settings
//! that are legal but almost certainly mistakes.

use anyhow::{Result, bail};
use std::collections::HashSet;

use super::{Config, DeviceMatch};
use crate::common::constants::*;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(interval) = config.update_interval {
        validate_range(
            interval,
            MINIMUM_UPDATE_INTERVAL,
            MAXIMUM_UPDATE_INTERVAL,
            "update_interval",
        )?;
    }

    if let Some(interval) = config.hotplug_poll_interval {
        validate_range(
            interval,
            MINIMUM_HOTPLUG_POLL_INTERVAL,
            MAXIMUM_HOTPLUG_POLL_INTERVAL,
            "hotplug_poll_interval",
        )?;
    }

    if let Some(path) = &config.ddcutil_path
        && path.trim().is_empty()
    {
        bail!("ddcutil_path must not be empty");
    }

    validate_device_classes(&config.targets, "target")?;
    validate_device_classes(&config.source_fallbacks, "source_fallback")?;

    if config.accept_any_target == Some(false) && config.targets.is_empty() {
        log_pipe!();
        log_warning!("accept_any_target is disabled but no [[target]] entries are configured");
        log_indented!("No external monitor will follow the built-in panel");
    }

    if config.targets.iter().any(|t| config.source_fallbacks.contains(t)) {
        log_pipe!();
        log_warning!("A device class is listed both as [[target]] and [[source_fallback]]");
        log_indented!("A monitor acting as source is never synchronized as a target");
    }

    Ok(())
}

fn validate_range(value: f64, min: f64, max: f64, name: &str) -> Result<()> {
    if !value.is_finite() || !(min..=max).contains(&value) {
        bail!("{name} ({value}) must be between {min} and {max} seconds");
    }
    Ok(())
}

fn validate_device_classes(classes: &[DeviceMatch], table: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for class in classes {
        if class.vendor > u32::from(u16::MAX) || class.model > u32::from(u16::MAX) {
            bail!(
                "[[{table}]] vendor and model are 16-bit EDID codes (got vendor {:#X}, model {:#X})",
                class.vendor,
                class.model
            );
        }
        if !seen.insert(class) {
            log_pipe!();
            log_warning!(
                "Duplicate [[{table}]] entry: vendor {:#06X} model {:#06X}",
                class.vendor,
                class.model
            );
        }
    }
    Ok(())
}
