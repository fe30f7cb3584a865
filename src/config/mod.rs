//! Configuration system for brightsync.
//!
//! Settings are read from `brightsync.toml` in `$XDG_CONFIG_HOME/brightsync/`
//! (or the directory passed with `--config`). A commented default file is
//! generated on first run. Every field is optional; missing values fall back
//! to the defaults in [`crate::common::constants`].
//!
//! ```toml
//! #[Sampling]
//! update_interval = 0.1        # Seconds between brightness samples (0.02-5.0)
//! locked_offset = false        # Disable drift detection (offsets only change on request)
//!
//! #[Targets]
//! accept_any_target = true     # Every external monitor follows the source
//!
//! [[target]]                   # Accepted target classes when accept_any_target = false
//! vendor = 0x10AC
//! model = 0xA0C4
//!
//! [[source_fallback]]          # External classes allowed to act as source without a panel
//! vendor = 0x10AC
//! model = 0x4142
//!
//! #[Platform]
//! ddcutil_path = "ddcutil"     # DDC/CI helper used for external monitors
//! hotplug_poll_interval = 1.0  # Seconds between connector scans (0.25-10)
//! ```
//!
//! Vendor codes are the big-endian EDID manufacturer id, model codes the EDID
//! product code; `brightsync displays` prints both for attached monitors.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::constants::*;
use crate::core::engine::EngineSettings;
use crate::core::topology::TopologyRules;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

/// A device class: EDID vendor and product codes.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceMatch {
    pub vendor: u32,
    pub model: u32,
}

/// Configuration for the brightsync daemon.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub update_interval: Option<f64>, // seconds between samples
    pub locked_offset: Option<bool>,
    pub accept_any_target: Option<bool>,
    #[serde(default, rename = "target")]
    pub targets: Vec<DeviceMatch>,
    #[serde(default, rename = "source_fallback")]
    pub source_fallbacks: Vec<DeviceMatch>,
    pub ddcutil_path: Option<String>,
    pub hotplug_poll_interval: Option<f64>, // seconds
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        load()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL))
    }

    pub fn locked_offset(&self) -> bool {
        self.locked_offset.unwrap_or(DEFAULT_LOCKED_OFFSET)
    }

    pub fn ddcutil_path(&self) -> &str {
        self.ddcutil_path.as_deref().unwrap_or(DEFAULT_DDCUTIL_PATH)
    }

    pub fn hotplug_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(
            self.hotplug_poll_interval
                .unwrap_or(DEFAULT_HOTPLUG_POLL_INTERVAL),
        )
    }

    /// Settings injected into the synchronization engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            update_interval: self.update_interval(),
            locked_offset: self.locked_offset(),
        }
    }

    pub fn topology_rules(&self) -> TopologyRules {
        TopologyRules {
            accept_any_target: self.accept_any_target.unwrap_or(DEFAULT_ACCEPT_ANY_TARGET),
            targets: self.targets.clone(),
            source_fallbacks: self.source_fallbacks.clone(),
        }
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!(
            "Update interval: {}ms",
            self.update_interval().as_millis()
        );
        log_indented!(
            "Drift correction: {}",
            if self.locked_offset() { "locked" } else { "enabled" }
        );

        let rules = self.topology_rules();
        if rules.accept_any_target {
            log_indented!("Targets: every external monitor");
        } else {
            log_indented!("Targets: {} accepted device class(es)", rules.targets.len());
            for class in &rules.targets {
                log_indented!("  • vendor {:#06X} model {:#06X}", class.vendor, class.model);
            }
        }
        if !rules.source_fallbacks.is_empty() {
            log_indented!(
                "Source fallbacks: {} device class(es)",
                rules.source_fallbacks.len()
            );
        }
        log_indented!("DDC/CI helper: {}", self.ddcutil_path());
    }
}
