//! Display platform abstraction.
//!
//! Everything the synchronization engine needs from the operating system goes
//! through the [`DisplayPlatform`] trait: enumerating displays, identifying
//! them, reading and writing brightness, and learning whether the session
//! owns the console. The engine never touches sysfs, DDC/CI or D-Bus directly.
//!
//! ## Implementations
//!
//! - **Linux**: built-in panel through `/sys/class/backlight`, external
//!   monitors through DDC/CI (`ddcutil`), identity from DRM connector EDIDs
//! - **Fake** (`testing-support` feature): scripted in-memory displays used by
//!   the test suite

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::Sender;

use crate::io::signals::SignalMessage;

pub mod backlight;
pub mod ddc;
pub mod drm;
pub mod edid;
pub mod hotplug;
pub mod linux;

#[cfg(any(test, feature = "testing-support"))]
pub mod fake;

/// Opaque, stable identifier of a physical display.
///
/// Derived from EDID identity where available so it survives reconnects and
/// connector renumbering. Also used to namespace persisted offsets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(String);

impl DisplayId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phase of a display reconfiguration bracket.
///
/// Brackets may nest (a hotplug during suspend); consumers must count them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigurePhase {
    Begin,
    End,
}

/// Operations the engine consumes from the display environment.
#[cfg_attr(test, mockall::automock)]
pub trait DisplayPlatform {
    /// Short name for logs (e.g. "Linux").
    fn platform_name(&self) -> &'static str;

    /// Enumerate currently active displays.
    ///
    /// Refreshes any cached identity information as a side effect.
    fn active_displays(&mut self) -> Result<Vec<DisplayId>>;

    /// Whether the display is the machine's built-in panel.
    fn is_builtin(&self, id: &DisplayId) -> bool;

    /// Vendor and model codes of the display, when known.
    fn vendor_model(&self, id: &DisplayId) -> Option<(u32, u32)>;

    /// Whether this session is the active foreground session.
    fn is_on_console(&self) -> bool;

    /// Read the display's brightness on the linear scale.
    fn linear_brightness(&mut self, id: &DisplayId) -> Result<f64>;

    /// Write a linear-scale brightness to the display.
    fn set_linear_brightness(&mut self, id: &DisplayId, value: f64) -> Result<()>;

    /// Start delivering reconfiguration brackets into the event channel.
    ///
    /// The default implementation delivers nothing.
    fn watch_reconfiguration(
        &mut self,
        sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Result<()> {
        let _ = (sender, debug_enabled);
        Ok(())
    }
}

/// Create the platform for the running system.
pub fn create_platform(
    config: &crate::config::Config,
    on_console: std::sync::Arc<std::sync::atomic::AtomicBool>,
    debug_enabled: bool,
) -> Box<dyn DisplayPlatform> {
    Box::new(linux::LinuxPlatform::new(config, on_console, debug_enabled))
}
