//! Linux display platform.
//!
//! The built-in panel is driven through the sysfs backlight class and external
//! monitors through DDC/CI. Stable identities come from the EDID exposed by the
//! DRM connector each monitor is attached to.
//!
//! Hardware brightness is quantized (DDC/CI monitors usually expose 0-100). To
//! keep drift detection meaningful, the last value written to a display is
//! remembered together with its raw level: reading back that same raw level
//! reports the exact value that was written rather than the quantized one.

use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use super::backlight::{self, Backlight, DEFAULT_BACKLIGHT_ROOT};
use super::ddc::{DdcMonitor, Ddcutil};
use super::drm::{self, Connector, DEFAULT_DRM_ROOT};
use super::{DisplayId, DisplayPlatform, hotplug};
use crate::common::utils::clamp_unit;
use crate::config::Config;
use crate::io::signals::SignalMessage;

#[derive(Debug, Clone)]
enum Channel {
    Backlight(Backlight),
    Ddc { bus: u32 },
}

#[derive(Debug, Clone)]
struct DisplayEntry {
    builtin: bool,
    vendor_model: Option<(u32, u32)>,
    label: String,
    channel: Channel,
    max: Option<u32>,
    last_raw: Option<u32>,
    written: Option<(u32, f64)>,
}

/// Display platform backed by sysfs and `ddcutil`.
pub struct LinuxPlatform {
    drm_root: PathBuf,
    backlight_root: PathBuf,
    ddcutil: Ddcutil,
    hotplug_interval: Duration,
    on_console: Arc<AtomicBool>,
    displays: BTreeMap<DisplayId, DisplayEntry>,
    ddc_warned: bool,
    debug_enabled: bool,
}

impl LinuxPlatform {
    /// Create the platform from configuration.
    ///
    /// `on_console` is owned by the session monitor, which flips it when the
    /// session is switched away from or back to.
    pub fn new(config: &Config, on_console: Arc<AtomicBool>, debug_enabled: bool) -> Self {
        Self {
            drm_root: PathBuf::from(DEFAULT_DRM_ROOT),
            backlight_root: PathBuf::from(DEFAULT_BACKLIGHT_ROOT),
            ddcutil: Ddcutil::new(config.ddcutil_path()),
            hotplug_interval: config.hotplug_poll_interval(),
            on_console,
            displays: BTreeMap::new(),
            ddc_warned: false,
            debug_enabled,
        }
    }

    /// Point the platform at alternative sysfs roots.
    pub fn with_roots(mut self, drm_root: PathBuf, backlight_root: PathBuf) -> Self {
        self.drm_root = drm_root;
        self.backlight_root = backlight_root;
        self
    }

    /// Human-readable description of a display for the `displays` command.
    pub fn describe(&self, id: &DisplayId) -> Option<String> {
        self.displays.get(id).map(|entry| {
            let channel = match &entry.channel {
                Channel::Backlight(device) => format!("backlight {}", device.name),
                Channel::Ddc { bus } => format!("DDC/CI bus {bus}"),
            };
            format!("{} ({channel})", entry.label)
        })
    }

    fn scan(&mut self) -> BTreeMap<DisplayId, DisplayEntry> {
        let connectors = match drm::scan_connectors(&self.drm_root) {
            Ok(connectors) => connectors,
            Err(e) => {
                if self.debug_enabled {
                    log_debug!("DRM scan failed: {e}");
                }
                Vec::new()
            }
        };

        let mut found = BTreeMap::new();

        if let Some((id, entry)) = self.scan_builtin(&connectors) {
            found.insert(id, entry);
        }

        match self.ddcutil.detect() {
            Ok(monitors) => {
                self.ddc_warned = false;
                for monitor in monitors {
                    let (id, entry) = external_entry(&monitor, &connectors);
                    found.entry(id).or_insert(entry);
                }
            }
            Err(e) => {
                if !self.ddc_warned {
                    log_warning!("External monitors unavailable: {e}");
                    log_indented!("Install ddcutil and load the i2c-dev module to sync them");
                    self.ddc_warned = true;
                }
            }
        }

        found
    }

    fn scan_builtin(&self, connectors: &[Connector]) -> Option<(DisplayId, DisplayEntry)> {
        let device = backlight::find_backlight(&self.backlight_root)?;
        let panel = connectors.iter().find(|c| c.builtin);

        // A scanned DRM tree without a connected internal connector means the
        // panel is off (lid closed); an unreadable tree is not evidence of that.
        if panel.is_none() && !connectors.is_empty() {
            return None;
        }

        let identity = panel.and_then(|c| c.identity.as_ref());
        let id = identity
            .map(|i| i.display_id())
            .unwrap_or_else(|| DisplayId::new(format!("builtin-{}", device.name)));
        let label = identity
            .and_then(|i| i.name.clone())
            .or_else(|| panel.map(|c| c.short_name().to_string()))
            .unwrap_or_else(|| "Built-in panel".to_string());

        Some((
            id,
            DisplayEntry {
                builtin: true,
                vendor_model: identity.map(|i| (i.vendor, i.product)),
                label,
                channel: Channel::Backlight(device),
                max: None,
                last_raw: None,
                written: None,
            },
        ))
    }

    fn entry_mut(&mut self, id: &DisplayId) -> Result<&mut DisplayEntry> {
        self.displays
            .get_mut(id)
            .ok_or_else(|| anyhow!("Display {id} is not attached"))
    }

    fn read_raw(&self, channel: &Channel) -> Result<(u32, u32)> {
        match channel {
            Channel::Backlight(device) => device.read_raw(),
            Channel::Ddc { bus } => self.ddcutil.get_brightness(*bus),
        }
    }

    fn write_raw(&self, channel: &Channel, raw: u32) -> Result<()> {
        match channel {
            Channel::Backlight(device) => device.write_raw(raw),
            Channel::Ddc { bus } => self.ddcutil.set_brightness(*bus, raw),
        }
    }
}

fn external_entry(monitor: &DdcMonitor, connectors: &[Connector]) -> (DisplayId, DisplayEntry) {
    let connector = monitor
        .connector
        .as_ref()
        .and_then(|name| connectors.iter().find(|c| &c.name == name));
    let identity = connector.and_then(|c| c.identity.as_ref());

    let id = match (identity, &monitor.monitor) {
        (Some(identity), _) => identity.display_id(),
        (None, Some(text)) => DisplayId::new(
            text.split(':')
                .map(|part| part.trim().replace(' ', "_"))
                .collect::<Vec<_>>()
                .join("-"),
        ),
        (None, None) => DisplayId::new(format!("i2c-{}", monitor.bus)),
    };
    let label = identity
        .and_then(|i| i.name.clone())
        .or_else(|| monitor.monitor.clone())
        .unwrap_or_else(|| format!("I2C bus {}", monitor.bus));

    (
        id,
        DisplayEntry {
            builtin: false,
            vendor_model: identity.map(|i| (i.vendor, i.product)),
            label,
            channel: Channel::Ddc { bus: monitor.bus },
            max: None,
            last_raw: None,
            written: None,
        },
    )
}

impl DisplayPlatform for LinuxPlatform {
    fn platform_name(&self) -> &'static str {
        "Linux"
    }

    fn active_displays(&mut self) -> Result<Vec<DisplayId>> {
        let mut found = self.scan();

        // Keep write bookkeeping for displays that are still attached.
        for (id, entry) in found.iter_mut() {
            if let Some(previous) = self.displays.get(id) {
                entry.max = previous.max;
                entry.last_raw = previous.last_raw;
                entry.written = previous.written;
            }
        }

        self.displays = found;
        Ok(self.displays.keys().cloned().collect())
    }

    fn is_builtin(&self, id: &DisplayId) -> bool {
        self.displays.get(id).is_some_and(|entry| entry.builtin)
    }

    fn vendor_model(&self, id: &DisplayId) -> Option<(u32, u32)> {
        self.displays.get(id).and_then(|entry| entry.vendor_model)
    }

    fn is_on_console(&self) -> bool {
        self.on_console.load(Ordering::SeqCst)
    }

    fn linear_brightness(&mut self, id: &DisplayId) -> Result<f64> {
        let channel = self.entry_mut(id)?.channel.clone();
        let (raw, max) = self
            .read_raw(&channel)
            .with_context(|| format!("Failed to read brightness of {id}"))?;

        let entry = self.entry_mut(id)?;
        entry.max = Some(max);
        entry.last_raw = Some(raw);
        Ok(match entry.written {
            Some((written_raw, value)) if written_raw == raw => value,
            _ => f64::from(raw) / f64::from(max),
        })
    }

    fn set_linear_brightness(&mut self, id: &DisplayId, value: f64) -> Result<()> {
        let value = clamp_unit(value);
        let entry = self.entry_mut(id)?;
        let channel = entry.channel.clone();
        let (cached_max, last_raw) = (entry.max, entry.last_raw);

        let max = match cached_max {
            Some(max) => max,
            None => self.read_raw(&channel)?.1,
        };
        let raw = (value * f64::from(max)).round() as u32;

        if last_raw != Some(raw) {
            self.write_raw(&channel, raw)
                .with_context(|| format!("Failed to set brightness of {id}"))?;
        }

        let entry = self.entry_mut(id)?;
        entry.max = Some(max);
        entry.last_raw = Some(raw);
        entry.written = Some((raw, value));
        Ok(())
    }

    fn watch_reconfiguration(
        &mut self,
        sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Result<()> {
        hotplug::start_hotplug_monitor(
            self.drm_root.clone(),
            self.hotplug_interval,
            sender,
            debug_enabled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::backlight::tests::add_backlight;
    use crate::platform::edid::tests::sample_edid;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct Sysfs {
        _dir: TempDir,
        drm: PathBuf,
        backlight: PathBuf,
    }

    fn sysfs(panel_connected: bool) -> Sysfs {
        let dir = tempdir().unwrap();
        let drm = dir.path().join("drm");
        let backlight = dir.path().join("backlight");
        let connector = drm.join("card1-eDP-1");
        fs::create_dir_all(&connector).unwrap();
        let status = if panel_connected { "connected" } else { "disconnected" };
        fs::write(connector.join("status"), status).unwrap();
        fs::write(connector.join("edid"), sample_edid(0x30E4, 0x0622, 9, Some("LP140WF"))).unwrap();
        add_backlight(&backlight, "intel_backlight", "raw", 500, 1000);
        Sysfs {
            _dir: dir,
            drm,
            backlight,
        }
    }

    fn platform(sys: &Sysfs) -> LinuxPlatform {
        let config = Config {
            ddcutil_path: Some("/nonexistent/ddcutil".to_string()),
            ..Config::default()
        };
        LinuxPlatform::new(&config, Arc::new(AtomicBool::new(true)), false)
            .with_roots(sys.drm.clone(), sys.backlight.clone())
    }

    fn raw_brightness(root: &Path) -> String {
        fs::read_to_string(root.join("intel_backlight/brightness"))
            .unwrap()
            .trim()
            .to_string()
    }

    #[test]
    fn test_builtin_panel_identity() {
        let sys = sysfs(true);
        let mut platform = platform(&sys);

        let displays = platform.active_displays().unwrap();
        assert_eq!(displays, vec![DisplayId::new("LGD-0622-9")]);
        assert!(platform.is_builtin(&displays[0]));
        assert_eq!(platform.vendor_model(&displays[0]), Some((0x30E4, 0x0622)));
    }

    #[test]
    fn test_panel_absent_when_lid_closed() {
        let sys = sysfs(false);
        let mut platform = platform(&sys);
        assert!(platform.active_displays().unwrap().is_empty());
    }

    #[test]
    fn test_written_value_reads_back_exactly() {
        let sys = sysfs(true);
        let mut platform = platform(&sys);
        let id = platform.active_displays().unwrap().remove(0);

        assert_eq!(platform.linear_brightness(&id).unwrap(), 0.5);

        platform.set_linear_brightness(&id, 0.3337).unwrap();
        assert_eq!(raw_brightness(&sys.backlight), "334");
        assert_eq!(platform.linear_brightness(&id).unwrap(), 0.3337);
    }

    #[test]
    fn test_external_change_reads_quantized_value() {
        let sys = sysfs(true);
        let mut platform = platform(&sys);
        let id = platform.active_displays().unwrap().remove(0);

        platform.set_linear_brightness(&id, 0.3337).unwrap();
        fs::write(sys.backlight.join("intel_backlight/brightness"), "800").unwrap();
        assert_eq!(platform.linear_brightness(&id).unwrap(), 0.8);
    }

    #[test]
    fn test_unknown_display_is_an_error() {
        let sys = sysfs(true);
        let mut platform = platform(&sys);
        assert!(platform.linear_brightness(&DisplayId::new("nope")).is_err());
    }
}
