//! Built-in panel brightness through `/sys/class/backlight`.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKLIGHT_ROOT: &str = "/sys/class/backlight";

/// A sysfs backlight device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backlight {
    pub name: String,
    path: PathBuf,
}

impl Backlight {
    pub fn at(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    /// Read `(brightness, max_brightness)`.
    pub fn read_raw(&self) -> Result<(u32, u32)> {
        let current = read_u32(&self.path.join("brightness"))?;
        let max = read_u32(&self.path.join("max_brightness"))?;
        if max == 0 {
            bail!("Backlight {} reports max_brightness of 0", self.name);
        }
        Ok((current, max))
    }

    pub fn write_raw(&self, value: u32) -> Result<()> {
        fs::write(self.path.join("brightness"), value.to_string()).with_context(|| {
            format!(
                "Failed to write backlight {} (is the user allowed to write {}?)",
                self.name,
                self.path.join("brightness").display()
            )
        })
    }
}

/// Pick the backlight device that best represents the built-in panel.
///
/// Firmware interfaces are preferred over platform drivers, which are
/// preferred over raw GPU registers.
pub fn find_backlight(root: &Path) -> Option<Backlight> {
    let entries = fs::read_dir(root).ok()?;
    let mut candidates: Vec<(u8, PathBuf)> = entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            let kind = fs::read_to_string(path.join("type")).unwrap_or_default();
            let rank = match kind.trim() {
                "firmware" => 0,
                "platform" => 1,
                _ => 2,
            };
            (rank, path)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next().map(|(_, path)| Backlight::at(path))
}

fn read_u32(path: &Path) -> Result<u32> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    text.trim()
        .parse()
        .with_context(|| format!("Unexpected contents in {}", path.display()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    pub(crate) fn add_backlight(root: &Path, name: &str, kind: &str, current: u32, max: u32) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), format!("{kind}\n")).unwrap();
        fs::write(dir.join("brightness"), format!("{current}\n")).unwrap();
        fs::write(dir.join("max_brightness"), format!("{max}\n")).unwrap();
    }

    #[test]
    fn test_prefers_firmware_interface() {
        let dir = tempdir().unwrap();
        add_backlight(dir.path(), "intel_backlight", "raw", 100, 1000);
        add_backlight(dir.path(), "acpi_video0", "firmware", 5, 10);

        let backlight = find_backlight(dir.path()).unwrap();
        assert_eq!(backlight.name, "acpi_video0");
    }

    #[test]
    fn test_read_and_write_raw() {
        let dir = tempdir().unwrap();
        add_backlight(dir.path(), "intel_backlight", "raw", 9600, 19200);
        let backlight = find_backlight(dir.path()).unwrap();

        assert_eq!(backlight.read_raw().unwrap(), (9600, 19200));
        backlight.write_raw(4800).unwrap();
        assert_eq!(backlight.read_raw().unwrap(), (4800, 19200));
    }

    #[test]
    fn test_zero_max_is_an_error() {
        let dir = tempdir().unwrap();
        add_backlight(dir.path(), "broken", "raw", 0, 0);
        assert!(find_backlight(dir.path()).unwrap().read_raw().is_err());
    }

    #[test]
    fn test_missing_root() {
        assert!(find_backlight(Path::new("/nonexistent/backlight")).is_none());
    }
}
