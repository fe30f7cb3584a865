//! DRM connector enumeration through sysfs.
//!
//! Each `/sys/class/drm/cardN-<connector>` directory exposes a `status` file
//! ("connected"/"disconnected") and the raw `edid` of whatever is plugged in.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::edid::{self, EdidIdentity};

pub const DEFAULT_DRM_ROOT: &str = "/sys/class/drm";

/// Connector name prefixes of internal panels.
const BUILTIN_PREFIXES: [&str; 3] = ["eDP", "LVDS", "DSI"];

/// A connected DRM connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    /// Full sysfs name, e.g. "card1-DP-2".
    pub name: String,
    pub builtin: bool,
    pub identity: Option<EdidIdentity>,
}

impl Connector {
    /// Connector name without the card prefix ("DP-2").
    pub fn short_name(&self) -> &str {
        short_connector_name(&self.name)
    }
}

pub fn short_connector_name(name: &str) -> &str {
    match name.split_once('-') {
        Some((card, rest)) if card.starts_with("card") => rest,
        _ => name,
    }
}

fn is_builtin_connector(short_name: &str) -> bool {
    BUILTIN_PREFIXES
        .iter()
        .any(|prefix| short_name.starts_with(prefix))
}

/// List connected connectors under `root`.
///
/// Connectors with unreadable or malformed EDIDs are still returned with no
/// identity so the caller can fall back to a weaker identifier.
pub fn scan_connectors(root: &Path) -> Result<Vec<Connector>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Failed to read DRM class directory {}", root.display()))?;

    let mut connectors = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("card") || !name.contains('-') {
            continue;
        }
        let path = entry.path();
        if !is_connected(&path) {
            continue;
        }
        let identity = fs::read(path.join("edid"))
            .ok()
            .filter(|bytes| !bytes.is_empty())
            .and_then(|bytes| edid::parse(&bytes).ok());
        let builtin = is_builtin_connector(short_connector_name(&name));
        connectors.push(Connector {
            name,
            builtin,
            identity,
        });
    }

    connectors.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(connectors)
}

/// Cheap fingerprint of connector states used for hotplug polling.
pub fn connector_signature(root: &Path) -> Vec<(String, bool)> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut signature: Vec<(String, bool)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (name.starts_with("card") && name.contains('-'))
                .then(|| (name, is_connected(&entry.path())))
        })
        .collect();
    signature.sort();
    signature
}

fn is_connected(path: &Path) -> bool {
    fs::read_to_string(path.join("status"))
        .map(|status| status.trim() == "connected")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::edid::tests::sample_edid;
    use tempfile::tempdir;

    fn add_connector(root: &Path, name: &str, status: &str, edid: Option<Vec<u8>>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("status"), format!("{status}\n")).unwrap();
        fs::write(dir.join("edid"), edid.unwrap_or_default()).unwrap();
    }

    #[test]
    fn test_scan_connected_connectors() {
        let dir = tempdir().unwrap();
        add_connector(dir.path(), "card1-eDP-1", "connected", Some(sample_edid(0x30E4, 0x0622, 0, None)));
        add_connector(dir.path(), "card1-DP-2", "connected", Some(sample_edid(0x10AC, 0xA0C4, 77, None)));
        add_connector(dir.path(), "card1-HDMI-A-1", "disconnected", None);
        fs::create_dir_all(dir.path().join("card1")).unwrap();

        let connectors = scan_connectors(dir.path()).unwrap();
        assert_eq!(connectors.len(), 2);

        let panel = connectors.iter().find(|c| c.builtin).unwrap();
        assert_eq!(panel.short_name(), "eDP-1");

        let external = connectors.iter().find(|c| !c.builtin).unwrap();
        assert_eq!(external.short_name(), "DP-2");
        assert_eq!(
            external.identity.as_ref().unwrap().display_id().as_str(),
            "DEL-A0C4-4D"
        );
    }

    #[test]
    fn test_connector_without_edid_has_no_identity() {
        let dir = tempdir().unwrap();
        add_connector(dir.path(), "card0-DP-1", "connected", None);

        let connectors = scan_connectors(dir.path()).unwrap();
        assert_eq!(connectors.len(), 1);
        assert!(connectors[0].identity.is_none());
    }

    #[test]
    fn test_signature_tracks_status_changes() {
        let dir = tempdir().unwrap();
        add_connector(dir.path(), "card1-DP-1", "disconnected", None);
        let before = connector_signature(dir.path());

        add_connector(dir.path(), "card1-DP-1", "connected", None);
        let after = connector_signature(dir.path());

        assert_ne!(before, after);
        assert_eq!(after, vec![("card1-DP-1".to_string(), true)]);
    }
}
