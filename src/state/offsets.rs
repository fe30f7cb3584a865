//! Persisted per-display calibration offsets.
//!
//! Offsets live in a flat JSON object keyed by `offset.<display-id>`, on the
//! user brightness scale. The in-memory map is the source of truth while the
//! daemon runs; every mutation is written through with an atomic rename so a
//! crash never leaves a half-written file behind.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::common::utils::private_path;
use crate::platform::DisplayId;

const KEY_PREFIX: &str = "offset.";

/// Key/value store of calibration offsets, shared between threads via `Arc`.
#[derive(Debug)]
pub struct OffsetStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, f64>>,
}

fn key_for(id: &DisplayId) -> String {
    format!("{KEY_PREFIX}{id}")
}

impl OffsetStore {
    /// Open the store backed by `path`.
    ///
    /// A missing file is an empty store. A corrupt file is reported and
    /// treated as empty; it is replaced on the next write.
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, f64>>(&text) {
                Ok(map) => map
                    .into_iter()
                    .filter(|(key, value)| key.starts_with(KEY_PREFIX) && value.is_finite())
                    .collect(),
                Err(e) => {
                    log_warning!(
                        "Ignoring unreadable offsets file {}: {e}",
                        private_path(&path)
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: Some(path),
            entries: RwLock::new(entries),
        }
    }

    /// Store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Offset for `id`, 0.0 when none has been stored.
    pub fn get(&self, id: &DisplayId) -> f64 {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key_for(id))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&self, id: &DisplayId, offset: f64) -> Result<()> {
        if !offset.is_finite() {
            bail!("Refusing to store non-finite offset for {id}");
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key_for(id), offset);
        self.persist(&entries)
    }

    /// Remove every stored offset.
    pub fn reset_all(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.persist(&entries)
    }

    /// All stored offsets ordered by display id.
    pub fn entries(&self) -> Vec<(DisplayId, f64)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(KEY_PREFIX)
                    .map(|id| (DisplayId::new(id), *value))
            })
            .collect()
    }

    // Called with the write lock held so concurrent writers persist in order.
    fn persist(&self, entries: &BTreeMap<String, f64>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = path
            .parent()
            .context("Offsets path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory {}", private_path(dir)))?;

        let json = serde_json::to_string_pretty(entries)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary offsets file")?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(path)
            .with_context(|| format!("Failed to replace {}", private_path(path)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dell() -> DisplayId {
        DisplayId::new("DEL-A0C4-1")
    }

    #[test]
    fn test_missing_key_defaults_to_zero() {
        let store = OffsetStore::in_memory();
        assert_eq!(store.get(&dell()), 0.0);
    }

    #[test]
    fn test_write_through_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/offsets.json");

        let store = OffsetStore::open(path.clone());
        store.set(&dell(), -0.125).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"offset.DEL-A0C4-1\": -0.125"));

        let reopened = OffsetStore::open(path);
        assert_eq!(reopened.get(&dell()), -0.125);
        assert_eq!(reopened.entries(), vec![(dell(), -0.125)]);
    }

    #[test]
    fn test_reset_all_clears_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        let store = OffsetStore::open(path.clone());
        store.set(&dell(), 0.2).unwrap();
        store.set(&DisplayId::new("GSM-5B08-7"), 0.1).unwrap();

        store.reset_all().unwrap();
        assert!(store.entries().is_empty());
        assert!(OffsetStore::open(path).entries().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        fs::write(&path, "{ not json").unwrap();

        let store = OffsetStore::open(path.clone());
        assert_eq!(store.get(&dell()), 0.0);

        store.set(&dell(), 0.05).unwrap();
        assert_eq!(OffsetStore::open(path).get(&dell()), 0.05);
    }

    #[test]
    fn test_rejects_non_finite_offset() {
        let store = OffsetStore::in_memory();
        assert!(store.set(&dell(), f64::NAN).is_err());
        assert_eq!(store.get(&dell()), 0.0);
    }
}
