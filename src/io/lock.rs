//! Lock file management for single-instance enforcement.
//!
//! The lock is an `fs2` exclusive lock on `brightsync.lock` in the runtime
//! directory. The kernel drops the lock when the holder exits, so a leftover
//! file from a crashed daemon never blocks a new one; its contents are simply
//! overwritten.
//!
//! Lock file format:
//! - Line 1: PID
//! - Line 2: Config directory (empty if default)

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::utils;
use crate::config;

/// Path of the daemon lock file.
pub fn get_main_lock_path() -> PathBuf {
    utils::runtime_dir().join("brightsync.lock")
}

/// Held exclusive lock; released explicitly on shutdown or when dropped.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` when another live process holds it.
    pub fn acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Opened without truncation so a held lock keeps its owner's PID.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        match config::get_custom_config_dir() {
            Some(dir) => writeln!(file, "{}", dir.display())?,
            None => writeln!(file)?,
        }
        file.flush()?;

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and remove the lock file.
    pub fn release(self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("brightsync.lock");

        let held = LockFile::acquire(&path).unwrap().expect("first lock");
        assert!(LockFile::acquire(&path).unwrap().is_none());

        let contents = std::fs::read_to_string(held.path()).unwrap();
        assert_eq!(
            contents.lines().next(),
            Some(std::process::id().to_string().as_str())
        );

        held.release();
        assert!(!path.exists());
        assert!(LockFile::acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_leftover_file_is_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("brightsync.lock");
        std::fs::write(&path, "99999999\n\n").unwrap();

        let lock = LockFile::acquire(&path).unwrap().expect("stale file");
        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert!(!contents.contains("99999999"));
    }
}
