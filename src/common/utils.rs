//! Shared helpers used across brightsync modules.

use std::path::{Path, PathBuf};

/// Render a path for log output with the home directory collapsed to `~`.
///
/// Keeps user names out of logs that people paste into bug reports.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Runtime directory for sockets and lock files.
///
/// `$XDG_RUNTIME_DIR` first, then `/run/user/<uid>`.
pub fn runtime_dir() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(format!("/run/user/{}", nix::unistd::getuid())),
    }
}

/// Check if a process with the given PID is still alive.
pub fn is_process_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Clamp a brightness value into the unit interval.
///
/// NaN collapses to 0.0 so a bad reading can never reach a display.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_path_collapses_home() {
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".config/brightsync/brightsync.toml");
            assert_eq!(private_path(&path), "~/.config/brightsync/brightsync.toml");
        }
    }

    #[test]
    fn test_private_path_outside_home() {
        assert_eq!(private_path(Path::new("/etc/brightsync")), "/etc/brightsync");
    }

    #[test]
    fn test_clamp_unit_bounds() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }
}
