//! Engine status values and their projection for status sinks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::platform::DisplayId;

/// Per-target snapshot carried by a running status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: DisplayId,
    /// Last observed brightness on the linear scale.
    pub brightness: f64,
    /// Persisted calibration offset on the user scale.
    pub offset: f64,
}

/// State of the synchronization engine.
///
/// Equality is structural so consecutive identical values can be de-duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    /// No usable source or no targets, or not on the active console.
    Deactivated,
    /// Explicitly paused by the user.
    Paused,
    /// Synchronizing targets to the source.
    Running {
        source_brightness: f64,
        targets: Vec<Target>,
    },
}

/// Discriminant of [`Status`] without the sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Deactivated,
    Paused,
    Running,
}

impl Status {
    pub fn kind(&self) -> StatusKind {
        match self {
            Status::Deactivated => StatusKind::Deactivated,
            Status::Paused => StatusKind::Paused,
            Status::Running { .. } => StatusKind::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Status::Running { .. })
    }

    /// Targets of a running status, empty otherwise.
    pub fn targets(&self) -> &[Target] {
        match self {
            Status::Running { targets, .. } => targets,
            _ => &[],
        }
    }

    /// Human-readable projection shown by status sinks.
    pub fn display_text(&self) -> &'static str {
        self.kind().display_text()
    }
}

impl StatusKind {
    pub fn display_text(self) -> &'static str {
        match self {
            StatusKind::Deactivated => "Deactivated",
            StatusKind::Paused => "Paused",
            StatusKind::Running => "Activated",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// Receives the projected status text on every state transition.
pub trait StatusSink {
    fn status_changed(&mut self, text: &'static str);
}

/// Status sink that writes transitions to the daemon log.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn status_changed(&mut self, text: &'static str) {
        log_block_start!("Status: {}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(source: f64) -> Status {
        Status::Running {
            source_brightness: source,
            targets: vec![Target {
                id: DisplayId::new("DEL-A0C4-1"),
                brightness: 0.5,
                offset: 0.0,
            }],
        }
    }

    #[test]
    fn test_projection_strings() {
        assert_eq!(Status::Deactivated.display_text(), "Deactivated");
        assert_eq!(Status::Paused.display_text(), "Paused");
        assert_eq!(running(0.3).display_text(), "Activated");
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(running(0.3), running(0.3));
        assert_ne!(running(0.3), running(0.31));
        assert_ne!(Status::Paused, Status::Deactivated);
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_string(&running(0.25)).unwrap();
        assert!(json.contains("\"state\":\"running\""));
        assert!(json.contains("\"source_brightness\":0.25"));
        assert!(json.contains("\"id\":\"DEL-A0C4-1\""));

        let back: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(back, running(0.25));
    }
}
