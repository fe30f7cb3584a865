//! Wire types of the IPC socket.
//!
//! The protocol is newline-delimited JSON in both directions: the daemon
//! broadcasts [`IpcEvent`]s, clients may send [`IpcRequest`]s.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::constants::MAXIMUM_OFFSET_MAGNITUDE;
use crate::core::status::Status;
use crate::io::signals::SignalMessage;
use crate::platform::DisplayId;

/// Events broadcast by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum IpcEvent {
    /// The engine published a new status.
    ///
    /// Sent for every distinct status, including changes of sampled values
    /// while running. New clients receive the latest one on connect.
    StatusChanged {
        /// Projected status text ("Activated", "Paused", "Deactivated")
        text: String,
        status: Status,
        timestamp: DateTime<Local>,
    },

    /// The stored offsets changed.
    OffsetsChanged { offsets: BTreeMap<DisplayId, f64> },
}

impl IpcEvent {
    pub fn status_changed(status: &Status) -> Self {
        IpcEvent::StatusChanged {
            text: status.display_text().to_string(),
            status: status.clone(),
            timestamp: Local::now(),
        }
    }

    pub fn offsets_changed(entries: Vec<(DisplayId, f64)>) -> Self {
        IpcEvent::OffsetsChanged {
            offsets: entries.into_iter().collect(),
        }
    }
}

/// Control requests accepted from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum IpcRequest {
    Pause,
    Resume,
    Toggle,
    SetOffset { id: DisplayId, offset: f64 },
    ResetOffsets,
}

impl IpcRequest {
    /// Validate the request and turn it into a main-loop message.
    pub fn into_signal(self) -> Result<SignalMessage> {
        Ok(match self {
            IpcRequest::Pause => SignalMessage::SetPaused(true),
            IpcRequest::Resume => SignalMessage::SetPaused(false),
            IpcRequest::Toggle => SignalMessage::TogglePause,
            IpcRequest::SetOffset { id, offset } => {
                if !offset.is_finite() || offset.abs() > MAXIMUM_OFFSET_MAGNITUDE {
                    bail!(
                        "Offset {offset} for {id} is outside ±{MAXIMUM_OFFSET_MAGNITUDE}"
                    );
                }
                SignalMessage::SetOffset { id, offset }
            }
            IpcRequest::ResetOffsets => SignalMessage::ResetOffsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::Target;

    #[test]
    fn test_status_event_serialization() {
        let status = Status::Running {
            source_brightness: 0.5,
            targets: vec![Target {
                id: DisplayId::new("DEL-A0C4-1"),
                brightness: 0.48,
                offset: -0.02,
            }],
        };
        let json = serde_json::to_string(&IpcEvent::status_changed(&status)).unwrap();

        assert!(json.contains("\"event_type\":\"status_changed\""));
        assert!(json.contains("\"text\":\"Activated\""));
        assert!(json.contains("\"state\":\"running\""));

        match serde_json::from_str::<IpcEvent>(&json).unwrap() {
            IpcEvent::StatusChanged { status: parsed, .. } => assert_eq!(parsed, status),
            other => panic!("Wrong event type deserialized: {other:?}"),
        }
    }

    #[test]
    fn test_offsets_event_keys_are_display_ids() {
        let event = IpcEvent::offsets_changed(vec![(DisplayId::new("GSM-5B08-7"), 0.1)]);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"offsets\":{\"GSM-5B08-7\":0.1}"));
    }

    #[test]
    fn test_request_parsing() {
        let request: IpcRequest =
            serde_json::from_str(r#"{"request":"set_offset","id":"DEL-A0C4-1","offset":0.25}"#)
                .unwrap();
        assert_eq!(
            request.into_signal().unwrap(),
            SignalMessage::SetOffset {
                id: DisplayId::new("DEL-A0C4-1"),
                offset: 0.25
            }
        );

        let toggle: IpcRequest = serde_json::from_str(r#"{"request":"toggle"}"#).unwrap();
        assert_eq!(toggle.into_signal().unwrap(), SignalMessage::TogglePause);
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        let request = IpcRequest::SetOffset {
            id: DisplayId::new("DEL-A0C4-1"),
            offset: 7.5,
        };
        assert!(request.into_signal().is_err());
    }
}
