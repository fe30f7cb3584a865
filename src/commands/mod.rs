//! Command-line command handlers for brightsync.
//!
//! Each one-shot command lives in its own submodule. Commands that talk to
//! the daemon go through the IPC socket; the few that must also work without
//! a daemon (offsets, display listing) fall back to local state.

pub mod control;
pub mod displays;
pub mod help;
pub mod offset;
pub mod reload;
pub mod status;
pub mod stop;

use crate::core::status::Status;
use crate::state::ipc::client::IpcClient;
use crate::state::ipc::events::IpcEvent;

/// Read status events until the next `StatusChanged`, skipping the rest.
pub(crate) fn next_status(client: &mut IpcClient) -> anyhow::Result<Status> {
    loop {
        if let IpcEvent::StatusChanged { status, .. } = client.receive()? {
            return Ok(status);
        }
    }
}

/// Format a linear brightness as a percentage.
pub(crate) fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Calculate Levenshtein distance between two strings for similarity matching
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
    for (i, c1) in s1_chars.iter().enumerate() {
        let mut current = vec![i + 1; s2_chars.len() + 1];
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }
    previous[s2_chars.len()]
}

/// Closest known display id to a mistyped one.
///
/// Ids are compared case-insensitively; nothing is suggested when even the
/// best candidate differs in more than a third of its characters.
pub(crate) fn find_similar_display<'a>(target: &str, known: &'a [String]) -> Option<&'a str> {
    let target_lower = target.to_lowercase();
    known
        .iter()
        .map(|id| (id, levenshtein_distance(&target_lower, &id.to_lowercase())))
        .filter(|(id, distance)| *distance * 3 <= id.len().max(target.len()))
        .min_by_key(|(_, distance)| *distance)
        .map(|(id, _)| id.as_str())
}
