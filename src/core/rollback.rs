//! Short history of recent running snapshots.
//!
//! Losing the source panel (lid close, undock) tends to be preceded by a burst
//! of bogus readings, which the engine has already propagated to the targets
//! by the time the topology change arrives. The window keeps what was applied
//! over the last couple of seconds so the oldest of those values can be put
//! back once.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::status::Target;

#[derive(Debug)]
pub struct RollbackWindow {
    span: Duration,
    snapshots: VecDeque<(Instant, Vec<Target>)>,
}

impl RollbackWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            snapshots: VecDeque::new(),
        }
    }

    /// Remember the targets applied at `now`.
    pub fn record(&mut self, now: Instant, targets: Vec<Target>) {
        self.prune(now);
        self.snapshots.push_back((now, targets));
    }

    /// Take the snapshot closest to one full span ago and forget the rest.
    ///
    /// Returns `None` when nothing was recorded within the span.
    pub fn take_replay(&mut self, now: Instant) -> Option<Vec<Target>> {
        self.prune(now);
        let oldest = self.snapshots.pop_front().map(|(_, targets)| targets);
        self.snapshots.clear();
        oldest
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        let Some(horizon) = now.checked_sub(self.span) else {
            return;
        };
        while let Some((recorded, _)) = self.snapshots.front() {
            if *recorded < horizon {
                self.snapshots.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DisplayId;

    const SPAN: Duration = Duration::from_secs(2);

    fn targets(brightness: f64) -> Vec<Target> {
        vec![Target {
            id: DisplayId::new("DEL-A0C4-1"),
            brightness,
            offset: 0.0,
        }]
    }

    #[test]
    fn test_replays_oldest_in_window() {
        let mut window = RollbackWindow::new(SPAN);
        let start = Instant::now();
        window.record(start, targets(0.4));
        window.record(start + Duration::from_millis(500), targets(0.6));
        window.record(start + Duration::from_millis(1500), targets(1.0));

        let replay = window.take_replay(start + Duration::from_millis(1600));
        assert_eq!(replay, Some(targets(0.4)));
        assert!(window.is_empty());
    }

    #[test]
    fn test_stale_snapshots_are_dropped() {
        let mut window = RollbackWindow::new(SPAN);
        let start = Instant::now();
        window.record(start, targets(0.4));
        window.record(start + Duration::from_secs(1), targets(0.7));

        let replay = window.take_replay(start + Duration::from_millis(2500));
        assert_eq!(replay, Some(targets(0.7)));
    }

    #[test]
    fn test_nothing_recent_means_no_replay() {
        let mut window = RollbackWindow::new(SPAN);
        let start = Instant::now();
        window.record(start, targets(0.4));

        assert_eq!(window.take_replay(start + Duration::from_secs(3)), None);
    }

    #[test]
    fn test_replay_is_one_shot() {
        let mut window = RollbackWindow::new(SPAN);
        let start = Instant::now();
        window.record(start, targets(0.4));

        assert!(window.take_replay(start).is_some());
        assert_eq!(window.take_replay(start), None);
    }
}
