//! Periodic sampling clock driven by the main loop.
//!
//! The clock never sleeps on its own; the main loop asks how long it may block
//! and then hands control back with the current instant. Each start stamps the
//! clock with the topology generation it was started for, so a tick that was
//! scheduled for an older topology is recognizably stale.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct SamplingClock {
    interval: Duration,
    next_tick: Option<Instant>,
    generation: u64,
}

impl SamplingClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
            generation: 0,
        }
    }

    /// Start ticking; the first tick is due immediately.
    pub fn start(&mut self, now: Instant, generation: u64) {
        self.next_tick = Some(now);
        self.generation = generation;
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the period. A running clock keeps its next deadline.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// How long until the next tick, `None` when stopped.
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.next_tick
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Consume a due tick, returning the generation it was scheduled for.
    ///
    /// After a stall longer than one period the schedule restarts from `now`
    /// rather than firing a burst of catch-up ticks.
    pub fn take_due(&mut self, now: Instant) -> Option<u64> {
        let deadline = self.next_tick?;
        if now < deadline {
            return None;
        }
        let mut next = deadline + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_tick = Some(next);
        Some(self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn test_stopped_clock_never_fires() {
        let mut clock = SamplingClock::new(TICK);
        let now = Instant::now();
        assert!(!clock.is_running());
        assert_eq!(clock.time_until_tick(now), None);
        assert_eq!(clock.take_due(now + TICK * 10), None);
    }

    #[test]
    fn test_first_tick_is_immediate() {
        let mut clock = SamplingClock::new(TICK);
        let now = Instant::now();
        clock.start(now, 7);

        assert_eq!(clock.time_until_tick(now), Some(Duration::ZERO));
        assert_eq!(clock.take_due(now), Some(7));
        assert_eq!(clock.time_until_tick(now), Some(TICK));
        assert_eq!(clock.take_due(now + TICK / 2), None);
        assert_eq!(clock.take_due(now + TICK), Some(7));
    }

    #[test]
    fn test_stall_does_not_burst() {
        let mut clock = SamplingClock::new(TICK);
        let start = Instant::now();
        clock.start(start, 1);
        clock.take_due(start);

        let late = start + TICK * 5;
        assert_eq!(clock.take_due(late), Some(1));
        assert_eq!(clock.take_due(late), None);
        assert_eq!(clock.time_until_tick(late), Some(TICK));
    }

    #[test]
    fn test_restart_updates_generation() {
        let mut clock = SamplingClock::new(TICK);
        let now = Instant::now();
        clock.start(now, 1);
        clock.stop();
        clock.start(now, 2);
        assert_eq!(clock.take_due(now), Some(2));
    }
}
