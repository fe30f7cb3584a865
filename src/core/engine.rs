//! The brightness synchronization engine.
//!
//! `SyncEngine` owns every piece of mutable synchronization state: the current
//! topology, the pause flag, the sampling clock, the drift expectations and
//! the rollback window. It is driven from a single thread by the main loop,
//! which forwards events and hands over control whenever a tick is due. All
//! methods take the current `Instant` explicitly so the integration tests can
//! run the engine on logical time.
//!
//! ## State evaluation
//!
//! `Paused` wins over everything, then `Running` when the topology has a
//! source and at least one target, otherwise `Deactivated`. The sampling
//! clock runs exactly while the engine is in (or entering) `Running`.

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::constants::{DRIFT_THRESHOLD, ROLLBACK_WINDOW_SECS};
use crate::common::utils::clamp_unit;
use crate::core::clock::SamplingClock;
use crate::core::curve::{adjusted_brightness, clamp_curve_input, linear_to_user};
use crate::core::rollback::RollbackWindow;
use crate::core::status::{Status, StatusSink, Target};
use crate::core::topology::{DisplayTopology, ReconfigurationTracker, TopologyRules};
use crate::platform::{DisplayId, DisplayPlatform};
use crate::state::ipc::IpcNotifier;
use crate::state::offsets::OffsetStore;

/// Runtime settings injected into the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Sampling period while running.
    pub update_interval: Duration,
    /// Never fold manual target changes into the stored offsets.
    pub locked_offset: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(100),
            locked_offset: false,
        }
    }
}

/// Everything needed to construct a [`SyncEngine`].
pub struct EngineParams {
    pub platform: Box<dyn DisplayPlatform>,
    pub offsets: Arc<OffsetStore>,
    pub sink: Box<dyn StatusSink>,
    pub notifier: Option<IpcNotifier>,
    pub settings: EngineSettings,
    pub rules: TopologyRules,
    pub debug_enabled: bool,
}

/// Offset delta attributed to a manual change on a target.
///
/// `expected` is what the engine wrote on the previous tick and `observed`
/// what the target reports now, both on the linear scale. Differences up to
/// the drift threshold are treated as read-back noise.
pub fn drift_correction(expected: f64, observed: f64) -> Option<f64> {
    if (observed - expected).abs() <= DRIFT_THRESHOLD {
        return None;
    }
    Some(linear_to_user(clamp_curve_input(observed)) - linear_to_user(clamp_curve_input(expected)))
}

pub struct SyncEngine {
    platform: Box<dyn DisplayPlatform>,
    offsets: Arc<OffsetStore>,
    sink: Box<dyn StatusSink>,
    notifier: Option<IpcNotifier>,
    rules: TopologyRules,
    settings: EngineSettings,
    debug_enabled: bool,

    topology: DisplayTopology,
    /// Bumped on every topology replacement; ticks carry the value they were
    /// scheduled under.
    generation: u64,
    reconfiguration: ReconfigurationTracker,
    clock: SamplingClock,
    rollback: RollbackWindow,
    /// Value written to each target on the previous tick.
    expected: HashMap<DisplayId, f64>,
    /// Replay that became due while a reconfiguration was in progress.
    pending_replay: Option<Vec<Target>>,
    paused: bool,
    status: Status,
}

impl SyncEngine {
    /// Create an engine in the `Deactivated` state with an empty topology.
    ///
    /// Call [`SyncEngine::refresh_topology`] to pick up the attached displays.
    pub fn new(params: EngineParams) -> Self {
        let engine = Self {
            platform: params.platform,
            offsets: params.offsets,
            sink: params.sink,
            notifier: params.notifier,
            clock: SamplingClock::new(params.settings.update_interval),
            rules: params.rules,
            settings: params.settings,
            debug_enabled: params.debug_enabled,
            topology: DisplayTopology::deactivated(),
            generation: 0,
            reconfiguration: ReconfigurationTracker::new(),
            rollback: RollbackWindow::new(Duration::from_secs(ROLLBACK_WINDOW_SECS)),
            expected: HashMap::new(),
            pending_replay: None,
            paused: false,
            status: Status::Deactivated,
        };

        if let Some(notifier) = &engine.notifier {
            notifier.send_status(&engine.status);
            notifier.send_offsets(engine.offsets.entries());
        }
        engine
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn topology(&self) -> &DisplayTopology {
        &self.topology
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.reconfiguration.is_reconfiguring()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn offsets(&self) -> &Arc<OffsetStore> {
        &self.offsets
    }

    pub fn platform_name(&self) -> &'static str {
        self.platform.platform_name()
    }

    /// Re-enumerate displays and re-evaluate the state.
    ///
    /// Ignored while a reconfiguration is in progress; the closing bracket
    /// recomputes the topology anyway.
    pub fn refresh_topology(&mut self, now: Instant) {
        if self.reconfiguration.is_reconfiguring() {
            if self.debug_enabled {
                log_debug!("Topology refresh deferred until reconfiguration settles");
            }
            return;
        }
        self.recompute_topology();
        self.evaluate(now);
    }

    /// Handle the start of a reconfiguration bracket.
    ///
    /// The outermost bracket drops the topology before anything else happens,
    /// so no write can reach a display that is being detached.
    pub fn reconfiguration_began(&mut self, now: Instant) {
        if !self.reconfiguration.begin() {
            if self.debug_enabled {
                log_debug!(
                    "Nested reconfiguration (depth {})",
                    self.reconfiguration.depth()
                );
            }
            return;
        }

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Display reconfiguration started");
        }
        self.replace_topology(DisplayTopology::deactivated());
        self.evaluate(now);
    }

    /// Handle the end of a reconfiguration bracket.
    ///
    /// Once every bracket has closed the topology is recomputed, a replay
    /// deferred during the reconfiguration is applied to the displays that are
    /// still present, and the state is re-evaluated.
    pub fn reconfiguration_ended(&mut self, now: Instant) {
        if !self.reconfiguration.end() {
            if self.debug_enabled {
                log_debug!(
                    "Reconfiguration still in progress (depth {})",
                    self.reconfiguration.depth()
                );
            }
            return;
        }

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Display reconfiguration settled");
        }
        let present = self.recompute_topology();
        if let Some(replay) = self.pending_replay.take() {
            match present {
                Some(present) => self.apply_replay(&replay, Some(&present)),
                None => {
                    if self.debug_enabled {
                        log_debug!("Dropping deferred replay: displays could not be enumerated");
                    }
                }
            }
        }
        self.evaluate(now);
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        log_block_start!("{}", if paused { "Pausing synchronization" } else { "Resuming synchronization" });
        self.evaluate(now);
    }

    pub fn toggle_pause(&mut self, now: Instant) {
        self.set_paused(!self.paused, now);
    }

    /// Store a calibration offset for one display.
    ///
    /// Takes effect on the next tick; the display does not need to be a
    /// current target.
    pub fn set_offset(&mut self, id: &DisplayId, offset: f64) -> Result<()> {
        self.offsets
            .set(id, offset)
            .with_context(|| format!("Failed to store offset for {id}"))?;
        log_decorated!("Offset for {} set to {:+.4}", id, offset);
        self.notify_offsets();
        Ok(())
    }

    /// Clear every stored calibration offset.
    pub fn reset_offsets(&mut self) -> Result<()> {
        self.offsets
            .reset_all()
            .context("Failed to reset stored offsets")?;
        log_decorated!("All display offsets reset");
        self.notify_offsets();
        Ok(())
    }

    /// Apply reloaded settings and rules, then refresh the topology.
    pub fn apply_settings(&mut self, settings: EngineSettings, rules: TopologyRules, now: Instant) {
        if settings.update_interval != self.clock.interval() {
            self.clock.set_interval(settings.update_interval);
        }
        if settings.locked_offset && !self.settings.locked_offset {
            self.expected.clear();
        }
        self.settings = settings;
        self.rules = rules;
        self.refresh_topology(now);
    }

    /// How long the caller may block before the next tick is due.
    ///
    /// `None` while the clock is stopped.
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.clock.time_until_tick(now)
    }

    /// Run a tick if one is due at `now`.
    pub fn poll(&mut self, now: Instant) {
        let Some(generation) = self.clock.take_due(now) else {
            return;
        };
        if generation != self.generation {
            if self.debug_enabled {
                log_debug!("Dropping tick scheduled for an outdated topology");
            }
            return;
        }
        self.tick(now);
    }

    /// Go idle for good: no replay, no further writes.
    pub fn shutdown(&mut self, now: Instant) {
        self.rollback.clear();
        self.pending_replay = None;
        self.replace_topology(DisplayTopology::deactivated());
        self.publish(Status::Deactivated, now);
    }

    fn evaluate(&mut self, now: Instant) {
        if self.paused {
            self.publish(Status::Paused, now);
        } else if self.topology.is_active() {
            if !self.clock.is_running() {
                self.clock.start(now, self.generation);
                self.poll(now);
            }
        } else {
            self.publish(Status::Deactivated, now);
        }
    }

    /// Recompute the topology, returning every enumerated display.
    ///
    /// An enumeration failure leaves the engine with an empty topology.
    fn recompute_topology(&mut self) -> Option<BTreeSet<DisplayId>> {
        match DisplayTopology::compute(self.platform.as_mut(), &self.rules) {
            Ok(scan) => {
                self.replace_topology(scan.topology);
                Some(scan.present)
            }
            Err(e) => {
                log_warning!("Failed to enumerate displays: {e}");
                self.replace_topology(DisplayTopology::deactivated());
                None
            }
        }
    }

    fn replace_topology(&mut self, topology: DisplayTopology) {
        if topology == self.topology {
            return;
        }

        if topology.is_active() {
            log_block_start!(
                "Source: {}",
                topology
                    .source
                    .as_ref()
                    .map(DisplayId::to_string)
                    .unwrap_or_default()
            );
            for target in &topology.targets {
                log_indented!("Target: {}", target);
            }
        } else if self.topology.is_active() && self.debug_enabled {
            log_debug!("No source and target pair available");
        }

        self.generation += 1;
        self.clock.stop();
        self.expected.retain(|id, _| topology.targets.contains(id));
        self.topology = topology;
    }

    fn tick(&mut self, now: Instant) {
        let Some(source) = self.topology.source.clone() else {
            return;
        };

        let source_brightness = match self.platform.linear_brightness(&source) {
            Ok(value) => clamp_unit(value),
            Err(e) => {
                if self.debug_enabled {
                    log_warning!("Skipping tick, failed to read {source}: {e}");
                }
                return;
            }
        };

        let ids: Vec<DisplayId> = self.topology.targets.iter().cloned().collect();
        let mut targets = Vec::with_capacity(ids.len());
        let mut applied = Vec::with_capacity(ids.len());
        let mut offsets_changed = false;

        for id in ids {
            match self.sync_target(&id, source_brightness, &mut offsets_changed) {
                Ok((target, value)) => {
                    applied.push(Target {
                        brightness: value,
                        ..target.clone()
                    });
                    targets.push(target);
                }
                Err(e) => {
                    self.expected.remove(&id);
                    if self.debug_enabled {
                        log_warning!("Skipping {id} this tick: {e:#}");
                    }
                }
            }
        }

        if offsets_changed {
            self.notify_offsets();
        }

        self.rollback.record(now, applied);
        self.publish(
            Status::Running {
                source_brightness,
                targets,
            },
            now,
        );
    }

    /// Drift-correct, compute and write one target.
    ///
    /// Returns the status entry and the value that was written.
    fn sync_target(
        &mut self,
        id: &DisplayId,
        source_brightness: f64,
        offsets_changed: &mut bool,
    ) -> Result<(Target, f64)> {
        let observed = self
            .platform
            .linear_brightness(id)
            .context("brightness read failed")?;
        let mut offset = self.offsets.get(id);

        if !self.settings.locked_offset
            && let Some(&expected) = self.expected.get(id)
            && let Some(delta) = drift_correction(expected, observed)
        {
            offset += delta;
            if let Err(e) = self.offsets.set(id, offset) {
                log_warning!("Failed to persist offset for {id}: {e}");
            }
            *offsets_changed = true;
            if self.debug_enabled {
                log_debug!(
                    "{id} changed externally ({expected:.4} -> {observed:.4}), offset now {offset:+.4}"
                );
            }
        }

        let value = adjusted_brightness(source_brightness, offset);
        self.platform
            .set_linear_brightness(id, value)
            .context("brightness write failed")?;
        self.expected.insert(id.clone(), value);

        Ok((
            Target {
                id: id.clone(),
                brightness: observed,
                offset,
            },
            value,
        ))
    }

    fn publish(&mut self, status: Status, now: Instant) {
        if !status.is_running() {
            self.clock.stop();
            self.expected.clear();
        }
        if status == self.status {
            return;
        }

        match status {
            Status::Deactivated => {
                if let Some(replay) = self.rollback.take_replay(now) {
                    if self.reconfiguration.is_reconfiguring() {
                        self.pending_replay = Some(replay);
                    } else {
                        self.apply_replay(&replay, None);
                    }
                }
            }
            Status::Paused => {
                self.rollback.clear();
                self.pending_replay = None;
            }
            Status::Running { .. } => {}
        }

        let kind_changed = status.kind() != self.status.kind();
        self.status = status;

        if kind_changed {
            self.sink.status_changed(self.status.display_text());
        }
        if let Some(notifier) = &self.notifier {
            notifier.send_status(&self.status);
        }
    }

    /// Write a rollback snapshot back to its displays.
    ///
    /// Nothing is written unless the session owns the console. With
    /// `present`, displays that are no longer enumerated are skipped.
    fn apply_replay(&mut self, replay: &[Target], present: Option<&BTreeSet<DisplayId>>) {
        if !self.platform.is_on_console() {
            if self.debug_enabled {
                log_debug!("Dropping replay: session does not own the console");
            }
            return;
        }
        if self.debug_enabled {
            log_debug!("Restoring target brightness from before deactivation");
        }
        for target in replay {
            if present.is_some_and(|present| !present.contains(&target.id)) {
                continue;
            }
            if let Err(e) = self
                .platform
                .set_linear_brightness(&target.id, target.brightness)
                && self.debug_enabled
            {
                log_warning!("Failed to restore {}: {e}", target.id);
            }
        }
    }

    fn notify_offsets(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.send_offsets(self.offsets.entries());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::test_constants::{TEST_SOURCE_BRIGHTNESS, TEST_TICK_MS};
    use crate::platform::MockDisplayPlatform;
    use crate::platform::fake::FakePlatform;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<&'static str>>>);

    impl StatusSink for RecordingSink {
        fn status_changed(&mut self, text: &'static str) {
            self.0.lock().unwrap().push(text);
        }
    }

    fn engine_with(platform: Box<dyn DisplayPlatform>, sink: RecordingSink) -> SyncEngine {
        SyncEngine::new(EngineParams {
            platform,
            offsets: Arc::new(OffsetStore::in_memory()),
            sink: Box::new(sink),
            notifier: None,
            settings: EngineSettings {
                update_interval: Duration::from_millis(TEST_TICK_MS),
                locked_offset: false,
            },
            rules: TopologyRules::default(),
            debug_enabled: false,
        })
    }

    fn laptop_with_monitor() -> FakePlatform {
        let platform = FakePlatform::new();
        platform.add_builtin("panel", TEST_SOURCE_BRIGHTNESS);
        platform.add_external("dell", 0x10AC, 0xA0C4, 0.8);
        platform
    }

    #[test]
    fn test_drift_threshold() {
        assert_eq!(drift_correction(0.5, 0.5), None);
        assert_eq!(drift_correction(0.5, 0.5 + 0.00009), None);
        let delta = drift_correction(0.5, 0.52).unwrap();
        assert_eq!(delta, linear_to_user(0.52) - linear_to_user(0.5));
        assert!(drift_correction(0.5, 0.48).unwrap() < 0.0);
    }

    #[test]
    fn test_drift_from_zero_reading_is_finite() {
        let delta = drift_correction(0.3, 0.0).unwrap();
        assert!(delta.is_finite());
    }

    #[test]
    fn test_refresh_starts_running_and_ticks_immediately() {
        let platform = laptop_with_monitor();
        let sink = RecordingSink::default();
        let mut engine = engine_with(Box::new(platform.clone()), sink.clone());

        let now = Instant::now();
        engine.refresh_topology(now);

        assert!(engine.status().is_running());
        let writes = platform.writes_to("dell");
        assert_eq!(writes.len(), 1);
        assert!((writes[0] - TEST_SOURCE_BRIGHTNESS).abs() < 1e-12);
        assert_eq!(*sink.0.lock().unwrap(), vec!["Activated"]);
        assert_eq!(
            engine.time_until_tick(now),
            Some(Duration::from_millis(TEST_TICK_MS))
        );
    }

    #[test]
    fn test_paused_wins_over_running() {
        let platform = laptop_with_monitor();
        let sink = RecordingSink::default();
        let mut engine = engine_with(Box::new(platform.clone()), sink.clone());

        let now = Instant::now();
        engine.set_paused(true, now);
        engine.refresh_topology(now);

        assert_eq!(*engine.status(), Status::Paused);
        assert!(platform.writes().is_empty());
        assert_eq!(engine.time_until_tick(now), None);
    }

    #[test]
    fn test_sink_only_sees_kind_changes() {
        let platform = laptop_with_monitor();
        let sink = RecordingSink::default();
        let mut engine = engine_with(Box::new(platform.clone()), sink.clone());

        let start = Instant::now();
        engine.refresh_topology(start);
        for step in 1..5 {
            platform.set_brightness("panel", 0.2 + 0.1 * step as f64);
            engine.poll(start + Duration::from_millis(TEST_TICK_MS * step));
        }
        engine.set_paused(true, start + Duration::from_secs(1));

        assert_eq!(*sink.0.lock().unwrap(), vec!["Activated", "Paused"]);
    }

    #[test]
    fn test_source_read_failure_skips_tick() {
        let mut platform = MockDisplayPlatform::new();
        platform
            .expect_active_displays()
            .returning(|| Ok(vec![DisplayId::new("panel"), DisplayId::new("dell")]));
        platform
            .expect_is_builtin()
            .returning(|id| id.as_str() == "panel");
        platform.expect_vendor_model().returning(|_| None);
        platform.expect_is_on_console().return_const(true);
        platform
            .expect_linear_brightness()
            .returning(|_| Err(anyhow::anyhow!("device busy")));
        platform.expect_set_linear_brightness().never();

        let mut engine = engine_with(Box::new(platform), RecordingSink::default());
        let now = Instant::now();
        engine.refresh_topology(now);

        assert_eq!(*engine.status(), Status::Deactivated);
        assert!(engine.time_until_tick(now).is_some());
    }
}
