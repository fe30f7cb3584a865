//! Source/target classification and reconfiguration bracketing.

use anyhow::Result;
use std::collections::BTreeSet;

use crate::config::DeviceMatch;
use crate::platform::{DisplayId, DisplayPlatform};

/// Which device classes may act as source and targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRules {
    /// Every non-source display is a target.
    pub accept_any_target: bool,
    /// Accepted target classes when `accept_any_target` is off.
    pub targets: Vec<DeviceMatch>,
    /// Classes acceptable as source when no built-in panel is present.
    pub source_fallbacks: Vec<DeviceMatch>,
}

impl Default for TopologyRules {
    fn default() -> Self {
        Self {
            accept_any_target: true,
            targets: Vec::new(),
            source_fallbacks: Vec::new(),
        }
    }
}

impl TopologyRules {
    fn accepts_target(&self, vendor_model: Option<(u32, u32)>) -> bool {
        self.accept_any_target || matches_any(&self.targets, vendor_model)
    }
}

fn matches_any(classes: &[DeviceMatch], vendor_model: Option<(u32, u32)>) -> bool {
    vendor_model.is_some_and(|(vendor, model)| {
        classes
            .iter()
            .any(|class| class.vendor == vendor && class.model == model)
    })
}

/// The current source display and the set of displays that follow it.
///
/// Replaced as a whole on every recomputation; the source is never a target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayTopology {
    pub source: Option<DisplayId>,
    pub targets: BTreeSet<DisplayId>,
}

/// Result of one topology computation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologyScan {
    pub topology: DisplayTopology,
    /// Every display that was enumerated, classified or not.
    pub present: BTreeSet<DisplayId>,
}

impl DisplayTopology {
    /// Empty topology: nothing to sync.
    pub fn deactivated() -> Self {
        Self::default()
    }

    /// Whether there is anything to synchronize.
    pub fn is_active(&self) -> bool {
        self.source.is_some() && !self.targets.is_empty()
    }

    /// Enumerate and classify the attached displays.
    ///
    /// A session that does not own the console gets an empty topology.
    pub fn compute(platform: &mut dyn DisplayPlatform, rules: &TopologyRules) -> Result<TopologyScan> {
        let displays = platform.active_displays()?;
        let present: BTreeSet<DisplayId> = displays.iter().cloned().collect();

        if !platform.is_on_console() {
            return Ok(TopologyScan {
                topology: Self::deactivated(),
                present,
            });
        }

        let source = displays
            .iter()
            .find(|id| platform.is_builtin(id))
            .or_else(|| {
                displays
                    .iter()
                    .find(|id| matches_any(&rules.source_fallbacks, platform.vendor_model(id)))
            })
            .cloned();

        let targets = displays
            .iter()
            .filter(|id| Some(*id) != source.as_ref())
            .filter(|id| !platform.is_builtin(id))
            .filter(|id| rules.accepts_target(platform.vendor_model(id)))
            .cloned()
            .collect();

        Ok(TopologyScan {
            topology: Self { source, targets },
            present,
        })
    }
}

/// Nesting counter for display reconfiguration brackets.
///
/// Brackets from independent producers may interleave; the topology is only
/// settled once every `begin` has been matched by an `end`.
#[derive(Debug, Default)]
pub struct ReconfigurationTracker {
    depth: i32,
}

impl ReconfigurationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `begin`. Returns true when this opens the outermost bracket.
    pub fn begin(&mut self) -> bool {
        self.depth += 1;
        self.depth == 1
    }

    /// Record an `end`. Returns true when the outermost bracket closed.
    ///
    /// An unmatched `end` is absorbed and reported as settled.
    pub fn end(&mut self) -> bool {
        self.depth -= 1;
        if self.depth <= 0 {
            self.depth = 0;
            true
        } else {
            false
        }
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockDisplayPlatform;
    use crate::platform::fake::FakePlatform;

    fn ids(names: &[&str]) -> BTreeSet<DisplayId> {
        names.iter().map(|name| DisplayId::new(*name)).collect()
    }

    #[test]
    fn test_builtin_is_source() {
        let mut platform = FakePlatform::new();
        platform.add_builtin("panel", 0.5);
        platform.add_external("dell", 0x10AC, 0xA0C4, 0.5);
        platform.add_external("lg", 0x1E6D, 0x5B08, 0.5);

        let scan = DisplayTopology::compute(&mut platform, &TopologyRules::default()).unwrap();
        assert_eq!(scan.topology.source, Some(DisplayId::new("panel")));
        assert_eq!(scan.topology.targets, ids(&["dell", "lg"]));
        assert_eq!(scan.present, ids(&["dell", "lg", "panel"]));
        assert!(scan.topology.is_active());
    }

    #[test]
    fn test_source_never_a_target() {
        let mut platform = FakePlatform::new();
        platform.add_external("dell", 0x10AC, 0xA0C4, 0.5);
        platform.add_external("lg", 0x1E6D, 0x5B08, 0.5);
        let rules = TopologyRules {
            source_fallbacks: vec![DeviceMatch {
                vendor: 0x10AC,
                model: 0xA0C4,
            }],
            ..TopologyRules::default()
        };

        let scan = DisplayTopology::compute(&mut platform, &rules).unwrap();
        let source = scan.topology.source.unwrap();
        assert_eq!(source, DisplayId::new("dell"));
        assert!(!scan.topology.targets.contains(&source));
        assert_eq!(scan.topology.targets, ids(&["lg"]));
    }

    #[test]
    fn test_target_list_filters_when_not_accepting_any() {
        let mut platform = FakePlatform::new();
        platform.add_builtin("panel", 0.5);
        platform.add_external("dell", 0x10AC, 0xA0C4, 0.5);
        platform.add_external("tv", 0x4C2D, 0x0E26, 0.5);
        let rules = TopologyRules {
            accept_any_target: false,
            targets: vec![DeviceMatch {
                vendor: 0x10AC,
                model: 0xA0C4,
            }],
            source_fallbacks: Vec::new(),
        };

        let scan = DisplayTopology::compute(&mut platform, &rules).unwrap();
        assert_eq!(scan.topology.targets, ids(&["dell"]));
    }

    #[test]
    fn test_no_source_without_builtin_or_fallback() {
        let mut platform = FakePlatform::new();
        platform.add_external("dell", 0x10AC, 0xA0C4, 0.5);

        let scan = DisplayTopology::compute(&mut platform, &TopologyRules::default()).unwrap();
        assert_eq!(scan.topology.source, None);
        assert!(!scan.topology.is_active());
    }

    #[test]
    fn test_off_console_is_deactivated() {
        let mut platform = FakePlatform::new();
        platform.add_builtin("panel", 0.5);
        platform.add_external("dell", 0x10AC, 0xA0C4, 0.5);
        platform.set_on_console(false);

        let scan = DisplayTopology::compute(&mut platform, &TopologyRules::default()).unwrap();
        assert_eq!(scan.topology, DisplayTopology::deactivated());
        assert_eq!(scan.present.len(), 2);
    }

    #[test]
    fn test_enumeration_error_propagates() {
        let mut platform = MockDisplayPlatform::new();
        platform
            .expect_active_displays()
            .returning(|| Err(anyhow::anyhow!("bus error")));

        assert!(DisplayTopology::compute(&mut platform, &TopologyRules::default()).is_err());
    }

    #[test]
    fn test_unknown_vendor_never_matches_lists() {
        let mut platform = MockDisplayPlatform::new();
        platform
            .expect_active_displays()
            .returning(|| Ok(vec![DisplayId::new("panel"), DisplayId::new("mystery")]));
        platform.expect_is_on_console().return_const(true);
        platform
            .expect_is_builtin()
            .returning(|id| id.as_str() == "panel");
        platform.expect_vendor_model().returning(|_| None);
        let rules = TopologyRules {
            accept_any_target: false,
            targets: vec![DeviceMatch { vendor: 0, model: 0 }],
            source_fallbacks: Vec::new(),
        };

        let scan = DisplayTopology::compute(&mut platform, &rules).unwrap();
        assert_eq!(scan.topology.source, Some(DisplayId::new("panel")));
        assert!(scan.topology.targets.is_empty());
    }

    #[test]
    fn test_nested_brackets_settle_once() {
        let mut tracker = ReconfigurationTracker::new();

        assert!(tracker.begin());
        assert!(!tracker.begin());
        assert!(!tracker.end());
        assert!(tracker.is_reconfiguring());
        assert!(tracker.end());
        assert!(!tracker.is_reconfiguring());
    }

    #[test]
    fn test_unmatched_end_is_absorbed() {
        let mut tracker = ReconfigurationTracker::new();
        assert!(tracker.end());
        assert_eq!(tracker.depth(), 0);
        assert!(tracker.begin());
    }
}
