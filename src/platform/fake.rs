//! Scripted in-memory display platform.
//!
//! Cloning a [`FakePlatform`] shares its state, so a test can hand one clone
//! to the engine and keep another to move brightness sliders, unplug
//! displays and inspect every write the engine performed.

use anyhow::{Result, anyhow, bail};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DisplayId, DisplayPlatform};

#[derive(Debug, Clone)]
struct FakeDisplay {
    builtin: bool,
    vendor_model: Option<(u32, u32)>,
    brightness: f64,
    fail_reads: bool,
    fail_writes: bool,
}

#[derive(Debug)]
struct FakeState {
    displays: BTreeMap<DisplayId, FakeDisplay>,
    on_console: bool,
    enumeration_fails: bool,
    writes: Vec<(DisplayId, f64)>,
}

/// Shared handle to a scripted display environment.
#[derive(Debug, Clone)]
pub struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                displays: BTreeMap::new(),
                on_console: true,
                enumeration_fails: false,
                writes: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: &str, builtin: bool, vendor_model: Option<(u32, u32)>, brightness: f64) {
        self.state().displays.insert(
            DisplayId::new(id),
            FakeDisplay {
                builtin,
                vendor_model,
                brightness,
                fail_reads: false,
                fail_writes: false,
            },
        );
    }

    /// Attach a built-in panel.
    pub fn add_builtin(&self, id: &str, brightness: f64) {
        self.insert(id, true, None, brightness);
    }

    /// Attach an external monitor.
    pub fn add_external(&self, id: &str, vendor: u32, model: u32, brightness: f64) {
        self.insert(id, false, Some((vendor, model)), brightness);
    }

    pub fn remove(&self, id: &str) {
        self.state().displays.remove(&DisplayId::new(id));
    }

    /// Change a display's brightness behind the engine's back.
    pub fn set_brightness(&self, id: &str, brightness: f64) {
        if let Some(display) = self.state().displays.get_mut(&DisplayId::new(id)) {
            display.brightness = brightness;
        }
    }

    pub fn brightness(&self, id: &str) -> Option<f64> {
        self.state()
            .displays
            .get(&DisplayId::new(id))
            .map(|display| display.brightness)
    }

    pub fn set_on_console(&self, on_console: bool) {
        self.state().on_console = on_console;
    }

    pub fn set_enumeration_fails(&self, fails: bool) {
        self.state().enumeration_fails = fails;
    }

    pub fn set_fail_reads(&self, id: &str, fail: bool) {
        if let Some(display) = self.state().displays.get_mut(&DisplayId::new(id)) {
            display.fail_reads = fail;
        }
    }

    pub fn set_fail_writes(&self, id: &str, fail: bool) {
        if let Some(display) = self.state().displays.get_mut(&DisplayId::new(id)) {
            display.fail_writes = fail;
        }
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<(DisplayId, f64)> {
        self.state().writes.clone()
    }

    /// Writes to a single display, in order.
    pub fn writes_to(&self, id: &str) -> Vec<f64> {
        let id = DisplayId::new(id);
        self.state()
            .writes
            .iter()
            .filter(|(target, _)| *target == id)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

impl DisplayPlatform for FakePlatform {
    fn platform_name(&self) -> &'static str {
        "Fake"
    }

    fn active_displays(&mut self) -> Result<Vec<DisplayId>> {
        let state = self.state();
        if state.enumeration_fails {
            bail!("display enumeration failed");
        }
        Ok(state.displays.keys().cloned().collect())
    }

    fn is_builtin(&self, id: &DisplayId) -> bool {
        self.state()
            .displays
            .get(id)
            .is_some_and(|display| display.builtin)
    }

    fn vendor_model(&self, id: &DisplayId) -> Option<(u32, u32)> {
        self.state()
            .displays
            .get(id)
            .and_then(|display| display.vendor_model)
    }

    fn is_on_console(&self) -> bool {
        self.state().on_console
    }

    fn linear_brightness(&mut self, id: &DisplayId) -> Result<f64> {
        let state = self.state();
        let display = state
            .displays
            .get(id)
            .ok_or_else(|| anyhow!("{id} is not attached"))?;
        if display.fail_reads {
            bail!("read from {id} failed");
        }
        Ok(display.brightness)
    }

    fn set_linear_brightness(&mut self, id: &DisplayId, value: f64) -> Result<()> {
        let mut state = self.state();
        let display = state
            .displays
            .get_mut(id)
            .ok_or_else(|| anyhow!("{id} is not attached"))?;
        if display.fail_writes {
            bail!("write to {id} failed");
        }
        display.brightness = value;
        state.writes.push((id.clone(), value));
        Ok(())
    }
}
