//! Application constants and default values for brightsync.
//!
//! This module contains the configuration defaults, validation limits,
//! curve parameters and operational constants used throughout the application.

// ═══ Application Configuration Defaults ═══
// These values are used when config options are not specified by the user

pub const DEFAULT_UPDATE_INTERVAL: f64 = 0.1; // seconds between brightness samples
pub const DEFAULT_LOCKED_OFFSET: bool = false; // drift correction enabled
pub const DEFAULT_ACCEPT_ANY_TARGET: bool = true; // every external DDC display follows
pub const DEFAULT_DDCUTIL_PATH: &str = "ddcutil";
pub const DEFAULT_HOTPLUG_POLL_INTERVAL: f64 = 1.0; // seconds between connector scans

// ═══ Validation Limits ═══

pub const MINIMUM_UPDATE_INTERVAL: f64 = 0.02; // seconds (50 Hz upper bound)
pub const MAXIMUM_UPDATE_INTERVAL: f64 = 5.0; // seconds
pub const MINIMUM_HOTPLUG_POLL_INTERVAL: f64 = 0.25;
pub const MAXIMUM_HOTPLUG_POLL_INTERVAL: f64 = 10.0;
pub const MAXIMUM_OFFSET_MAGNITUDE: f64 = 2.0; // user-scale units accepted from clients

// ═══ Brightness Curve ═══
// Exponential model fitted against one reference panel:
//   user   = ln(linear / CURVE_SCALE) / CURVE_EXPONENT
//   linear = exp(user * CURVE_EXPONENT) * CURVE_SCALE

pub const CURVE_SCALE: f64 = 0.0079;
pub const CURVE_EXPONENT: f64 = 4.6533;
pub const CURVE_INPUT_FLOOR: f64 = 1e-4; // lowest linear value fed into the log

// ═══ Synchronization Engine ═══

pub const DRIFT_THRESHOLD: f64 = 0.0001; // linear-scale delta attributed to manual changes
pub const ROLLBACK_WINDOW_SECS: u64 = 2; // fixed shadow delay, not configurable
pub const IDLE_WAKE_INTERVAL_MS: u64 = 1000; // how often an idle loop re-checks the running flag

// ═══ DDC/CI ═══

pub const DDC_BRIGHTNESS_FEATURE: &str = "10"; // VCP code for luminance

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1; // General failure

// ═══ Test Constants ═══
// Common values used in tests for consistency
#[cfg(test)]
pub mod test_constants {
    pub const TEST_SOURCE_BRIGHTNESS: f64 = 0.5;
    pub const TEST_TICK_MS: u64 = 100;
}
