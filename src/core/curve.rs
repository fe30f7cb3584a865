//! Conversion between the linear and the perceptual (user) brightness scales.
//!
//! The low-level brightness interfaces report a value roughly proportional to
//! backlight duty cycle, while desktop brightness controls move along an
//! approximately logarithmic scale. Offsets are tracked on the user scale so a
//! calibration stays meaningful across the whole range.
//!
//! Both functions are pure and use only `ln`/`exp`, so results are reproducible
//! for the same input on every platform.

use crate::common::constants::{CURVE_EXPONENT, CURVE_INPUT_FLOOR, CURVE_SCALE};
use crate::common::utils::clamp_unit;

/// Convert a linear brightness in `(0, 1]` to the user scale.
pub fn linear_to_user(linear: f64) -> f64 {
    (linear / CURVE_SCALE).ln() / CURVE_EXPONENT
}

/// Convert a user-scale brightness back to the linear scale.
pub fn user_to_linear(user: f64) -> f64 {
    (user * CURVE_EXPONENT).exp() * CURVE_SCALE
}

/// Clamp a linear reading into the domain accepted by [`linear_to_user`].
///
/// A panel reporting 0.0 would otherwise produce `-inf` on the user scale
/// and poison any offset derived from it.
pub fn clamp_curve_input(linear: f64) -> f64 {
    clamp_unit(linear).max(CURVE_INPUT_FLOOR)
}

/// Brightness a target should be driven to for a given source reading.
///
/// `source` is moved to the user scale, shifted by the target's calibration
/// offset and brought back to a linear value clamped to `[0, 1]`.
pub fn adjusted_brightness(source: f64, offset: f64) -> f64 {
    let user = linear_to_user(clamp_curve_input(source)) + offset;
    clamp_unit(user_to_linear(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_points() {
        // The scale constant is the linear value at user brightness 0.
        assert!((user_to_linear(0.0) - CURVE_SCALE).abs() < 1e-15);
        assert!(linear_to_user(CURVE_SCALE).abs() < 1e-15);
        // Full linear brightness lands just above 1.0 on the user scale.
        let top = linear_to_user(1.0);
        assert!(top > 1.0 && top < 1.1, "unexpected user value {top}");
    }

    #[test]
    fn test_curve_is_monotonic() {
        let mut previous = linear_to_user(0.01);
        for step in 2..=100 {
            let current = linear_to_user(step as f64 / 100.0);
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_zero_offset_is_identity() {
        for &x in &[0.05, 0.3, 0.5, 0.75, 1.0] {
            assert!((adjusted_brightness(x, 0.0) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_adjusted_brightness_clamps() {
        assert_eq!(adjusted_brightness(1.0, 0.5), 1.0);
        assert!(adjusted_brightness(0.1, -3.0) >= 0.0);
        assert!(adjusted_brightness(0.0, 0.0) > 0.0);
    }

    #[test]
    fn test_positive_offset_brightens() {
        assert!(adjusted_brightness(0.4, 0.1) > 0.4);
        assert!(adjusted_brightness(0.4, -0.1) < 0.4);
    }

    #[test]
    fn test_clamp_curve_input_floor() {
        assert_eq!(clamp_curve_input(0.0), CURVE_INPUT_FLOOR);
        assert_eq!(clamp_curve_input(-1.0), CURVE_INPUT_FLOOR);
        assert_eq!(clamp_curve_input(2.0), 1.0);
        assert!(linear_to_user(clamp_curve_input(0.0)).is_finite());
    }
}
