use brightsync::core::curve::{adjusted_brightness, clamp_curve_input, linear_to_user, user_to_linear};
use brightsync::core::engine::drift_correction;
use proptest::prelude::*;

/// Linear brightness values a display can report
fn linear_strategy() -> impl Strategy<Value = f64> {
    0.0..=1.0
}

/// Offsets within the range accepted from clients
fn offset_strategy() -> impl Strategy<Value = f64> {
    -2.0..=2.0
}

proptest! {
    #[test]
    fn linear_round_trip_is_stable(linear in f64::MIN_POSITIVE..=1.0f64) {
        let back = user_to_linear(linear_to_user(linear));
        prop_assert!((back - linear).abs() < 1e-9, "{linear} came back as {back}");
    }

    #[test]
    fn user_round_trip_is_stable(user in f64::MIN_POSITIVE..=1.0f64) {
        let back = linear_to_user(user_to_linear(user));
        prop_assert!((back - user).abs() < 1e-9, "{user} came back as {back}");
    }

    #[test]
    fn clamping_is_idempotent(value in -10.0..10.0f64) {
        let once = clamp_curve_input(value);
        prop_assert_eq!(clamp_curve_input(once), once);
        prop_assert!(linear_to_user(once).is_finite());
    }

    #[test]
    fn adjusted_brightness_stays_in_unit_range(
        source in linear_strategy(),
        offset in offset_strategy(),
    ) {
        let value = adjusted_brightness(source, offset);
        prop_assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn offset_is_monotonic(
        source in 0.01..=0.9f64,
        low in offset_strategy(),
        delta in 0.0..=1.0f64,
    ) {
        prop_assert!(adjusted_brightness(source, low) <= adjusted_brightness(source, low + delta));
    }

    #[test]
    fn learned_offset_reproduces_manual_value(
        written in 0.01..=1.0f64,
        observed in 0.01..=1.0f64,
    ) {
        // With the source at the value that was written, the corrected
        // offset lands the target on what the user chose.
        if let Some(delta) = drift_correction(written, observed) {
            let next = adjusted_brightness(written, delta);
            prop_assert!((next - observed).abs() < 1e-9);
        } else {
            prop_assert!((observed - written).abs() <= 1e-4);
        }
    }
}
