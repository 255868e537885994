//! Wraparound-safe heading arithmetic.
//!
//! Headings are radians measured counter-clockwise in the field frame. Every
//! function here folds its inputs into `[0, 2π)` before comparing them, so
//! callers may pass raw, unwrapped estimator output.

use core::f64::consts::{PI, TAU};

use libm::fabs;

/// Normalize an angle to be within `[0, 2π)`.
///
/// # Arguments
///
/// * `angle`: The angle in radians to normalize.
///
/// # Returns
///
/// The normalized angle in radians.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    let a = if a < 0.0 { a + TAU } else { a };
    // -ε + 2π rounds to exactly 2π
    if a >= TAU { 0.0 } else { a }
}

/// Signed shortest rotation from `current` to `target`, in `(-π, π]`.
///
/// The magnitude is `min(|raw|, 2π - |raw|)` where `raw = target - current`
/// after both are normalized. The result is negative when the shorter path runs
/// clockwise, i.e. when `raw > π` or `-π < raw < 0`. A raw difference of
/// exactly `π` keeps the positive sign.
///
/// # Examples
///
/// ```
/// use core::f64::consts::{FRAC_PI_2, PI};
/// use roboseed_kinematics::angle::signed_angular_difference;
///
/// assert!((signed_angular_difference(0.0, FRAC_PI_2) - FRAC_PI_2).abs() < 1e-12);
/// assert!((signed_angular_difference(0.0, 1.5 * PI) + FRAC_PI_2).abs() < 1e-12);
/// ```
pub fn signed_angular_difference(current: f64, target: f64) -> f64 {
    let current = normalize_angle(current);
    let target = normalize_angle(target);

    let raw = target - current;
    let magnitude = fabs(raw).min(TAU - fabs(raw));

    if raw > PI || (-PI < raw && raw < 0.0) {
        -magnitude
    } else {
        magnitude
    }
}

/// Heading halfway along the shortest arc from `a` to `b`, in `[0, 2π)`.
pub fn angular_midpoint(a: f64, b: f64) -> f64 {
    normalize_angle(a + signed_angular_difference(a, b) / 2.0)
}

/// Converts degrees to radians.
pub fn degrees(value: f64) -> f64 {
    value * (PI / 180.0)
}

/// Converts radians to degrees.
pub fn to_degrees(radians: f64) -> f64 {
    radians * (180.0 / PI)
}
