//! Rotational control law.
//!
//! The heading is extrapolated by `lookahead · ω` before computing the error so
//! that the output starts falling before the robot actually reaches the target.
//! The integral only accrues once the predicted error is inside the window,
//! which keeps it from winding up during long turns.

use roboseed_kinematics::signed_angular_difference;

use crate::clamp_magnitude;
use crate::config::RotationalGains;

/// Heading measurement fed to the law.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingSample {
    /// Heading in radians.
    pub heading: f64,
    /// Angular velocity in rad/s.
    pub angular_velocity: f64,
}

/// Output of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationalTerms {
    /// Signed error from the measured heading.
    pub raw_error: f64,
    /// Signed error from the extrapolated heading.
    pub predicted_error: f64,
    /// Rotation power, clamped to the regime's cap.
    pub power: f64,
}

/// Evaluates the rotational law and updates `integral` in place.
///
/// `dt` is the time in seconds since the previous evaluation.
pub fn evaluate(
    gains: &RotationalGains,
    integral_window: f64,
    sample: HeadingSample,
    target: f64,
    dt: f64,
    integral: &mut f64,
) -> RotationalTerms {
    let future_heading = sample.heading + gains.lookahead * sample.angular_velocity;

    let raw_error = signed_angular_difference(sample.heading, target);
    let predicted_error = signed_angular_difference(future_heading, target);

    if predicted_error.abs() < integral_window {
        *integral += raw_error * dt;
    }

    let power = clamp_magnitude(
        predicted_error * gains.proportional_gain() + *integral * gains.integral_gain(),
        gains.max_power,
    );

    RotationalTerms {
        raw_error,
        predicted_error,
        power,
    }
}
