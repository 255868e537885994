//! Translational control law.
//!
//! Errors are computed in the field frame and rotated into the body frame
//! before the gains are applied, so the output maps directly onto the strafe
//! and forward power terms.

use roboseed_kinematics::Vec2;

use crate::clamp_magnitude;
use crate::config::TranslationalGains;

/// Position measurement fed to the law.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TranslationSample {
    /// Field-frame position.
    pub position: Vec2,
    /// Field-frame velocity.
    pub velocity: Vec2,
    /// Heading in radians.
    pub heading: f64,
}

/// Output of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TranslationalTerms {
    /// Body-frame error from the measured position.
    pub raw_error: Vec2,
    /// Body-frame error from the extrapolated position.
    pub predicted_error: Vec2,
    /// Strafe power, clamped.
    pub x_power: f64,
    /// Forward power, clamped.
    pub y_power: f64,
}

/// Evaluates the translational law and updates `integral` in place.
///
/// `dt` is the time in seconds since the previous evaluation.
pub fn evaluate(
    gains: &TranslationalGains,
    sample: TranslationSample,
    target: Vec2,
    dt: f64,
    integral: &mut Vec2,
) -> TranslationalTerms {
    let predicted_position = sample.position + sample.velocity * gains.lookahead;

    let raw_error = (target - sample.position).field_to_body(sample.heading);
    let predicted_error = (target - predicted_position).field_to_body(sample.heading);

    if predicted_error.manhattan() < gains.integral_window() {
        *integral = *integral + raw_error * dt;
    }

    let kp = gains.proportional_gain();
    let ki = gains.integral_gain();

    TranslationalTerms {
        raw_error,
        predicted_error,
        x_power: clamp_magnitude(predicted_error.x * kp + integral.x * ki, gains.max_power),
        y_power: clamp_magnitude(predicted_error.y * kp + integral.y * ki, gains.max_power),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_forward_error_at_zero_heading_is_unrotated() {
        let mut integral = Vec2::ZERO;
        let terms = evaluate(
            &TranslationalGains::teleop(),
            TranslationSample::default(),
            Vec2::new(0.0, 1000.0),
            0.02,
            &mut integral,
        );
        assert!(terms.raw_error.x.abs() < EPSILON);
        assert!((terms.raw_error.y - 1000.0).abs() < EPSILON);
        assert!((terms.y_power - 0.25).abs() < EPSILON);
        assert!(terms.x_power.abs() < EPSILON);
    }

    #[test]
    fn test_error_rotates_into_body_frame() {
        // facing field -x, a target at field +y lies to the robot's right
        let mut integral = Vec2::ZERO;
        let sample = TranslationSample {
            heading: FRAC_PI_2,
            ..Default::default()
        };
        let terms = evaluate(&TranslationalGains::teleop(), sample, Vec2::new(0.0, 400.0), 0.02, &mut integral);
        assert!((terms.raw_error.x - 400.0).abs() < EPSILON);
        assert!(terms.raw_error.y.abs() < EPSILON);
        assert!(terms.x_power > 0.0);

        let sample = TranslationSample {
            heading: PI,
            ..Default::default()
        };
        let terms = evaluate(&TranslationalGains::teleop(), sample, Vec2::new(0.0, 400.0), 0.02, &mut integral);
        assert!((terms.raw_error.y + 400.0).abs() < EPSILON);
    }

    #[test]
    fn test_lookahead_uses_velocity() {
        let gains = TranslationalGains::autonomous();
        let mut integral = Vec2::ZERO;
        let sample = TranslationSample {
            position: Vec2::new(0.0, 500.0),
            velocity: Vec2::new(0.0, 1000.0),
            heading: 0.0,
        };
        let terms = evaluate(&gains, sample, Vec2::new(0.0, 1000.0), 0.02, &mut integral);
        assert!((terms.predicted_error.y - 300.0).abs() < EPSILON);
        assert!((terms.raw_error.y - 500.0).abs() < EPSILON);
        assert!((terms.y_power - 300.0 * gains.proportional_gain()).abs() < EPSILON);
    }

    #[test]
    fn test_output_clamped_with_sign() {
        let gains = TranslationalGains::teleop();
        let mut integral = Vec2::ZERO;
        let terms = evaluate(
            &gains,
            TranslationSample::default(),
            Vec2::new(-10_000.0, 10_000.0),
            0.02,
            &mut integral,
        );
        assert!((terms.x_power + gains.max_power).abs() < EPSILON);
        assert!((terms.y_power - gains.max_power).abs() < EPSILON);
    }

    #[test]
    fn test_integral_accrues_only_near_target() {
        let mut gains = TranslationalGains::teleop();
        gains.integral_ratio = 0.5;

        let mut integral = Vec2::ZERO;
        evaluate(&gains, TranslationSample::default(), Vec2::new(0.0, 1000.0), 0.1, &mut integral);
        assert_eq!(integral, Vec2::ZERO);

        evaluate(&gains, TranslationSample::default(), Vec2::new(100.0, 200.0), 0.1, &mut integral);
        assert!((integral.x - 10.0).abs() < EPSILON);
        assert!((integral.y - 20.0).abs() < EPSILON);

        let terms = evaluate(&gains, TranslationSample::default(), Vec2::new(100.0, 200.0), 0.1, &mut integral);
        let expected = 200.0 * gains.proportional_gain() + 40.0 * gains.integral_gain();
        assert!((terms.y_power - expected).abs() < EPSILON);
    }
}
