//! Closed-loop motion control for a four-wheel mecanum chassis.
//!
//! [`ChassisDriver`] owns the controller state: per-axis modes, targets,
//! integral accumulators and the last computed power terms. Each control tick
//! reads the [`PositionEstimator`], evaluates the [`rotation`] and
//! [`translation`] laws, mixes the result and forwards it to the
//! [`WheelActuator`].
//!
//! Goal seeking is a steppable state machine ([`GoalSeek`]); the blocking
//! helpers [`ChassisDriver::go_to_position`] and [`ChassisDriver::go_to_rotation`]
//! simply poll it until it reaches a terminal state.
//!
//! ```no_run
//! # use roboseed_control::*;
//! # fn run<E: PositionEstimator, A: WheelActuator>(estimator: E, actuator: A) -> Result<()> {
//! let mut driver = ChassisDriver::new(estimator, actuator, ChassisConfig::default())?;
//! driver.set_auto_mode(true);
//!
//! if !driver.go_to_position(0.0, 1000.0)?.is_success() {
//!     // stuck: back off and try another approach
//! }
//! driver.go_to_rotation_degrees(90.0)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod error;
pub mod hardware;
pub mod rotation;
pub mod seek;
pub mod shared;
pub mod translation;

pub use config::{ChassisConfig, RotationalGains, SeekLimits, TranslationalGains};
pub use driver::{ChassisDriver, RotationMode, TranslationMode};
pub use error::{ControlError, Result};
pub use hardware::{PositionEstimator, WheelActuator};
pub use seek::{CancelToken, GoalSeek, SeekGoal, SeekOutcome, SeekStatus, StallDetector};
pub use shared::SharedChassis;

pub use roboseed_kinematics::{ChassisPower, Vec2, Wheel, WheelPowers};

/// Limits `value` to `[-max, max]` while keeping its sign.
///
/// NaN input yields `0.0` so that a corrupt estimate never commands full power.
pub fn clamp_magnitude(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.abs().min(max).copysign(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_magnitude_preserves_sign() {
        assert_eq!(clamp_magnitude(0.8, 0.5), 0.5);
        assert_eq!(clamp_magnitude(-0.8, 0.5), -0.5);
        assert_eq!(clamp_magnitude(0.2, 0.5), 0.2);
        assert_eq!(clamp_magnitude(-0.2, 0.5), -0.2);
        assert_eq!(clamp_magnitude(f64::INFINITY, 0.35), 0.35);
        assert_eq!(clamp_magnitude(f64::NAN, 0.35), 0.0);
    }
}
