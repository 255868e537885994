//! Controller tuning.
//!
//! All gains and thresholds live in an immutable [`ChassisConfig`] handed to
//! the driver at construction. Lengths are in estimator units, angles in
//! radians and times in seconds unless a field says otherwise.

use std::time::Duration;

use roboseed_kinematics::angle::degrees;

use crate::error::{ControlError, Result};

/// Gains for one regime of the rotational control law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationalGains {
    /// How far ahead (s) the heading is extrapolated from the angular velocity.
    pub lookahead: f64,
    /// Output cap for the rotational power term.
    pub max_power: f64,
    /// Heading error (rad) at which the output starts to fall below the cap.
    pub deceleration_threshold: f64,
    /// Integral gain expressed as a multiple of the proportional gain.
    pub integral_ratio: f64,
}

impl RotationalGains {
    /// Tuning used while turning in place.
    pub fn stationary() -> Self {
        RotationalGains {
            lookahead: 0.03,
            max_power: 0.5,
            deceleration_threshold: degrees(15.0),
            integral_ratio: 0.0,
        }
    }

    /// Tuning used while holding heading during translation.
    pub fn in_motion() -> Self {
        RotationalGains {
            lookahead: 0.1,
            max_power: 0.35,
            deceleration_threshold: degrees(45.0),
            integral_ratio: 0.0,
        }
    }

    /// Proportional gain. Negative: a positive heading error (target lies
    /// counter-clockwise) needs a counter-clockwise turn, which is a negative
    /// rotation power.
    pub fn proportional_gain(&self) -> f64 {
        -(self.max_power / self.deceleration_threshold)
    }

    /// Integral gain.
    pub fn integral_gain(&self) -> f64 {
        self.proportional_gain() * self.integral_ratio
    }
}

/// Gains for the translational control law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationalGains {
    /// How far ahead (s) the position is extrapolated from the velocity.
    pub lookahead: f64,
    /// Output cap for each body-frame power term.
    pub max_power: f64,
    /// Distance at which the output starts to fall below the cap.
    pub deceleration_threshold: f64,
    /// Integral gain expressed as a multiple of the proportional gain.
    pub integral_ratio: f64,
}

impl TranslationalGains {
    /// Driver-assist preset.
    pub fn teleop() -> Self {
        TranslationalGains {
            lookahead: 0.12,
            max_power: 0.5,
            deceleration_threshold: 2000.0,
            integral_ratio: 0.0,
        }
    }

    /// Preset for scripted autonomous runs.
    pub fn autonomous() -> Self {
        TranslationalGains {
            lookahead: 0.2,
            max_power: 0.5,
            deceleration_threshold: 2400.0,
            integral_ratio: 0.0,
        }
    }

    /// Proportional gain.
    pub fn proportional_gain(&self) -> f64 {
        self.max_power / self.deceleration_threshold
    }

    /// Integral gain.
    pub fn integral_gain(&self) -> f64 {
        self.proportional_gain() * self.integral_ratio
    }

    /// Manhattan distance of the predicted body-frame error below which the
    /// integral accrues.
    pub fn integral_window(&self) -> f64 {
        self.deceleration_threshold / 4.0
    }
}

/// Convergence and stall limits for goal seeking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekLimits {
    /// Distance to target counted as arrived.
    pub position_tolerance: f64,
    /// Speed at or below which the chassis counts as not translating.
    pub min_linear_speed: f64,
    /// Heading error (rad) counted as arrived.
    pub rotation_tolerance: f64,
    /// Angular speed (rad/s) above which the chassis counts as turning.
    pub min_angular_speed: f64,
    /// How long the chassis may stay still before a seek gives up.
    pub stuck_timeout: Duration,
}

impl Default for SeekLimits {
    fn default() -> Self {
        SeekLimits {
            position_tolerance: 250.0,
            min_linear_speed: 100.0,
            rotation_tolerance: degrees(3.5),
            min_angular_speed: degrees(10.0),
            stuck_timeout: Duration::from_millis(500),
        }
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChassisConfig {
    /// Rotational gains while turning in place.
    pub stationary_rotation: RotationalGains,
    /// Rotational gains while translating.
    pub moving_rotation: RotationalGains,
    /// Predicted heading error (rad) below which the rotational integral accrues.
    /// Shared by both regimes.
    pub rotation_integral_window: f64,
    /// Translational preset used outside auto mode.
    pub teleop_translation: TranslationalGains,
    /// Translational preset used in auto mode.
    pub autonomous_translation: TranslationalGains,
    /// Goal-seek limits.
    pub seek: SeekLimits,
    /// Scale the four mixed wheel powers so none exceeds 1.0.
    pub normalize_wheel_powers: bool,
}

impl Default for ChassisConfig {
    fn default() -> Self {
        ChassisConfig {
            stationary_rotation: RotationalGains::stationary(),
            moving_rotation: RotationalGains::in_motion(),
            rotation_integral_window: degrees(15.0),
            teleop_translation: TranslationalGains::teleop(),
            autonomous_translation: TranslationalGains::autonomous(),
            seek: SeekLimits::default(),
            normalize_wheel_powers: false,
        }
    }
}

impl ChassisConfig {
    /// Translational preset for the given mode.
    pub fn translation(&self, auto_mode: bool) -> &TranslationalGains {
        if auto_mode {
            &self.autonomous_translation
        } else {
            &self.teleop_translation
        }
    }

    /// Rotational regime for the given assist state.
    pub fn rotation(&self, ras_active: bool) -> &RotationalGains {
        if ras_active {
            &self.stationary_rotation
        } else {
            &self.moving_rotation
        }
    }

    /// Checks that every gain and limit is usable.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidConfig)` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        for (name, gains) in [
            ("stationary_rotation", &self.stationary_rotation),
            ("moving_rotation", &self.moving_rotation),
        ] {
            check_gains(
                name,
                gains.lookahead,
                gains.max_power,
                gains.deceleration_threshold,
                gains.integral_ratio,
            )?;
        }
        for (name, gains) in [
            ("teleop_translation", &self.teleop_translation),
            ("autonomous_translation", &self.autonomous_translation),
        ] {
            check_gains(
                name,
                gains.lookahead,
                gains.max_power,
                gains.deceleration_threshold,
                gains.integral_ratio,
            )?;
        }

        positive("rotation_integral_window", self.rotation_integral_window)?;
        positive("seek.position_tolerance", self.seek.position_tolerance)?;
        non_negative("seek.min_linear_speed", self.seek.min_linear_speed)?;
        positive("seek.rotation_tolerance", self.seek.rotation_tolerance)?;
        non_negative("seek.min_angular_speed", self.seek.min_angular_speed)?;
        if self.seek.stuck_timeout.is_zero() {
            return Err(ControlError::InvalidConfig(
                "seek.stuck_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn check_gains(
    name: &str,
    lookahead: f64,
    max_power: f64,
    deceleration_threshold: f64,
    integral_ratio: f64,
) -> Result<()> {
    non_negative(&format!("{name}.lookahead"), lookahead)?;
    positive(&format!("{name}.deceleration_threshold"), deceleration_threshold)?;
    non_negative(&format!("{name}.integral_ratio"), integral_ratio)?;
    if !(max_power > 0.0 && max_power <= 1.0) {
        return Err(ControlError::InvalidConfig(format!(
            "{name}.max_power must be in (0, 1], got {max_power}"
        )));
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidConfig(format!(
            "{name} must be non-negative, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_rotational_presets() {
        let stationary = RotationalGains::stationary();
        assert!((stationary.proportional_gain() + 0.5 / degrees(15.0)).abs() < EPSILON);
        assert_eq!(stationary.integral_gain(), 0.0);

        let moving = RotationalGains::in_motion();
        assert!((moving.proportional_gain() + 0.35 / degrees(45.0)).abs() < EPSILON);
    }

    #[test]
    fn test_translational_presets() {
        let teleop = TranslationalGains::teleop();
        assert!((teleop.proportional_gain() - 0.5 / 2000.0).abs() < EPSILON);
        assert!((teleop.integral_window() - 500.0).abs() < EPSILON);

        let auto = TranslationalGains::autonomous();
        assert_eq!(auto.deceleration_threshold, 2400.0);
        assert_eq!(auto.lookahead, 0.2);
    }

    #[test]
    fn test_mode_selection() {
        let config = ChassisConfig::default();
        assert_eq!(config.translation(true).deceleration_threshold, 2400.0);
        assert_eq!(config.translation(false).deceleration_threshold, 2000.0);
        assert_eq!(config.rotation(true).max_power, 0.5);
        assert_eq!(config.rotation(false).max_power, 0.35);
    }

    #[test]
    fn test_default_validates() {
        assert!(ChassisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ChassisConfig::default();
        config.moving_rotation.max_power = 1.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ControlError::InvalidConfig(ref msg) if msg.contains("moving_rotation.max_power")));

        let mut config = ChassisConfig::default();
        config.autonomous_translation.deceleration_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = ChassisConfig::default();
        config.seek.stuck_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ChassisConfig::default();
        config.seek.position_tolerance = f64::NAN;
        assert!(config.validate().is_err());
    }
}
