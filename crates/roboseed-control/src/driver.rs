//! The chassis driver: controller state plus the per-tick update.

use std::time::Instant;

use roboseed_kinematics::angle::degrees;
use roboseed_kinematics::{ChassisPower, Vec2, WheelPowers, mix, normalize_angle};
use tracing::{debug, trace};

use crate::config::{ChassisConfig, TranslationalGains};
use crate::error::{ControlError, Result};
use crate::hardware::{PositionEstimator, WheelActuator};
use crate::rotation::{self, HeadingSample, RotationalTerms};
use crate::translation::{self, TranslationSample, TranslationalTerms};

/// How the rotation power term is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationMode {
    /// The caller sets the rotation power directly.
    #[default]
    Manual,
    /// The rotational law steers towards the target heading.
    GoToRotation,
}

/// How the strafe and forward power terms are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationMode {
    /// The caller sets the power terms directly.
    #[default]
    Manual,
    /// The translational law steers towards the target position.
    GoToPosition,
}

/// Closed-loop controller for a mecanum chassis.
///
/// Owns the estimator and the motors for the whole session. Both may also be
/// borrowed (`&mut E`, `&mut A`) when the caller needs them back afterwards.
#[derive(Debug)]
pub struct ChassisDriver<E, A> {
    estimator: E,
    actuator: A,
    config: ChassisConfig,

    x_motion: f64,
    y_motion: f64,
    rotational_motion: f64,

    target_position: Vec2,
    target_rotation: f64,
    translational_integral: Vec2,
    rotational_integral: f64,

    rotation_mode: RotationMode,
    translation_mode: TranslationMode,

    ras_active: bool,
    aim_interrupted: bool,
    auto_mode: bool,

    last_update: Option<Instant>,
    last_rotation: RotationalTerms,
    last_translation: TranslationalTerms,
    last_command: WheelPowers,
}

impl<E, A> ChassisDriver<E, A>
where
    E: PositionEstimator,
    A: WheelActuator,
{
    /// Creates a driver with both axes in manual mode and no motion.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidConfig)` if `config` fails validation.
    pub fn new(estimator: E, actuator: A, config: ChassisConfig) -> Result<Self> {
        config.validate()?;
        Ok(ChassisDriver {
            estimator,
            actuator,
            config,
            x_motion: 0.0,
            y_motion: 0.0,
            rotational_motion: 0.0,
            target_position: Vec2::ZERO,
            target_rotation: 0.0,
            translational_integral: Vec2::ZERO,
            rotational_integral: 0.0,
            rotation_mode: RotationMode::Manual,
            translation_mode: TranslationMode::Manual,
            ras_active: false,
            aim_interrupted: false,
            auto_mode: false,
            last_update: None,
            last_rotation: RotationalTerms::default(),
            last_translation: TranslationalTerms::default(),
            last_command: WheelPowers::default(),
        })
    }

    /// Sets manual body-frame translation power and sends commands.
    pub fn set_translational_motion(&mut self, x: f64, y: f64) -> Result<WheelPowers> {
        self.x_motion = x;
        self.y_motion = y;
        self.translation_mode = TranslationMode::Manual;
        self.send_commands_to_motors()
    }

    /// Sets manual translation power given in the field frame.
    ///
    /// The request is rotated into the body frame using the current heading
    /// estimate, so pushing "up the field" keeps driving up the field whichever
    /// way the chassis faces.
    pub fn set_field_relative_translational_motion(&mut self, x: f64, y: f64) -> Result<WheelPowers> {
        let body = Vec2::new(x, y).field_to_body(self.estimator.heading());
        self.set_translational_motion(body.x, body.y)
    }

    /// Sets manual rotation power and sends commands.
    pub fn set_rotational_motion(&mut self, rotation: f64) -> Result<WheelPowers> {
        self.rotation_mode = RotationMode::Manual;
        self.rotational_motion = rotation;
        self.last_update = None;
        self.send_commands_to_motors()
    }

    /// Targets a field position while holding the current heading.
    ///
    /// Does not send commands; the next tick starts steering.
    pub fn set_targeted_translation(&mut self, x: f64, y: f64) {
        self.target_position = Vec2::new(x, y);
        self.translational_integral = Vec2::ZERO;
        self.translation_mode = TranslationMode::GoToPosition;

        let heading = self.estimator.heading();
        self.set_targeted_rotation(heading);

        debug!(goal = %self.target_position, heading, "Translation target set");
    }

    /// Targets a heading in radians. Does not send commands.
    pub fn set_targeted_rotation(&mut self, radians: f64) {
        self.target_rotation = normalize_angle(radians);
        self.rotational_integral = 0.0;
        self.rotation_mode = RotationMode::GoToRotation;
        self.last_update = None;
    }

    /// Targets a heading in degrees.
    pub fn set_targeted_rotation_degrees(&mut self, value: f64) {
        self.set_targeted_rotation(degrees(value));
    }

    /// Hands rotation back to the caller. The last rotation power is kept.
    pub fn switch_to_manual_rotation_mode(&mut self) {
        self.rotation_mode = RotationMode::Manual;
    }

    /// Hands translation back to the caller. The last powers are kept.
    pub fn switch_to_manual_position_mode(&mut self) {
        self.translation_mode = TranslationMode::Manual;
    }

    /// Records that the pilot took over during an assisted aim.
    pub fn pilot_interruption(&mut self) {
        self.ras_active = false;
        self.aim_interrupted = true;
    }

    /// Starts an assisted aim: selects the stationary-turn regime.
    pub fn new_aim_started(&mut self) {
        self.ras_active = true;
        self.aim_interrupted = false;
    }

    /// Ends an assisted aim.
    pub fn aim_stopped(&mut self) {
        self.ras_active = false;
    }

    /// Whether the pilot interrupted the current aim.
    pub fn is_aim_process_interrupted(&self) -> bool {
        self.aim_interrupted
    }

    /// Whether the stationary-turn regime is selected.
    pub fn is_ras_activated(&self) -> bool {
        self.ras_active
    }

    /// Selects the autonomous (`true`) or teleop translational preset.
    pub fn set_auto_mode(&mut self, auto_mode: bool) {
        self.auto_mode = auto_mode;
        debug!(auto_mode, threshold = self.deceleration_threshold(), "Translation preset changed");
    }

    /// Whether the autonomous preset is selected.
    pub fn is_auto_mode(&self) -> bool {
        self.auto_mode
    }

    /// The translational gains currently in effect.
    pub fn translational_gains(&self) -> &TranslationalGains {
        self.config.translation(self.auto_mode)
    }

    /// Distance at which translational output starts to fall below its cap.
    pub fn deceleration_threshold(&self) -> f64 {
        self.translational_gains().deceleration_threshold
    }

    /// Forces an estimator update, then runs its regular update.
    pub fn refresh_estimate(&mut self) -> Result<()> {
        self.estimator.force_refresh().map_err(ControlError::estimator)?;
        self.estimator.refresh().map_err(ControlError::estimator)?;
        Ok(())
    }

    /// Runs the active control laws and sends the mixed powers to the motors.
    pub fn send_commands_to_motors(&mut self) -> Result<WheelPowers> {
        self.send_commands_at(Instant::now())
    }

    /// Like [`send_commands_to_motors`](Self::send_commands_to_motors) with an
    /// explicit clock reading.
    ///
    /// The integrals use the time since the previous law evaluation. The first
    /// evaluation after a new target uses zero.
    ///
    /// Each law runs only while its own axis is targeted: a position seek
    /// with manual rotation leaves the rotation power as the caller set it.
    pub fn send_commands_at(&mut self, now: Instant) -> Result<WheelPowers> {
        let rotating = self.rotation_mode == RotationMode::GoToRotation;
        let translating = self.translation_mode == TranslationMode::GoToPosition;

        if rotating || translating {
            let dt = self
                .last_update
                .map(|last| now.saturating_duration_since(last).as_secs_f64())
                .unwrap_or(0.0);
            self.last_update = Some(now);

            if rotating {
                self.update_rotation(dt);
            }
            if translating {
                self.update_translation(dt);
            }
        }

        let mut wheels = mix(self.chassis_power());
        if self.config.normalize_wheel_powers {
            wheels = wheels.desaturate(1.0)?;
        }

        self.actuator.apply(wheels).map_err(ControlError::actuator)?;
        self.last_command = wheels;
        trace!(power = %self.chassis_power(), %wheels, "Motor command sent");
        Ok(wheels)
    }

    /// Stops the chassis: both axes manual, all powers zero.
    pub fn halt(&mut self) -> Result<WheelPowers> {
        self.rotation_mode = RotationMode::Manual;
        self.translation_mode = TranslationMode::Manual;
        self.x_motion = 0.0;
        self.y_motion = 0.0;
        self.rotational_motion = 0.0;
        self.send_commands_to_motors()
    }

    fn update_rotation(&mut self, dt: f64) {
        let gains = *self.config.rotation(self.ras_active);
        let sample = HeadingSample {
            heading: self.estimator.heading(),
            angular_velocity: self.estimator.angular_velocity(),
        };

        let terms = rotation::evaluate(
            &gains,
            self.config.rotation_integral_window,
            sample,
            self.target_rotation,
            dt,
            &mut self.rotational_integral,
        );
        self.rotational_motion = terms.power;
        self.last_rotation = terms;

        trace!(
            error = terms.raw_error,
            predicted = terms.predicted_error,
            power = terms.power,
            stationary = self.ras_active,
            "Rotational law"
        );
    }

    fn update_translation(&mut self, dt: f64) {
        let gains = *self.translational_gains();
        let sample = TranslationSample {
            position: self.estimator.position(),
            velocity: self.estimator.velocity(),
            heading: self.estimator.heading(),
        };

        let terms = translation::evaluate(
            &gains,
            sample,
            self.target_position,
            dt,
            &mut self.translational_integral,
        );
        self.x_motion = terms.x_power;
        self.y_motion = terms.y_power;
        self.last_translation = terms;

        trace!(
            error = %terms.raw_error,
            predicted = %terms.predicted_error,
            x = terms.x_power,
            y = terms.y_power,
            "Translational law"
        );
    }
}

impl<E, A> ChassisDriver<E, A> {
    /// The body-frame power terms that the next command will mix.
    pub fn chassis_power(&self) -> ChassisPower {
        ChassisPower::new(self.x_motion, self.y_motion, self.rotational_motion)
    }

    /// Target position of the current or last translation goal.
    pub fn target_position(&self) -> Vec2 {
        self.target_position
    }

    /// Target heading of the current or last rotation goal, in `[0, 2π)`.
    pub fn target_rotation(&self) -> f64 {
        self.target_rotation
    }

    /// Current rotation mode.
    pub fn rotation_mode(&self) -> RotationMode {
        self.rotation_mode
    }

    /// Current translation mode.
    pub fn translation_mode(&self) -> TranslationMode {
        self.translation_mode
    }

    /// Terms from the last rotational law evaluation.
    pub fn last_rotational_terms(&self) -> RotationalTerms {
        self.last_rotation
    }

    /// Terms from the last translational law evaluation.
    pub fn last_translational_terms(&self) -> TranslationalTerms {
        self.last_translation
    }

    /// Wheel powers of the last command the actuator accepted.
    pub fn last_command(&self) -> WheelPowers {
        self.last_command
    }

    /// Active configuration.
    pub fn config(&self) -> &ChassisConfig {
        &self.config
    }

    /// The position estimator.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Mutable access to the position estimator.
    pub fn estimator_mut(&mut self) -> &mut E {
        &mut self.estimator
    }

    /// The wheel actuator.
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub(crate) fn zero_translation(&mut self) {
        self.translation_mode = TranslationMode::Manual;
        self.x_motion = 0.0;
        self.y_motion = 0.0;
    }

    pub(crate) fn zero_rotation(&mut self) {
        self.rotation_mode = RotationMode::Manual;
        self.rotational_motion = 0.0;
        self.last_update = None;
    }
}
