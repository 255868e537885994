//! Simulated mecanum chassis: plant dynamics, a noisy estimator and motor sinks.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roboseed_control::{PositionEstimator, WheelActuator};
use roboseed_kinematics::angle::degrees;
use roboseed_kinematics::{FieldPose, KinematicsError, Vec2, Wheel, WheelPowers, unmix};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blackboard::{self, Blackboard};
use crate::config::PlantSettings;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("emergency stop is latched")]
    EStopped,
    #[error("plant fault: {0}")]
    Fault(String),
}

/// Chassis dynamics. Wheel powers set a target body velocity which the
/// achieved velocity follows through a first-order lag.
#[derive(Debug, Clone)]
pub struct Plant {
    pub pose: FieldPose,
    /// Achieved body-frame velocity.
    body_velocity: Vec2,
    yaw_rate: f64,
    top_speed: f64,
    top_yaw_rate: f64,
    time_constant: f64,
    wall_y: Option<f64>,
}

impl Plant {
    pub fn new(settings: &PlantSettings) -> Self {
        Plant {
            pose: settings.start.into(),
            body_velocity: Vec2::ZERO,
            yaw_rate: 0.0,
            top_speed: settings.top_speed,
            top_yaw_rate: degrees(settings.top_yaw_rate_deg),
            time_constant: settings.velocity_time_constant,
            wall_y: settings.wall_y,
        }
    }

    /// Advances by `dt` seconds. Returns the field-frame velocity actually achieved.
    pub fn step(&mut self, wheels: WheelPowers, dt: f64) -> Result<Vec2, KinematicsError> {
        let request = unmix(wheels);
        let target = Vec2::new(request.x, request.y) * self.top_speed;
        // positive rotation power turns clockwise
        let target_yaw = -request.rotation * self.top_yaw_rate;

        let alpha = if self.time_constant > 0.0 {
            (dt / self.time_constant).min(1.0)
        } else {
            1.0
        };
        self.body_velocity = self.body_velocity + (target - self.body_velocity) * alpha;
        self.yaw_rate += (target_yaw - self.yaw_rate) * alpha;

        let start = self.pose.position;
        let mut next = self.pose.integrate(self.body_velocity, self.yaw_rate, dt)?;
        if let Some(wall) = self.wall_y {
            if next.position.y > wall {
                next.position.y = wall;
            }
        }
        self.pose = next;

        Ok(if dt > 0.0 {
            (self.pose.position - start) * (1.0 / dt)
        } else {
            Vec2::ZERO
        })
    }

    pub fn yaw_rate(&self) -> f64 {
        self.yaw_rate
    }
}

/// Runs the plant against the blackboard until `stop` fires.
pub fn run_plant(
    bb: Blackboard,
    mut plant: Plant,
    period: Duration,
    stop: roboseed_control::CancelToken,
) {
    let sleeper = spin_sleep::SpinSleeper::new(100_000);
    let mut last = Instant::now();
    while !stop.is_cancelled() {
        let now = Instant::now();
        let dt = now.saturating_duration_since(last).as_secs_f64();
        last = now;

        let wheels = blackboard::snapshot(&bb).wheels;
        match plant.step(wheels, dt) {
            Ok(velocity) => {
                let mut g = bb.write();
                g.pose = plant.pose;
                g.velocity = velocity;
                g.yaw_rate = plant.yaw_rate();
            }
            Err(e) => {
                warn!(error = %e, "Plant integration failed");
                blackboard::raise_fault(&bb, &format!("plant integration: {e}"));
            }
        }
        sleeper.sleep(period);
    }
    debug!("Plant thread stopped.");
}

/// Estimator reading the blackboard ground truth through sensor noise.
pub struct SimEstimator {
    bb: Blackboard,
    rng: StdRng,
    position_noise: f64,
    heading_noise: f64,
    velocity_noise: f64,
    velocity_filter: f64,
    sample_period: Duration,
    last_sample: Option<Instant>,

    position: Vec2,
    heading: f64,
    velocity: Vec2,
    raw_velocity: Vec2,
    angular_velocity: f64,
}

impl SimEstimator {
    pub fn new(bb: Blackboard, settings: &PlantSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let start: FieldPose = settings.start.into();
        SimEstimator {
            bb,
            rng,
            position_noise: settings.position_noise,
            heading_noise: degrees(settings.heading_noise_deg),
            velocity_noise: settings.velocity_noise,
            velocity_filter: settings.velocity_filter.clamp(f64::EPSILON, 1.0),
            sample_period: Duration::from_millis(settings.sample_period_ms),
            last_sample: None,
            position: start.position,
            heading: start.heading,
            velocity: Vec2::ZERO,
            raw_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
        }
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        if amplitude > 0.0 {
            self.rng.random_range(-amplitude..=amplitude)
        } else {
            0.0
        }
    }

    fn noisy(&mut self, v: Vec2, amplitude: f64) -> Vec2 {
        Vec2::new(v.x + self.noise(amplitude), v.y + self.noise(amplitude))
    }

    fn sample(&mut self) -> Result<(), SimError> {
        let truth = blackboard::snapshot(&self.bb);
        if truth.estop {
            return Err(SimError::EStopped);
        }
        if let Some(fault) = truth.faults.first() {
            return Err(SimError::Fault(fault.clone()));
        }

        self.position = self.noisy(truth.pose.position, self.position_noise);
        self.heading = truth.pose.heading + self.noise(self.heading_noise);
        self.raw_velocity = self.noisy(truth.velocity, self.velocity_noise);
        self.velocity = self.velocity + (self.raw_velocity - self.velocity) * self.velocity_filter;
        self.angular_velocity = truth.yaw_rate;
        self.last_sample = Some(Instant::now());
        Ok(())
    }
}

impl PositionEstimator for SimEstimator {
    type Error = SimError;

    fn refresh(&mut self) -> Result<(), SimError> {
        let due = self
            .last_sample
            .is_none_or(|last| last.elapsed() >= self.sample_period);
        if due { self.sample() } else { Ok(()) }
    }

    fn force_refresh(&mut self) -> Result<(), SimError> {
        self.sample()
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn heading(&self) -> f64 {
        self.heading
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn raw_velocity(&self) -> Vec2 {
        self.raw_velocity
    }

    fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }
}

/// Motor sink writing into the blackboard.
pub struct SimMotors {
    bb: Blackboard,
    pending: WheelPowers,
}

impl SimMotors {
    pub fn new(bb: Blackboard) -> Self {
        SimMotors {
            bb,
            pending: WheelPowers::default(),
        }
    }

    fn stage(&mut self, wheel: Wheel, power: f64) {
        let power = power.clamp(-1.0, 1.0);
        match wheel {
            Wheel::LeftFront => self.pending.left_front = power,
            Wheel::LeftRear => self.pending.left_rear = power,
            Wheel::RightFront => self.pending.right_front = power,
            Wheel::RightRear => self.pending.right_rear = power,
        }
    }

    fn publish(&self) -> Result<(), SimError> {
        if blackboard::command(&self.bb, self.pending) {
            Ok(())
        } else {
            Err(SimError::EStopped)
        }
    }
}

impl WheelActuator for SimMotors {
    type Error = SimError;

    fn set_power(&mut self, wheel: Wheel, power: f64) -> Result<(), SimError> {
        self.stage(wheel, power);
        self.publish()
    }

    /// All four wheels land in the blackboard under one lock.
    fn apply(&mut self, powers: WheelPowers) -> Result<(), SimError> {
        for wheel in Wheel::ALL {
            self.stage(wheel, powers.get(wheel));
        }
        self.publish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::State;
    use crate::config::StartPose;
    use parking_lot::RwLock;
    use std::sync::Arc;

    const EPSILON: f64 = 1e-6;

    fn settings() -> PlantSettings {
        PlantSettings {
            top_speed: 2000.0,
            top_yaw_rate_deg: 180.0,
            velocity_time_constant: 0.0,
            position_noise: 0.0,
            heading_noise_deg: 0.0,
            velocity_noise: 0.0,
            velocity_filter: 1.0,
            sample_period_ms: 1000,
            seed: Some(7),
            wall_y: None,
            start: StartPose { x: 0.0, y: 0.0, heading_deg: 0.0 },
        }
    }

    #[test]
    fn test_plant_drives_forward() {
        let mut plant = Plant::new(&settings());
        let velocity = plant.step(WheelPowers::new(0.5, 0.5, 0.5, 0.5), 0.1).unwrap();
        assert!((velocity.y - 1000.0).abs() < EPSILON);
        assert!((plant.pose.position.y - 100.0).abs() < EPSILON);
    }

    #[test]
    fn test_plant_positive_rotation_turns_clockwise() {
        let mut plant = Plant::new(&settings());
        plant.step(WheelPowers::new(0.5, 0.5, -0.5, -0.5), 0.1).unwrap();
        assert!(plant.yaw_rate() < 0.0);
        assert!(plant.pose.heading > degrees(350.0));
    }

    #[test]
    fn test_plant_lag() {
        let mut s = settings();
        s.velocity_time_constant = 0.1;
        let mut plant = Plant::new(&s);
        let first = plant.step(WheelPowers::new(1.0, 1.0, 1.0, 1.0), 0.01).unwrap();
        assert!((first.y - 200.0).abs() < EPSILON);
        for _ in 0..200 {
            plant.step(WheelPowers::new(1.0, 1.0, 1.0, 1.0), 0.01).unwrap();
        }
        let settled = plant.step(WheelPowers::new(1.0, 1.0, 1.0, 1.0), 0.01).unwrap();
        assert!((settled.y - 2000.0).abs() < 1.0);
    }

    #[test]
    fn test_wall_stops_motion() {
        let mut s = settings();
        s.wall_y = Some(50.0);
        let mut plant = Plant::new(&s);
        plant.step(WheelPowers::new(0.5, 0.5, 0.5, 0.5), 0.1).unwrap();
        let velocity = plant.step(WheelPowers::new(0.5, 0.5, 0.5, 0.5), 0.1).unwrap();
        assert_eq!(plant.pose.position.y, 50.0);
        assert!(velocity.length() < EPSILON);
    }

    #[test]
    fn test_estimator_refresh_is_throttled() {
        let bb: Blackboard = Arc::new(RwLock::new(State::default()));
        let mut estimator = SimEstimator::new(bb.clone(), &settings());

        estimator.refresh().unwrap();
        bb.write().pose = FieldPose::new(10.0, 20.0, 0.5);

        estimator.refresh().unwrap();
        assert_eq!(estimator.position(), Vec2::ZERO);

        estimator.force_refresh().unwrap();
        assert_eq!(estimator.position(), Vec2::new(10.0, 20.0));
        assert_eq!(estimator.heading(), 0.5);
    }

    #[test]
    fn test_estimator_noise_is_bounded() {
        let mut s = settings();
        s.position_noise = 5.0;
        s.velocity_noise = 2.0;
        let bb: Blackboard = Arc::new(RwLock::new(State::at(FieldPose::new(100.0, 100.0, 0.0))));
        let mut estimator = SimEstimator::new(bb, &s);
        for _ in 0..50 {
            estimator.force_refresh().unwrap();
            let error = estimator.position() - Vec2::new(100.0, 100.0);
            assert!(error.x.abs() <= 5.0 && error.y.abs() <= 5.0);
            assert!(estimator.raw_velocity().manhattan() <= 4.0);
        }
    }

    #[test]
    fn test_estop_surfaces_as_errors() {
        let bb: Blackboard = Arc::new(RwLock::new(State::default()));
        let mut motors = SimMotors::new(bb.clone());
        let mut estimator = SimEstimator::new(bb.clone(), &settings());

        motors.apply(WheelPowers::new(2.0, 0.5, 0.5, 0.5)).unwrap();
        assert_eq!(blackboard::snapshot(&bb).wheels.left_front, 1.0);

        blackboard::trigger_estop(&bb);
        assert!(matches!(motors.apply(WheelPowers::default()), Err(SimError::EStopped)));
        assert!(matches!(estimator.force_refresh(), Err(SimError::EStopped)));
    }
}
