use std::convert::Infallible;
use std::time::{Duration, Instant};

use roboseed_control::{
    ChassisConfig, ChassisDriver, GoalSeek, PositionEstimator, Vec2, Wheel, WheelActuator, WheelPowers,
};
use roboseed_kinematics::{FieldPose, unmix};
use tracing_subscriber::EnvFilter;

/// Ideal chassis: wheel powers become body velocity instantly.
#[derive(Default)]
struct Plant {
    pose: FieldPose,
    velocity: Vec2,
    yaw_rate: f64,
    command: WheelPowers,
}

impl Plant {
    const TOP_SPEED: f64 = 2500.0;
    const TOP_YAW_RATE: f64 = 5.0;

    fn advance(&mut self, dt: f64) {
        let achieved = unmix(self.command);
        let body = Vec2::new(achieved.x, achieved.y) * Self::TOP_SPEED;
        self.yaw_rate = -achieved.rotation * Self::TOP_YAW_RATE;
        self.velocity = body.body_to_field(self.pose.heading);
        if let Ok(next) = self.pose.integrate(body, self.yaw_rate, dt) {
            self.pose = next;
        }
    }
}

impl PositionEstimator for Plant {
    type Error = Infallible;

    fn refresh(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn force_refresh(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn position(&self) -> Vec2 {
        self.pose.position
    }

    fn heading(&self) -> f64 {
        self.pose.heading
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn raw_velocity(&self) -> Vec2 {
        self.velocity
    }

    fn angular_velocity(&self) -> f64 {
        self.yaw_rate
    }
}

/// Forwards commands into the plant it shares a cell with.
struct Motors<'a>(&'a std::cell::Cell<WheelPowers>);

impl WheelActuator for Motors<'_> {
    type Error = Infallible;

    fn set_power(&mut self, wheel: Wheel, power: f64) -> Result<(), Infallible> {
        let mut powers = self.0.get();
        match wheel {
            Wheel::LeftFront => powers.left_front = power,
            Wheel::LeftRear => powers.left_rear = power,
            Wheel::RightFront => powers.right_front = power,
            Wheel::RightRear => powers.right_rear = power,
        }
        self.0.set(powers);
        Ok(())
    }
}

fn main() -> roboseed_control::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let command = std::cell::Cell::new(WheelPowers::default());
    let mut plant = Plant::default();
    let dt = Duration::from_millis(10);

    let mut driver = ChassisDriver::new(&mut plant, Motors(&command), ChassisConfig::default())?;
    driver.set_auto_mode(true);

    let route = [
        GoalSeek::position(0.0, 1500.0),
        GoalSeek::rotation_degrees(90.0),
        GoalSeek::position(-1200.0, 1500.0),
        GoalSeek::rotation_degrees(0.0),
    ];

    // simulated clock, so the demo runs faster than real time
    let mut now = Instant::now();
    for mut seek in route {
        seek.begin(&mut driver, now);
        let status = loop {
            let status = seek.step(&mut driver, now)?;
            if status.is_terminal() {
                break status;
            }
            let plant = driver.estimator_mut();
            plant.command = command.get();
            plant.advance(dt.as_secs_f64());
            now += dt;
        };

        let pose = driver.estimator().pose;
        println!("{:?} -> {:?} at {}", seek.goal(), status, pose);
    }

    driver.halt()?;
    Ok(())
}
