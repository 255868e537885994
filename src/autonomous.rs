//! Scripted route execution on top of the goal-seek state machine.

use std::time::{Duration, Instant};

use anyhow::Context;
use roboseed_control::{
    CancelToken, ChassisDriver, GoalSeek, PositionEstimator, SeekStatus, WheelActuator,
};
use spin_sleep::SpinSleeper;
use tracing::{error, info, warn};

use crate::bus::{Telemetry, Topic};
use crate::config::RouteStep;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub completed: usize,
    pub stuck: usize,
    pub cancelled: bool,
    pub aborted: bool,
}

pub struct RouteRunner<E, A> {
    driver: ChassisDriver<E, A>,
    period: Duration,
    cancel: CancelToken,
    telemetry: Topic<Telemetry>,
    abort_on_stuck: bool,
    sleeper: SpinSleeper,
    started: Instant,
}

impl<E, A> RouteRunner<E, A>
where
    E: PositionEstimator,
    A: WheelActuator,
{
    pub fn new(
        driver: ChassisDriver<E, A>,
        period: Duration,
        cancel: CancelToken,
        telemetry: Topic<Telemetry>,
        abort_on_stuck: bool,
    ) -> Self {
        RouteRunner {
            driver,
            period,
            cancel,
            telemetry,
            abort_on_stuck,
            sleeper: SpinSleeper::new(100_000),
            started: Instant::now(),
        }
    }

    pub fn driver(&self) -> &ChassisDriver<E, A> {
        &self.driver
    }

    /// Runs every step in order and leaves the chassis halted, including when
    /// a step fails.
    pub fn run(&mut self, route: &[RouteStep]) -> anyhow::Result<RouteReport> {
        let mut report = RouteReport::default();
        self.started = Instant::now();

        let outcome = self.run_steps(route, &mut report);
        let halted = self.driver.halt();
        match outcome {
            Ok(()) => {
                halted.context("Failed to stop the chassis after the route")?;
                info!(?report, elapsed = ?self.started.elapsed(), "Route finished");
                Ok(report)
            }
            Err(e) => {
                if let Err(halt_error) = halted {
                    error!(error = %halt_error, "Failed to stop the chassis after a route error");
                }
                warn!(?report, elapsed = ?self.started.elapsed(), "Route failed, chassis halted");
                Err(e)
            }
        }
    }

    fn run_steps(&mut self, route: &[RouteStep], report: &mut RouteReport) -> anyhow::Result<()> {
        for (index, step) in route.iter().enumerate() {
            info!(step = index, ?step, "Route step started");
            let status = match step {
                RouteStep::Position { target } => {
                    self.seek(index, GoalSeek::position(target.x, target.y))?
                }
                RouteStep::Rotation { degrees } => {
                    self.seek(index, GoalSeek::rotation_degrees(*degrees))?
                }
                RouteStep::Drive { x, y, rotation, ms } => {
                    self.drive(index, *x, *y, *rotation, Duration::from_millis(*ms))?
                }
                RouteStep::Pause { ms } => self.pause(index, Duration::from_millis(*ms))?,
            };

            match status {
                SeekStatus::Stuck => {
                    report.stuck += 1;
                    if self.abort_on_stuck {
                        warn!(step = index, "Chassis stuck, aborting route");
                        report.aborted = true;
                        break;
                    }
                    warn!(step = index, "Chassis stuck, skipping to next step");
                }
                SeekStatus::Cancelled => {
                    report.cancelled = true;
                    break;
                }
                SeekStatus::Succeeded | SeekStatus::InProgress => report.completed += 1,
            }
        }
        Ok(())
    }

    fn seek(&mut self, index: usize, seek: GoalSeek) -> anyhow::Result<SeekStatus> {
        let mut seek = seek.with_cancel(self.cancel.clone());
        seek.begin(&mut self.driver, Instant::now());
        loop {
            let now = Instant::now();
            let status = seek
                .step(&mut self.driver, now)
                .with_context(|| format!("Route step {index} failed"))?;
            self.publish(index, status);
            if status.is_terminal() {
                return Ok(status);
            }
            self.sleeper.sleep(self.period);
        }
    }

    fn drive(&mut self, index: usize, x: f64, y: f64, rotation: f64, duration: Duration) -> anyhow::Result<SeekStatus> {
        let end = Instant::now() + duration;
        while Instant::now() < end {
            if self.cancel.is_cancelled() {
                return Ok(SeekStatus::Cancelled);
            }
            self.driver.refresh_estimate()?;
            self.driver.set_rotational_motion(rotation)?;
            self.driver.set_field_relative_translational_motion(x, y)?;
            self.publish(index, SeekStatus::InProgress);
            self.sleeper.sleep(self.period);
        }
        self.driver.set_translational_motion(0.0, 0.0)?;
        self.driver.set_rotational_motion(0.0)?;
        Ok(SeekStatus::Succeeded)
    }

    /// Holds the current pose: translation stops, heading is held.
    fn pause(&mut self, index: usize, duration: Duration) -> anyhow::Result<SeekStatus> {
        self.driver.refresh_estimate()?;
        let heading = self.driver.estimator().heading();
        self.driver.set_translational_motion(0.0, 0.0)?;
        self.driver.set_targeted_rotation(heading);

        let end = Instant::now() + duration;
        while Instant::now() < end {
            if self.cancel.is_cancelled() {
                return Ok(SeekStatus::Cancelled);
            }
            self.driver.refresh_estimate()?;
            self.driver.send_commands_to_motors()?;
            self.publish(index, SeekStatus::InProgress);
            self.sleeper.sleep(self.period);
        }
        self.driver.set_rotational_motion(0.0)?;
        Ok(SeekStatus::Succeeded)
    }

    fn publish(&self, index: usize, status: SeekStatus) {
        let estimator = self.driver.estimator();
        self.telemetry.publish(Telemetry {
            route_step: index,
            elapsed: self.started.elapsed(),
            position: estimator.position(),
            heading: estimator.heading(),
            position_error: self.driver.last_translational_terms().raw_error,
            heading_error: self.driver.last_rotational_terms().raw_error,
            power: self.driver.chassis_power(),
            wheels: self.driver.last_command(),
            status,
        });
    }
}
