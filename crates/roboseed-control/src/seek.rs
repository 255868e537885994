//! Goal seeking: drive to a position or heading and report how it ended.
//!
//! A [`GoalSeek`] is stepped by the caller at whatever cadence it likes. Each
//! step refreshes the estimate, runs one control tick, then checks for a stall
//! and for arrival. The blocking helpers on [`ChassisDriver`] step it in a
//! tight loop against the wall clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use roboseed_kinematics::angle::{degrees, to_degrees};
use roboseed_kinematics::{Vec2, normalize_angle, signed_angular_difference};
use tracing::{debug, error, info, warn};

use crate::driver::ChassisDriver;
use crate::error::{ControlError, Result};
use crate::hardware::{PositionEstimator, WheelActuator};

/// What a seek drives towards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekGoal {
    /// A field position. Heading is held at its value when the seek begins.
    Position(Vec2),
    /// A heading in radians, normalized to `[0, 2π)`.
    Rotation(f64),
}

/// State of a seek after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    /// Still driving.
    InProgress,
    /// Reached the goal within tolerance.
    Succeeded,
    /// Stopped moving for longer than the stall timeout.
    Stuck,
    /// The cancel token fired.
    Cancelled,
}

impl SeekStatus {
    /// Whether the seek is over.
    pub fn is_terminal(self) -> bool {
        self != SeekStatus::InProgress
    }
}

/// Summary of a finished seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekOutcome {
    /// Terminal status.
    pub status: SeekStatus,
    /// Time from `begin` to the terminal step.
    pub elapsed: Duration,
    /// Number of control ticks run.
    pub steps: u64,
}

impl SeekOutcome {
    /// Whether the goal was reached.
    pub fn is_success(&self) -> bool {
        self.status == SeekStatus::Succeeded
    }
}

/// Flags a stall once the chassis has been still for longer than a timeout.
#[derive(Debug, Clone, Copy)]
pub struct StallDetector {
    timeout: Duration,
    still_since: Instant,
}

impl StallDetector {
    /// Starts the still timer at `now`.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        StallDetector {
            timeout,
            still_since: now,
        }
    }

    /// Feeds one observation. Returns `true` when stalled.
    pub fn update(&mut self, moving: bool, now: Instant) -> bool {
        if moving {
            self.still_since = now;
            false
        } else {
            now.saturating_duration_since(self.still_since) > self.timeout
        }
    }

    /// How long the chassis has been still as of `now`.
    pub fn still_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.still_since)
    }
}

/// Cooperative cancellation flag shared between a seek and its supervisor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Seeks observe it at their next step.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A single drive-to-goal operation.
#[derive(Debug, Clone)]
pub struct GoalSeek {
    goal: SeekGoal,
    cancel: Option<CancelToken>,
    stall: Option<StallDetector>,
    started: Option<Instant>,
    steps: u64,
    status: SeekStatus,
}

impl GoalSeek {
    fn new(goal: SeekGoal) -> Self {
        GoalSeek {
            goal,
            cancel: None,
            stall: None,
            started: None,
            steps: 0,
            status: SeekStatus::InProgress,
        }
    }

    /// Seek to a field position.
    pub fn position(x: f64, y: f64) -> Self {
        Self::new(SeekGoal::Position(Vec2::new(x, y)))
    }

    /// Seek to a heading in radians.
    pub fn rotation(radians: f64) -> Self {
        Self::new(SeekGoal::Rotation(normalize_angle(radians)))
    }

    /// Seek to a heading in degrees.
    pub fn rotation_degrees(value: f64) -> Self {
        Self::rotation(degrees(value))
    }

    /// Attaches a cancel token checked at the start of every step.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The goal.
    pub fn goal(&self) -> SeekGoal {
        self.goal
    }

    /// Status after the last step.
    pub fn status(&self) -> SeekStatus {
        self.status
    }

    /// Outcome, once the seek is over.
    pub fn outcome(&self, now: Instant) -> Option<SeekOutcome> {
        if !self.status.is_terminal() {
            return None;
        }
        Some(SeekOutcome {
            status: self.status,
            elapsed: self.elapsed(now),
            steps: self.steps,
        })
    }

    /// Sets the driver's target and starts the stall timer.
    ///
    /// Called implicitly by the first [`step`](Self::step) if omitted.
    pub fn begin<E, A>(&mut self, driver: &mut ChassisDriver<E, A>, now: Instant)
    where
        E: PositionEstimator,
        A: WheelActuator,
    {
        match self.goal {
            SeekGoal::Position(target) => driver.set_targeted_translation(target.x, target.y),
            SeekGoal::Rotation(target) => driver.set_targeted_rotation(target),
        }
        driver.new_aim_started();

        self.stall = Some(StallDetector::new(driver.config().seek.stuck_timeout, now));
        self.started = Some(now);
        self.steps = 0;
        self.status = SeekStatus::InProgress;

        info!(goal = ?self.goal, auto_mode = driver.is_auto_mode(), "Seek started");
    }

    /// Runs one control tick and evaluates the stop conditions.
    ///
    /// Once a terminal status is reached further calls return it unchanged.
    ///
    /// # Errors
    ///
    /// Estimator and actuator failures are returned after the driver has been
    /// halted. The seek stays in progress and may be stepped again.
    pub fn step<E, A>(&mut self, driver: &mut ChassisDriver<E, A>, now: Instant) -> Result<SeekStatus>
    where
        E: PositionEstimator,
        A: WheelActuator,
    {
        if self.status.is_terminal() {
            return Ok(self.status);
        }
        if self.started.is_none() {
            self.begin(driver, now);
        }

        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return self.finish(driver, SeekStatus::Cancelled, now);
        }

        if let Err(e) = driver.refresh_estimate() {
            return Err(self.abandon(driver, e));
        }
        let limits = driver.config().seek;
        let estimator = driver.estimator();

        let (arrived, moving, error) = match self.goal {
            SeekGoal::Position(target) => {
                let error = target - estimator.position();
                let arrived = error.length_squared() <= limits.position_tolerance.powi(2);
                let moving = estimator.raw_velocity().length_squared() > limits.min_linear_speed.powi(2);
                (arrived, moving, error.length())
            }
            SeekGoal::Rotation(target) => {
                let error = signed_angular_difference(estimator.heading(), target);
                let arrived = error.abs() <= limits.rotation_tolerance;
                let moving = estimator.angular_velocity().abs() > limits.min_angular_speed;
                (arrived, moving, to_degrees(error))
            }
        };

        if let Err(e) = driver.send_commands_at(now) {
            return Err(self.abandon(driver, e));
        }
        self.steps += 1;

        let stall = self
            .stall
            .get_or_insert_with(|| StallDetector::new(limits.stuck_timeout, now));
        if stall.update(moving, now) {
            warn!(
                goal = ?self.goal,
                error,
                still_for = ?stall.still_for(now),
                "Chassis stuck, aborting seek"
            );
            return self.finish(driver, SeekStatus::Stuck, now);
        }

        if arrived {
            return self.finish(driver, SeekStatus::Succeeded, now);
        }

        debug!(error, moving, step = self.steps, "Seek in progress");
        Ok(SeekStatus::InProgress)
    }

    /// Steps against the wall clock until the seek is over.
    pub fn run_blocking<E, A>(mut self, driver: &mut ChassisDriver<E, A>) -> Result<SeekOutcome>
    where
        E: PositionEstimator,
        A: WheelActuator,
    {
        self.begin(driver, Instant::now());
        loop {
            let now = Instant::now();
            if self.step(driver, now)?.is_terminal() {
                return Ok(SeekOutcome {
                    status: self.status,
                    elapsed: self.elapsed(now),
                    steps: self.steps,
                });
            }
            std::thread::yield_now();
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    fn abandon<E, A>(&mut self, driver: &mut ChassisDriver<E, A>, error: ControlError) -> ControlError
    where
        E: PositionEstimator,
        A: WheelActuator,
    {
        driver.aim_stopped();
        if let Err(halt_error) = driver.halt() {
            error!(error = %halt_error, "Failed to stop the wheels after a seek error");
        }
        warn!(goal = ?self.goal, %error, steps = self.steps, "Seek interrupted by a hardware error");
        // the goal is re-targeted on the next step
        self.started = None;
        error
    }

    fn finish<E, A>(
        &mut self,
        driver: &mut ChassisDriver<E, A>,
        status: SeekStatus,
        now: Instant,
    ) -> Result<SeekStatus>
    where
        E: PositionEstimator,
        A: WheelActuator,
    {
        self.status = status;
        match self.goal {
            SeekGoal::Position(_) => driver.zero_translation(),
            SeekGoal::Rotation(_) => driver.zero_rotation(),
        }
        driver.aim_stopped();
        driver.send_commands_at(now)?;

        let elapsed = self.elapsed(now);
        match status {
            SeekStatus::Succeeded => info!(goal = ?self.goal, ?elapsed, steps = self.steps, "Seek succeeded"),
            _ => warn!(goal = ?self.goal, ?status, ?elapsed, steps = self.steps, "Seek ended early"),
        }
        Ok(status)
    }
}

impl<E, A> ChassisDriver<E, A>
where
    E: PositionEstimator,
    A: WheelActuator,
{
    /// Drives to `(x, y)` holding the current heading. Blocks until done.
    pub fn go_to_position(&mut self, x: f64, y: f64) -> Result<SeekOutcome> {
        GoalSeek::position(x, y).run_blocking(self)
    }

    /// [`go_to_position`](Self::go_to_position) that stops when `cancel` fires.
    pub fn go_to_position_with_cancel(&mut self, x: f64, y: f64, cancel: &CancelToken) -> Result<SeekOutcome> {
        GoalSeek::position(x, y).with_cancel(cancel.clone()).run_blocking(self)
    }

    /// Turns to a heading in radians. Blocks until done.
    pub fn go_to_rotation(&mut self, radians: f64) -> Result<SeekOutcome> {
        GoalSeek::rotation(radians).run_blocking(self)
    }

    /// Turns to a heading in degrees. Blocks until done.
    pub fn go_to_rotation_degrees(&mut self, value: f64) -> Result<SeekOutcome> {
        GoalSeek::rotation_degrees(value).run_blocking(self)
    }

    /// [`go_to_rotation`](Self::go_to_rotation) that stops when `cancel` fires.
    pub fn go_to_rotation_with_cancel(&mut self, radians: f64, cancel: &CancelToken) -> Result<SeekOutcome> {
        GoalSeek::rotation(radians).with_cancel(cancel.clone()).run_blocking(self)
    }
}
