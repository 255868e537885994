//! A driver handle that several threads can use at once.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use roboseed_kinematics::WheelPowers;

use crate::driver::ChassisDriver;
use crate::error::Result;
use crate::hardware::{PositionEstimator, WheelActuator};
use crate::seek::{GoalSeek, SeekOutcome, SeekStatus};

/// Cloneable, mutex-guarded [`ChassisDriver`].
///
/// Every method takes the lock exactly once, so a control tick is never
/// interleaved with a setter from another thread. Blocking seeks release the
/// lock between ticks.
pub struct SharedChassis<E, A> {
    inner: Arc<Mutex<ChassisDriver<E, A>>>,
}

impl<E, A> Clone for SharedChassis<E, A> {
    fn clone(&self) -> Self {
        SharedChassis {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, A> SharedChassis<E, A>
where
    E: PositionEstimator,
    A: WheelActuator,
{
    /// Wraps a driver.
    pub fn new(driver: ChassisDriver<E, A>) -> Self {
        SharedChassis {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Locks the driver for a sequence of calls that must not interleave.
    pub fn lock(&self) -> MutexGuard<'_, ChassisDriver<E, A>> {
        self.inner.lock()
    }

    /// Runs `f` with the lock held.
    pub fn with<R>(&self, f: impl FnOnce(&mut ChassisDriver<E, A>) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// One control tick under the lock.
    pub fn tick(&self, now: Instant) -> Result<WheelPowers> {
        self.inner.lock().send_commands_at(now)
    }

    /// Manual body-frame translation.
    pub fn set_translational_motion(&self, x: f64, y: f64) -> Result<WheelPowers> {
        self.inner.lock().set_translational_motion(x, y)
    }

    /// Manual field-frame translation.
    pub fn set_field_relative_translational_motion(&self, x: f64, y: f64) -> Result<WheelPowers> {
        self.inner.lock().set_field_relative_translational_motion(x, y)
    }

    /// Manual rotation.
    pub fn set_rotational_motion(&self, rotation: f64) -> Result<WheelPowers> {
        self.inner.lock().set_rotational_motion(rotation)
    }

    /// Flags a pilot takeover.
    pub fn pilot_interruption(&self) {
        self.inner.lock().pilot_interruption();
    }

    /// Stops the chassis.
    pub fn halt(&self) -> Result<WheelPowers> {
        self.inner.lock().halt()
    }

    /// Steps a seek under the lock.
    pub fn step(&self, seek: &mut GoalSeek, now: Instant) -> Result<SeekStatus> {
        seek.step(&mut *self.inner.lock(), now)
    }

    /// Runs a seek to completion, taking the lock once per tick.
    pub fn run_seek(&self, mut seek: GoalSeek) -> Result<SeekOutcome> {
        seek.begin(&mut *self.inner.lock(), Instant::now());
        loop {
            let now = Instant::now();
            if self.step(&mut seek, now)?.is_terminal() {
                if let Some(outcome) = seek.outcome(now) {
                    return Ok(outcome);
                }
            }
            std::thread::yield_now();
        }
    }
}
