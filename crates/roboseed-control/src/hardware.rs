//! Interfaces to the estimator and the drive motors.

use roboseed_kinematics::{Vec2, Wheel, WheelPowers};

/// Source of the chassis pose and its rates.
///
/// Readings are cached by the implementation and only change on
/// [`refresh`](PositionEstimator::refresh) or
/// [`force_refresh`](PositionEstimator::force_refresh).
pub trait PositionEstimator {
    /// Error raised when the estimate cannot be updated.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Updates the estimate if new measurements are due.
    fn refresh(&mut self) -> Result<(), Self::Error>;

    /// Updates the estimate unconditionally.
    fn force_refresh(&mut self) -> Result<(), Self::Error>;

    /// Field-frame position.
    fn position(&self) -> Vec2;

    /// Heading in radians, counter-clockwise. Need not be normalized.
    fn heading(&self) -> f64;

    /// Filtered field-frame velocity.
    fn velocity(&self) -> Vec2;

    /// Unfiltered field-frame velocity, used for stall detection.
    fn raw_velocity(&self) -> Vec2;

    /// Angular velocity in rad/s, counter-clockwise.
    fn angular_velocity(&self) -> f64;
}

/// The four drive motors.
pub trait WheelActuator {
    /// Error raised when a power command cannot be delivered.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sets the power of one motor, nominally in `[-1, 1]`.
    fn set_power(&mut self, wheel: Wheel, power: f64) -> Result<(), Self::Error>;

    /// Sends all four powers in [`Wheel::ALL`] order.
    fn apply(&mut self, powers: WheelPowers) -> Result<(), Self::Error> {
        for wheel in Wheel::ALL {
            self.set_power(wheel, powers.get(wheel))?;
        }
        Ok(())
    }
}

impl<T: PositionEstimator + ?Sized> PositionEstimator for &mut T {
    type Error = T::Error;

    fn refresh(&mut self) -> Result<(), Self::Error> {
        (**self).refresh()
    }

    fn force_refresh(&mut self) -> Result<(), Self::Error> {
        (**self).force_refresh()
    }

    fn position(&self) -> Vec2 {
        (**self).position()
    }

    fn heading(&self) -> f64 {
        (**self).heading()
    }

    fn velocity(&self) -> Vec2 {
        (**self).velocity()
    }

    fn raw_velocity(&self) -> Vec2 {
        (**self).raw_velocity()
    }

    fn angular_velocity(&self) -> f64 {
        (**self).angular_velocity()
    }
}

impl<T: WheelActuator + ?Sized> WheelActuator for &mut T {
    type Error = T::Error;

    fn set_power(&mut self, wheel: Wheel, power: f64) -> Result<(), Self::Error> {
        (**self).set_power(wheel, power)
    }

    fn apply(&mut self, powers: WheelPowers) -> Result<(), Self::Error> {
        (**self).apply(powers)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted estimator and recording actuator shared by the unit tests.

    use std::convert::Infallible;

    use super::*;

    #[derive(Debug, Default, Clone)]
    pub struct MockEstimator {
        pub position: Vec2,
        pub heading: f64,
        pub velocity: Vec2,
        pub raw_velocity: Vec2,
        pub angular_velocity: f64,
        pub refreshes: usize,
        pub force_refreshes: usize,
        /// Forced refreshes past this count fail.
        pub fail_after: Option<usize>,
    }

    impl MockEstimator {
        pub fn at(x: f64, y: f64, heading: f64) -> Self {
            MockEstimator {
                position: Vec2::new(x, y),
                heading,
                ..Default::default()
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("position fix lost")]
    pub struct Lost;

    impl PositionEstimator for MockEstimator {
        type Error = Lost;

        fn refresh(&mut self) -> Result<(), Lost> {
            self.refreshes += 1;
            Ok(())
        }

        fn force_refresh(&mut self) -> Result<(), Lost> {
            self.force_refreshes += 1;
            match self.fail_after {
                Some(limit) if self.force_refreshes > limit => Err(Lost),
                _ => Ok(()),
            }
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

    #[derive(Debug, Default, Clone)]
    pub struct MockMotors {
        pub last: WheelPowers,
        pub commands: usize,
    }

    impl WheelActuator for MockMotors {
        type Error = Infallible;

        fn set_power(&mut self, wheel: Wheel, power: f64) -> Result<(), Infallible> {
            match wheel {
                Wheel::LeftFront => {
                    self.commands += 1;
                    self.last.left_front = power;
                }
                Wheel::LeftRear => self.last.left_rear = power,
                Wheel::RightFront => self.last.right_front = power,
                Wheel::RightRear => self.last.right_rear = power,
            }
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("motor controller offline")]
    pub struct Offline;

    #[derive(Debug, Default)]
    pub struct FailingMotors;

    impl WheelActuator for FailingMotors {
        type Error = Offline;

        fn set_power(&mut self, _wheel: Wheel, _power: f64) -> Result<(), Offline> {
            Err(Offline)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn test_apply_sends_all_wheels() {
        let mut motors = MockMotors::default();
        let powers = WheelPowers::new(0.1, -0.2, 0.3, -0.4);
        motors.apply(powers).unwrap();
        assert_eq!(motors.last, powers);
        assert_eq!(motors.commands, 1);
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut estimator = MockEstimator::at(1.0, 2.0, 0.5);
        {
            let mut borrowed = &mut estimator;
            borrowed.refresh().unwrap();
            borrowed.force_refresh().unwrap();
            assert_eq!(borrowed.position(), Vec2::new(1.0, 2.0));
            assert_eq!(borrowed.heading(), 0.5);
        }
        assert_eq!(estimator.refreshes, 1);
        assert_eq!(estimator.force_refreshes, 1);
    }
}
