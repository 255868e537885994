//! Error types for the chassis controller.

use roboseed_kinematics::KinematicsError;
use thiserror::Error;

/// Boxed error from an estimator or actuator implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Chassis controller error type.
///
/// A stalled or cancelled goal seek is not an error; see [`crate::SeekOutcome`].
#[derive(Error, Debug)]
pub enum ControlError {
    /// The position estimator failed to refresh.
    #[error("Estimator error: {0}")]
    Estimator(#[source] BoxError),

    /// A motor power command could not be delivered.
    #[error("Actuator error: {0}")]
    Actuator(#[source] BoxError),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A kinematic calculation was given bad input.
    #[error("Kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),
}

impl ControlError {
    pub(crate) fn estimator<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ControlError::Estimator(Box::new(e))
    }

    pub(crate) fn actuator<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ControlError::Actuator(Box::new(e))
    }
}

/// Result alias used throughout the controller.
pub type Result<T> = std::result::Result<T, ControlError>;
