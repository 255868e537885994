#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur during frame transformations
//! and wheel power calculations.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for a non-positive output limit.
    /// This variant is returned when wheel powers are desaturated against a limit that is not positive.
    InvalidPowerLimit(&'static str),
    /// Error for negative time delta.
    /// This variant is returned when a negative time delta is used for pose updates.
    NegativeTimeDelta(&'static str),
    /// Error for a value that is NaN or infinite.
    /// This variant is returned when an input that must be finite is not.
    NonFinite(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidPowerLimit(msg) => write!(f, "Invalid power limit: {}", msg),
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
            KinematicsError::NonFinite(msg) => write!(f, "Non-finite value: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
