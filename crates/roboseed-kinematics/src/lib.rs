#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for four-wheel mecanum chassis kinematics."]
#![doc = ""]
#![doc = "This crate provides field and body frame types, wraparound-safe heading arithmetic,"]
#![doc = "and the mecanum mix that turns body-frame power terms into wheel commands."]

use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};
use libm::{cos, sin, sqrt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod angle;
pub mod error;
pub mod mecanum;

pub use angle::{angular_midpoint, normalize_angle, signed_angular_difference};
pub use error::KinematicsError;
pub use mecanum::{ChassisPower, Wheel, WheelPowers, mix, unmix};

/// A 2‑D vector. Depending on context it is a field-frame position, a
/// field-frame velocity or a body-frame error.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    /// Construct a new vector.
    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Squared euclidean length.
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        sqrt(self.length_squared())
    }

    /// Sum of the absolute components.
    pub fn manhattan(self) -> f64 {
        libm::fabs(self.x) + libm::fabs(self.y)
    }

    /// Rotates a field-frame vector into the body frame of a robot facing `heading`.
    ///
    /// ```text
    /// body.x =  field.x * cos(h) + field.y * sin(h)
    /// body.y = -field.x * sin(h) + field.y * cos(h)
    /// ```
    ///
    /// # Arguments
    ///
    /// * `heading`: Robot heading in radians, counter-clockwise in the field frame.
    pub fn field_to_body(self, heading: f64) -> Vec2 {
        let (s, c) = (sin(heading), cos(heading));
        Vec2 {
            x: self.x * c + self.y * s,
            y: -self.x * s + self.y * c,
        }
    }

    /// Rotates a body-frame vector back into the field frame. Inverse of
    /// [`Vec2::field_to_body`].
    pub fn body_to_field(self, heading: f64) -> Vec2 {
        let (s, c) = (sin(heading), cos(heading));
        Vec2 {
            x: self.x * c - self.y * s,
            y: self.x * s + self.y * c,
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// A field-frame pose: position in estimator length units and heading in radians.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldPose {
    /// Field-frame position.
    pub position: Vec2,
    /// Heading (rad), normalized to `[0, 2π)`.
    pub heading: f64,
}

impl FieldPose {
    /// Construct a new pose. The heading is normalized.
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        FieldPose {
            position: Vec2::new(x, y),
            heading: normalize_angle(heading),
        }
    }

    /// Advances the pose by a body-frame velocity and a yaw rate held constant over `dt`.
    ///
    /// The translation is rotated into the field frame using the starting heading.
    /// The final heading is normalized to `[0, 2π)`.
    ///
    /// # Arguments
    ///
    /// * `body_velocity`: Velocity in the robot's body frame (units/s).
    /// * `yaw_rate`: Counter-clockwise angular velocity (rad/s).
    /// * `dt`: The time delta in seconds over which the speeds are applied.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    /// Returns `Err(KinematicsError::NonFinite)` if `dt` is NaN or infinite.
    pub fn integrate(
        &self,
        body_velocity: Vec2,
        yaw_rate: f64,
        dt: f64,
    ) -> Result<FieldPose, KinematicsError> {
        if !dt.is_finite() {
            return Err(KinematicsError::NonFinite("time delta must be finite"));
        }
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }

        let delta = body_velocity.body_to_field(self.heading) * dt;

        Ok(FieldPose {
            position: self.position + delta,
            heading: normalize_angle(self.heading + yaw_rate * dt),
        })
    }
}

impl fmt::Display for FieldPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x: {:.1}, y: {:.1}, θ: {:.3} rad)",
            self.position.x, self.position.y, self.heading
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};
    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_field_to_body_identity_heading() {
        // error purely along the body forward axis stays unchanged at heading 0
        let error = Vec2::new(0.0, 1000.0);
        let body = error.field_to_body(0.0);
        assert!((body.x - 0.0).abs() < EPSILON);
        assert!((body.y - 1000.0).abs() < EPSILON);
    }

    #[test]
    fn test_field_to_body_quarter_turn() {
        // turned 90deg counter-clockwise the robot faces field -x, so field +x is behind it
        let body = Vec2::new(100.0, 0.0).field_to_body(FRAC_PI_2);
        assert!((body.x - 0.0).abs() < EPSILON);
        assert!((body.y + 100.0).abs() < EPSILON);

        let body = Vec2::new(0.0, 100.0).field_to_body(FRAC_PI_2);
        assert!((body.x - 100.0).abs() < EPSILON);
        assert!((body.y - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_body_to_field_inverts_field_to_body() {
        let v = Vec2::new(-320.0, 45.5);
        for heading in [0.0, 0.3, FRAC_PI_2, PI, 4.0] {
            let back = v.field_to_body(heading).body_to_field(heading);
            assert!((back.x - v.x).abs() < EPSILON);
            assert!((back.y - v.y).abs() < EPSILON);
        }
    }

    #[test]
    fn test_vector_ops() {
        let a = Vec2::new(3.0, 4.0);
        let b = Vec2::new(1.0, -2.0);
        assert_eq!(a + b, Vec2::new(4.0, 2.0));
        assert_eq!(a - b, Vec2::new(2.0, 6.0));
        assert_eq!(a * 2.0, Vec2::new(6.0, 8.0));
        assert_eq!(-a, Vec2::new(-3.0, -4.0));
        assert!((a.length() - 5.0).abs() < EPSILON);
        assert!((a.length_squared() - 25.0).abs() < EPSILON);
        assert!((b.manhattan() - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_pose_new_normalizes_heading() {
        let pose = FieldPose::new(1.0, 2.0, -FRAC_PI_2);
        assert!((pose.heading - 1.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_forward() {
        let pose = FieldPose::new(0.0, 0.0, 0.0);
        let next = pose.integrate(Vec2::new(0.0, 500.0), 0.0, 2.0).unwrap();
        assert!((next.position.x - 0.0).abs() < EPSILON);
        assert!((next.position.y - 1000.0).abs() < EPSILON);
        assert!((next.heading - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_turned_strafe() {
        // body +x maps to (cos h, sin h), which is field +y at 90deg
        let pose = FieldPose::new(0.0, 0.0, FRAC_PI_2);
        let next = pose.integrate(Vec2::new(100.0, 0.0), 0.0, 1.0).unwrap();
        assert!((next.position.x - 0.0).abs() < EPSILON);
        assert!((next.position.y - 100.0).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_rotation_wraps() {
        let pose = FieldPose::new(0.0, 0.0, 0.1);
        let next = pose.integrate(Vec2::ZERO, -1.0, 0.2).unwrap();
        assert!((next.heading - (2.0 * PI - 0.1)).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_negative_dt() {
        let pose = FieldPose::default();
        let result = pose.integrate(Vec2::ZERO, 0.0, -0.1);
        assert!(matches!(result, Err(KinematicsError::NegativeTimeDelta("must be non-negative"))));
        let result_nan = pose.integrate(Vec2::ZERO, 0.0, f64::NAN);
        assert!(matches!(result_nan, Err(KinematicsError::NonFinite(_))));
    }
}
