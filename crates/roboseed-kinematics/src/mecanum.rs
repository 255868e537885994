//! Four-wheel mecanum power mixing.
//!
//! Power terms are body-frame: `+y` drives forward, `+x` strafes right and a
//! positive `rotation` term turns the chassis clockwise seen from above.

use core::fmt;

use libm::fabs;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::KinematicsError;

/// Body-frame power request, each term nominally in `[-1, 1]`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisPower {
    /// Strafe power, positive to the right.
    pub x: f64,
    /// Forward power.
    pub y: f64,
    /// Rotational power.
    pub rotation: f64,
}

impl ChassisPower {
    /// Construct a chassis power request.
    pub const fn new(x: f64, y: f64, rotation: f64) -> Self {
        ChassisPower { x, y, rotation }
    }
}

impl fmt::Display for ChassisPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.3}, y: {:.3}, r: {:.3})", self.x, self.y, self.rotation)
    }
}

/// Identifies one of the four drive wheels.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    /// Front wheel on the left side.
    LeftFront,
    /// Rear wheel on the left side.
    LeftRear,
    /// Front wheel on the right side.
    RightFront,
    /// Rear wheel on the right side.
    RightRear,
}

impl Wheel {
    /// All wheels in the order commands are issued.
    pub const ALL: [Wheel; 4] = [
        Wheel::LeftFront,
        Wheel::LeftRear,
        Wheel::RightFront,
        Wheel::RightRear,
    ];
}

/// Per-wheel motor power commands.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelPowers {
    /// Left front motor power.
    pub left_front: f64,
    /// Left rear motor power.
    pub left_rear: f64,
    /// Right front motor power.
    pub right_front: f64,
    /// Right rear motor power.
    pub right_rear: f64,
}

impl WheelPowers {
    /// Construct wheel powers.
    pub const fn new(left_front: f64, left_rear: f64, right_front: f64, right_rear: f64) -> Self {
        WheelPowers {
            left_front,
            left_rear,
            right_front,
            right_rear,
        }
    }

    /// Power command for a single wheel.
    pub const fn get(&self, wheel: Wheel) -> f64 {
        match wheel {
            Wheel::LeftFront => self.left_front,
            Wheel::LeftRear => self.left_rear,
            Wheel::RightFront => self.right_front,
            Wheel::RightRear => self.right_rear,
        }
    }

    /// Largest magnitude across the four wheels.
    pub fn max_magnitude(&self) -> f64 {
        Wheel::ALL
            .iter()
            .map(|w| fabs(self.get(*w)))
            .fold(0.0, f64::max)
    }

    /// Scales all four powers uniformly so that none exceeds `max` in magnitude.
    ///
    /// Powers already within the limit are returned unchanged. Uniform scaling
    /// keeps the direction of travel and the ratio of translation to rotation.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidPowerLimit)` if `max` is not positive.
    pub fn desaturate(self, max: f64) -> Result<Self, KinematicsError> {
        if !(max > 0.0) {
            return Err(KinematicsError::InvalidPowerLimit("must be positive"));
        }

        let largest = self.max_magnitude();
        if largest <= max {
            return Ok(self);
        }

        let scale = max / largest;
        Ok(WheelPowers {
            left_front: self.left_front * scale,
            left_rear: self.left_rear * scale,
            right_front: self.right_front * scale,
            right_rear: self.right_rear * scale,
        })
    }
}

impl fmt::Display for WheelPowers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(LF: {:.3}, LR: {:.3}, RF: {:.3}, RR: {:.3})",
            self.left_front, self.left_rear, self.right_front, self.right_rear
        )
    }
}

/// Mixes body-frame power terms into wheel powers. This is the inverse kinematics step.
///
/// ```text
/// LF = y + r + x    LR = y + r - x
/// RF = y - r - x    RR = y - r + x
/// ```
///
/// The sums are not clamped; combined requests may exceed `[-1, 1]`.
pub fn mix(power: ChassisPower) -> WheelPowers {
    let ChassisPower { x, y, rotation } = power;
    WheelPowers {
        left_front: y + rotation + x,
        left_rear: y + rotation - x,
        right_front: y - rotation - x,
        right_rear: y - rotation + x,
    }
}

/// Recovers the body-frame power terms from wheel powers. This is the forward
/// kinematics step and the exact inverse of [`mix`].
pub fn unmix(wheels: WheelPowers) -> ChassisPower {
    let WheelPowers {
        left_front,
        left_rear,
        right_front,
        right_rear,
    } = wheels;
    ChassisPower {
        x: (left_front - left_rear - right_front + right_rear) / 4.0,
        y: (left_front + left_rear + right_front + right_rear) / 4.0,
        rotation: (left_front + left_rear - right_front - right_rear) / 4.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_mix_forward() {
        let wheels = mix(ChassisPower::new(0.0, 0.5, 0.0));
        assert_eq!(wheels, WheelPowers::new(0.5, 0.5, 0.5, 0.5));
    }

    #[test]
    fn test_mix_strafe_right() {
        // left front and right rear spin forward, the diagonal pair spins back
        let wheels = mix(ChassisPower::new(0.4, 0.0, 0.0));
        assert_eq!(wheels, WheelPowers::new(0.4, -0.4, -0.4, 0.4));
    }

    #[test]
    fn test_mix_rotation() {
        let wheels = mix(ChassisPower::new(0.0, 0.0, 0.3));
        assert_eq!(wheels, WheelPowers::new(0.3, 0.3, -0.3, -0.3));
    }

    #[test]
    fn test_mix_is_not_clamped() {
        let wheels = mix(ChassisPower::new(0.5, 0.5, 0.5));
        assert!((wheels.left_front - 1.5).abs() < EPSILON);
        assert!((wheels.max_magnitude() - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_unmix_recovers_terms() {
        let power = ChassisPower::new(0.2, -0.35, 0.1);
        let recovered = unmix(mix(power));
        assert!((recovered.x - power.x).abs() < EPSILON);
        assert!((recovered.y - power.y).abs() < EPSILON);
        assert!((recovered.rotation - power.rotation).abs() < EPSILON);
    }

    #[test]
    fn test_desaturate_scales_uniformly() {
        let wheels = WheelPowers::new(1.5, -0.5, 0.75, 0.0).desaturate(1.0).unwrap();
        assert!((wheels.left_front - 1.0).abs() < EPSILON);
        assert!((wheels.left_rear + 1.0 / 3.0).abs() < EPSILON);
        assert!((wheels.right_front - 0.5).abs() < EPSILON);
        assert!(wheels.right_rear.abs() < EPSILON);
    }

    #[test]
    fn test_desaturate_within_limit_is_unchanged() {
        let wheels = WheelPowers::new(0.5, -0.2, 0.9, -1.0);
        assert_eq!(wheels.desaturate(1.0).unwrap(), wheels);
    }

    #[test]
    fn test_desaturate_invalid_limit() {
        let result = WheelPowers::default().desaturate(0.0);
        assert!(matches!(result, Err(KinematicsError::InvalidPowerLimit("must be positive"))));
        let result_nan = WheelPowers::default().desaturate(f64::NAN);
        assert!(matches!(result_nan, Err(KinematicsError::InvalidPowerLimit(_))));
    }

    #[test]
    fn test_get_by_wheel() {
        let wheels = WheelPowers::new(0.1, 0.2, 0.3, 0.4);
        let collected: [f64; 4] = Wheel::ALL.map(|w| wheels.get(w));
        assert_eq!(collected, [0.1, 0.2, 0.3, 0.4]);
    }
}
