//! Definitions of important types used throughout the project

use std::f32::consts::{PI, TAU};
use std::ops::{Add, Sub};
use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A field relative position and heading
///
/// +X: Away from the alliance wall, +Y: Left (top view), heading is counter
/// clockwise from +X in radians
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    /// Meters
    pub translation: Vec2,
    /// Radians, wrapped to (-PI, PI]
    pub heading: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Pose {
            translation: Vec2::new(x, y),
            heading: wrap_angle(heading),
        }
    }

    /// Applies a robot relative transform to this pose
    pub fn transform_by(&self, transform: Transform) -> Pose {
        Pose {
            translation: self.translation + rotate(transform.translation, self.heading),
            heading: wrap_angle(self.heading + transform.rotation),
        }
    }

    pub fn distance(&self, other: Pose) -> f32 {
        self.translation.distance(other.translation)
    }

    /// Smallest signed heading error from `self` to `other`
    pub fn heading_error(&self, other: Pose) -> f32 {
        angle_difference(other.heading, self.heading)
    }
}

/// A rigid offset between two robot relative frames
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub translation: Vec2,
    /// Radians
    pub rotation: f32,
}

impl Transform {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Transform {
            translation: Vec2::new(x, y),
            rotation,
        }
    }

    pub fn inverse(&self) -> Transform {
        Transform {
            translation: rotate(-self.translation, -self.rotation),
            rotation: -self.rotation,
        }
    }
}

/// Field relative chassis velocity
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChassisVelocity {
    /// Meters per second
    pub linear: Vec2,
    /// Radians per second, counter clockwise positive
    pub angular: f32,
}

impl ChassisVelocity {
    pub fn speed(&self) -> f32 {
        self.linear.length()
    }
}

impl Add for ChassisVelocity {
    type Output = ChassisVelocity;

    fn add(self, rhs: Self) -> Self::Output {
        ChassisVelocity {
            linear: self.linear + rhs.linear,
            angular: self.angular + rhs.angular,
        }
    }
}

impl Sub for ChassisVelocity {
    type Output = ChassisVelocity;

    fn sub(self, rhs: Self) -> Self::Output {
        ChassisVelocity {
            linear: self.linear - rhs.linear,
            angular: self.angular - rhs.angular,
        }
    }
}

/// A single timestamped pose report from one estimation source
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoseObservation {
    pub pose: Pose,
    /// Time since robot start
    pub timestamp: Duration,
    /// Trust in this observation, (0, 1]
    pub confidence: f32,
}

/// Wraps an angle to (-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);

    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Smallest signed difference `a - b` between two angles
pub fn angle_difference(a: f32, b: f32) -> f32 {
    wrap_angle(a - b)
}

/// Rotates a vector counter clockwise
pub fn rotate(vec: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();

    Vec2::new(vec.x * cos - vec.y * sin, vec.x * sin + vec.y * cos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap() {
        assert!((wrap_angle(TAU + 0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-PI - 0.5) - (PI - 0.5)).abs() < 1e-5);
        assert!((angle_difference(0.1, -0.1) - 0.2).abs() < 1e-6);
        assert!((angle_difference(PI - 0.1, -PI + 0.1) - -0.2).abs() < 1e-5);
    }

    #[test]
    fn transform_round_trip() {
        let pose = Pose::new(2.0, -1.0, 0.7);
        let robot_to_quest = Transform::new(0.3, 0.1, 0.2);

        let quest = pose.transform_by(robot_to_quest);
        let back = quest.transform_by(robot_to_quest.inverse());

        assert!(back.distance(pose) < 1e-5);
        assert!(back.heading_error(pose).abs() < 1e-5);
    }
}
