//! Field geometry the routines navigate against

use std::f32::consts::PI;

use common::types::Pose;
use glam::Vec2;

use crate::subsystems::elevator::ElevatorHeight;

const REEF_CENTER: Vec2 = Vec2::new(4.49, 4.03);
/// Distance from reef center to the robot bumper line when scoring
const REEF_APPROACH_RADIUS: f32 = 1.3;

/// The six faces of the reef, counter clockwise from the alliance wall side
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReefFace {
    AB,
    CD,
    EF,
    GH,
    IJ,
    KL,
}

impl ReefFace {
    pub const ALL: [ReefFace; 6] = [
        ReefFace::AB,
        ReefFace::CD,
        ReefFace::EF,
        ReefFace::GH,
        ReefFace::IJ,
        ReefFace::KL,
    ];

    /// Algae sits high on alternating faces
    pub fn algae_height(&self) -> ElevatorHeight {
        if (*self as usize) % 2 == 0 {
            ElevatorHeight::L2
        } else {
            ElevatorHeight::L1
        }
    }

    /// Robot pose that squares the bumpers up against this face
    pub fn approach_pose(&self) -> Pose {
        let angle = PI + (*self as usize as f32) * PI / 3.0;
        let translation = REEF_CENTER + Vec2::new(angle.cos(), angle.sin()) * REEF_APPROACH_RADIUS;

        // Face the reef center
        Pose {
            translation,
            heading: common::types::wrap_angle(angle + PI),
        }
    }
}
