//! External pathfinder collaborator interface
//!
//! The real path planning library is out of scope; the core only depends on
//! the capability of turning a target pose into a command. A failure to
//! produce a path surfaces as a command that ends interrupted on its first
//! tick, with no retry from the core.

use std::f32::consts::PI;
use std::time::Instant;

use anyhow::{bail, Error, Result};
use common::types::Pose;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::command::{BoxedCommand, Command};
use crate::pose::SharedPoseEstimator;
use crate::subsystems::swerve::{self, SharedSwerve};

/// Arrival tolerances for pathfinding commands
const PATHFIND_DISTANCE_TOLERANCE: f32 = 0.05;
const PATHFIND_ANGLE_TOLERANCE: f32 = 2.0 * PI / 180.0;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConstraints {
    pub max_velocity: f32,
    pub max_acceleration: f32,
    pub max_angular_velocity: f32,
    pub max_angular_acceleration: f32,
}

pub const DEFAULT_CONSTRAINTS: PathConstraints = PathConstraints {
    max_velocity: 4.0,
    max_acceleration: 3.0,
    max_angular_velocity: 2.0 * PI,
    max_angular_acceleration: 2.0,
};

pub trait Pathfinder {
    fn pathfind_to_pose(&self, target: Pose, constraints: PathConstraints)
        -> Result<BoxedCommand>;
}

/// Straight line stand-in for the third party planner
pub struct DirectPathfinder {
    swerve: SharedSwerve,
    estimator: SharedPoseEstimator,
}

impl DirectPathfinder {
    pub fn new(swerve: SharedSwerve, estimator: SharedPoseEstimator) -> Self {
        DirectPathfinder { swerve, estimator }
    }
}

impl Pathfinder for DirectPathfinder {
    fn pathfind_to_pose(
        &self,
        target: Pose,
        constraints: PathConstraints,
    ) -> Result<BoxedCommand> {
        if !target.translation.is_finite() || !target.heading.is_finite() {
            bail!("target pose is not finite: {target:?}");
        }
        if constraints.max_velocity <= 0.0 || constraints.max_acceleration <= 0.0 {
            bail!("degenerate path constraints: {constraints:?}");
        }

        Ok(swerve::go_to_pose_trapezoidal(
            &self.swerve,
            &self.estimator,
            target,
            PATHFIND_DISTANCE_TOLERANCE,
            PATHFIND_ANGLE_TOLERANCE,
        ))
    }
}

/// Wraps a pathfinder query, degrading a planning failure into a command
/// that ends interrupted immediately
pub fn pathfind_to_pose(
    pathfinder: &dyn Pathfinder,
    target: Pose,
    constraints: PathConstraints,
) -> BoxedCommand {
    match pathfinder.pathfind_to_pose(target, constraints) {
        Ok(command) => command,
        Err(err) => {
            warn!("Pathfinding failed: {err:?}");
            Box::new(FailedCommand { error: Some(err) })
        }
    }
}

/// Ends interrupted on its first tick by failing its own init
struct FailedCommand {
    error: Option<Error>,
}

impl Command for FailedCommand {
    fn name(&self) -> &str {
        "pathfind_failed"
    }

    fn init(&mut self, _now: Instant) -> Result<()> {
        Err(self
            .error
            .take()
            .unwrap_or_else(|| Error::msg("pathfinding failed")))
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, RwLock};
    use std::time::Duration;

    use super::*;
    use crate::pose::PoseEstimator;
    use crate::resources::Resources;
    use crate::scheduler::Scheduler;
    use crate::subsystems::swerve::SimSwerve;

    #[test]
    fn degenerate_requests_surface_as_interrupted_commands() {
        let swerve: SharedSwerve = Arc::new(Mutex::new(SimSwerve::new(Duration::from_millis(20))));
        let estimator: SharedPoseEstimator = Arc::new(RwLock::new(PoseEstimator::new(Vec::new())));
        let pathfinder = DirectPathfinder::new(swerve, estimator);

        let bad = PathConstraints {
            max_velocity: 0.0,
            ..DEFAULT_CONSTRAINTS
        };
        let command = pathfind_to_pose(&pathfinder, Pose::default(), bad);

        // Init fails, so the scheduler never admits it
        let mut scheduler = Scheduler::new();
        scheduler.schedule(command, Instant::now());
        assert_eq!(scheduler.running_len(), 0);
        assert_eq!(scheduler.claimed(), Resources::empty());
    }

    #[test]
    fn valid_requests_claim_the_drivetrain() {
        let swerve: SharedSwerve = Arc::new(Mutex::new(SimSwerve::new(Duration::from_millis(20))));
        let estimator: SharedPoseEstimator = Arc::new(RwLock::new(PoseEstimator::new(Vec::new())));
        let pathfinder = DirectPathfinder::new(swerve, estimator);

        let command = pathfind_to_pose(&pathfinder, Pose::new(1.0, 0.0, 0.0), DEFAULT_CONSTRAINTS);
        assert_eq!(command.requirements(), Resources::DRIVETRAIN);
    }
}
