//! Pose estimation: one best estimate fused from several unreliable sources

pub mod estimator;
pub mod quest;
pub mod vision;

pub use estimator::PoseEstimator;

use std::sync::{Arc, RwLock};

use common::types::{Pose, PoseObservation};

/// Fused once per tick by the run loop, read by everything else
pub type SharedPoseEstimator = Arc<RwLock<PoseEstimator>>;

/// An asynchronous producer of field pose observations
///
/// Sources own whatever plumbing feeds them (channels, sim state); the
/// estimator only ever drains them once per tick. A source with nothing new,
/// or that is currently unhealthy, returns no observations and the running
/// estimate holds.
pub trait PoseSource {
    fn name(&self) -> &'static str;

    /// Drains every observation produced since the last call
    fn poll(&mut self) -> Vec<PoseObservation>;

    /// Propagates a forced field pose into the source's own frame
    fn handle_reset(&mut self, _pose: Pose) {}
}
