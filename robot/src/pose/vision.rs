//! Vision tag detections as a pose source

use std::time::Duration;

use common::types::{Pose, PoseObservation};
use crossbeam::channel::Receiver;

use crate::pose::PoseSource;

/// Never trust a single tag detection more than this
const MAX_VISION_CONFIDENCE: f32 = 0.6;
/// Confidence falloff per meter of reported standard deviation
const STD_DEV_FALLOFF: f32 = 20.0;

/// One tag solve from the vision coprocessor
#[derive(Debug, Copy, Clone)]
pub struct VisionFrame {
    pub pose: Pose,
    pub timestamp: Duration,
    /// Estimated translational standard deviation of the solve, meters
    pub std_dev: f32,
}

/// Irregular, low rate detections delivered over a channel
pub struct VisionSource {
    frames: Receiver<VisionFrame>,
}

impl VisionSource {
    pub fn new(frames: Receiver<VisionFrame>) -> Self {
        VisionSource { frames }
    }
}

impl PoseSource for VisionSource {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn poll(&mut self) -> Vec<PoseObservation> {
        self.frames
            .try_iter()
            .map(|frame| PoseObservation {
                pose: frame.pose,
                timestamp: frame.timestamp,
                confidence: (MAX_VISION_CONFIDENCE / (1.0 + frame.std_dev * STD_DEV_FALLOFF))
                    .min(MAX_VISION_CONFIDENCE),
            })
            .collect()
    }
}
