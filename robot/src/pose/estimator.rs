//! Fusion of odometry, vision and headset tracker observations

use std::time::Duration;

use common::types::{angle_difference, wrap_angle, ChassisVelocity, Pose, PoseObservation};
use fxhash::FxHashMap;
use tracing::debug;

use crate::pose::PoseSource;

/// How quickly trust in an observation falls off with robot speed, per m/s
const SPEED_TRUST_FALLOFF: f32 = 0.5;

/// Running best estimate of the robot's field pose
///
/// Seeded by odometry integration every tick, corrected by whatever the
/// registered sources report. Observations that are not strictly newer than
/// the last fused observation from the same source are discarded, which makes
/// duplicate deliveries idempotent.
pub struct PoseEstimator {
    estimate: Pose,
    velocity: ChassisVelocity,
    sources: Vec<Box<dyn PoseSource>>,
    last_fused: FxHashMap<&'static str, Duration>,
}

impl PoseEstimator {
    pub fn new(sources: Vec<Box<dyn PoseSource>>) -> Self {
        PoseEstimator {
            estimate: Pose::default(),
            velocity: ChassisVelocity::default(),
            sources,
            last_fused: Default::default(),
        }
    }

    /// The estimate as of the last `update`
    ///
    /// Every command scheduled in a tick observes this same snapshot.
    pub fn current_pose(&self) -> Pose {
        self.estimate
    }

    /// Advances the estimate one tick: odometry first, then source fusion
    pub fn update(&mut self, velocity: ChassisVelocity, dt: Duration) {
        let dt = dt.as_secs_f32();

        self.velocity = velocity;
        self.estimate.translation += velocity.linear * dt;
        self.estimate.heading = wrap_angle(self.estimate.heading + velocity.angular * dt);

        let mut pending = Vec::new();
        for source in &mut self.sources {
            let name = source.name();
            pending.extend(source.poll().into_iter().map(|obs| (name, obs)));
        }

        for (source, observation) in pending {
            self.fuse(source, observation);
        }
    }

    fn fuse(&mut self, source: &'static str, observation: PoseObservation) {
        if let Some(&last) = self.last_fused.get(source) {
            if observation.timestamp <= last {
                debug!(source, "Discarding stale observation");
                return;
            }
        }

        // Weighted correction toward the observation. High speed means more
        // motion blur and worse latency alignment, so trust falls off with it.
        let alpha = (observation.confidence.clamp(0.0, 1.0)
            / (1.0 + SPEED_TRUST_FALLOFF * self.velocity.speed()))
        .min(1.0);

        self.estimate.translation = self
            .estimate
            .translation
            .lerp(observation.pose.translation, alpha);
        self.estimate.heading = wrap_angle(
            self.estimate.heading
                + angle_difference(observation.pose.heading, self.estimate.heading) * alpha,
        );

        self.last_fused.insert(source, observation.timestamp);
    }

    /// Forces the running estimate and re-seeds every source's own frame
    pub fn reset_pose(&mut self, pose: Pose) {
        self.estimate = pose;

        for source in &mut self.sources {
            source.handle_reset(pose);
        }
    }
}
