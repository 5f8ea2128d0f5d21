//! External 6-DOF headset tracker as a pose source
//!
//! The tracker reports poses in its own frame, offset from the robot by a
//! fixed robot-to-tracker transform. Resets must be pushed back into the
//! tracker so its internal frame stays aligned with the field.

use std::time::Duration;

use common::types::{Pose, PoseObservation, Transform};
use crossbeam::channel::{Receiver, Sender};
use tracing::warn;

use crate::pose::PoseSource;

/// Trust in a tracking headset observation
const QUEST_CONFIDENCE: f32 = 0.4;

/// One report from the tracker, in the tracker's frame
#[derive(Debug, Copy, Clone)]
pub struct QuestFrame {
    pub connected: bool,
    pub tracking: bool,
    pub battery_percent: f32,
    pub timestamp: Duration,
    pub quest_pose: Pose,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct QuestInputs {
    pub connected: bool,
    pub tracking: bool,
    pub battery_percent: f32,
    pub timestamp: Duration,
    pub quest_pose: Pose,
}

/// Transport to the tracker hardware, real or simulated, picked at
/// construction
pub trait QuestIo {
    /// Re-seeds the tracker's internal field pose (already in the tracker
    /// frame)
    fn set_field_pose(&mut self, quest_pose: Pose);

    fn update_inputs(&mut self, inputs: &mut QuestInputs);
}

/// Talks to the tracker over channels owned by a comms thread
pub struct QuestReal {
    frames: Receiver<QuestFrame>,
    resets: Sender<Pose>,
}

impl QuestReal {
    pub fn new(frames: Receiver<QuestFrame>, resets: Sender<Pose>) -> Self {
        QuestReal { frames, resets }
    }
}

impl QuestIo for QuestReal {
    fn set_field_pose(&mut self, quest_pose: Pose) {
        if self.resets.try_send(quest_pose).is_err() {
            warn!("Quest reset dropped, comms thread not keeping up");
        }
    }

    fn update_inputs(&mut self, inputs: &mut QuestInputs) {
        // Keep only the newest frame; an unchanged timestamp is deduplicated
        // downstream by the estimator
        while let Ok(frame) = self.frames.try_recv() {
            inputs.connected = frame.connected;
            inputs.tracking = frame.tracking;
            inputs.battery_percent = frame.battery_percent;
            inputs.timestamp = frame.timestamp;
            inputs.quest_pose = frame.quest_pose;
        }
    }
}

/// Fabricates tracker frames from the simulation's true pose
pub struct QuestSim {
    truth: Box<dyn FnMut() -> (Pose, Duration)>,
    robot_to_quest: Transform,
}

impl QuestSim {
    pub fn new(
        truth: impl FnMut() -> (Pose, Duration) + 'static,
        robot_to_quest: Transform,
    ) -> Self {
        QuestSim {
            truth: Box::new(truth),
            robot_to_quest,
        }
    }
}

impl QuestIo for QuestSim {
    fn set_field_pose(&mut self, _quest_pose: Pose) {
        // The sim reads the field-frame truth directly, nothing to re-seed
    }

    fn update_inputs(&mut self, inputs: &mut QuestInputs) {
        let (pose, timestamp) = (self.truth)();

        inputs.connected = true;
        inputs.tracking = true;
        inputs.battery_percent = 100.0;
        inputs.timestamp = timestamp;
        inputs.quest_pose = pose.transform_by(self.robot_to_quest);
    }
}

/// Adapts a [`QuestIo`] into the estimator's [`PoseSource`] contract
pub struct QuestSource {
    io: Box<dyn QuestIo>,
    robot_to_quest: Transform,
    inputs: QuestInputs,
}

impl QuestSource {
    pub fn new(io: Box<dyn QuestIo>, robot_to_quest: Transform) -> Self {
        QuestSource {
            io,
            robot_to_quest,
            inputs: QuestInputs::default(),
        }
    }
}

impl PoseSource for QuestSource {
    fn name(&self) -> &'static str {
        "quest"
    }

    fn poll(&mut self) -> Vec<PoseObservation> {
        self.io.update_inputs(&mut self.inputs);

        if !(self.inputs.connected && self.inputs.tracking) {
            return Vec::new();
        }

        vec![PoseObservation {
            pose: self
                .inputs
                .quest_pose
                .transform_by(self.robot_to_quest.inverse()),
            timestamp: self.inputs.timestamp,
            confidence: QUEST_CONFIDENCE,
        }]
    }

    fn handle_reset(&mut self, pose: Pose) {
        self.io.set_field_pose(pose.transform_by(self.robot_to_quest));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn sim_round_trips_the_tracker_transform() {
        let robot_to_quest = Transform::new(0.2, -0.1, 0.5);
        let truth = Pose::new(3.0, 1.0, 0.8);

        let io = QuestSim::new(move || (truth, Duration::from_secs(1)), robot_to_quest);
        let mut source = QuestSource::new(Box::new(io), robot_to_quest);

        let observations = source.poll();
        assert_eq!(observations.len(), 1);
        assert!(observations[0].pose.distance(truth) < 1e-5);
        assert!(observations[0].pose.heading_error(truth).abs() < 1e-5);
    }

    #[test]
    fn untracked_frames_are_withheld() {
        let (frame_tx, frame_rx) = crossbeam::channel::bounded(8);
        let (reset_tx, _reset_rx) = crossbeam::channel::bounded(8);

        let io = QuestReal::new(frame_rx, reset_tx);
        let mut source = QuestSource::new(Box::new(io), Transform::default());

        frame_tx
            .send(QuestFrame {
                connected: true,
                tracking: false,
                battery_percent: 80.0,
                timestamp: Duration::from_secs(1),
                quest_pose: Pose::new(1.0, 1.0, 0.0),
            })
            .unwrap();

        assert!(source.poll().is_empty());
    }

    #[test]
    fn reset_reaches_the_tracker_in_its_own_frame() {
        struct RecordingIo(Rc<RefCell<Vec<Pose>>>);

        impl QuestIo for RecordingIo {
            fn set_field_pose(&mut self, quest_pose: Pose) {
                self.0.borrow_mut().push(quest_pose);
            }

            fn update_inputs(&mut self, _inputs: &mut QuestInputs) {}
        }

        let seen: Rc<RefCell<Vec<Pose>>> = Default::default();
        let robot_to_quest = Transform::new(0.3, 0.0, 0.0);
        let mut source = QuestSource::new(Box::new(RecordingIo(seen.clone())), robot_to_quest);

        let field = Pose::new(1.0, 2.0, 0.0);
        source.handle_reset(field);

        let expected = field.transform_by(robot_to_quest);
        assert_eq!(*seen.borrow(), [expected]);
    }
}
