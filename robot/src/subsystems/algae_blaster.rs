//! Algae blaster: a swinging arm that knocks algae off the reef

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{BoxedCommand, FunctionalCommand};
use crate::resources::Resources;

/// Arm travel speed in simulation, fraction of full range per second
const SIM_ARM_SPEED: f32 = 4.0;
const ARM_TOLERANCE: f32 = 0.02;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlasterArmState {
    HorizontalOut,
    HorizontalIn,
}

impl BlasterArmState {
    fn setpoint(&self) -> f32 {
        match self {
            BlasterArmState::HorizontalOut => 1.0,
            BlasterArmState::HorizontalIn => 0.0,
        }
    }
}

pub trait AlgaeBlaster {
    fn set_arm_state(&mut self, state: BlasterArmState);
    fn is_arm_at_state(&self, state: BlasterArmState) -> bool;
    fn periodic(&mut self, dt: Duration);
}

pub type SharedAlgaeBlaster = Arc<Mutex<dyn AlgaeBlaster>>;

pub struct SimAlgaeBlaster {
    arm_position: f32,
    arm_target: BlasterArmState,
}

impl SimAlgaeBlaster {
    pub fn new() -> Self {
        SimAlgaeBlaster {
            arm_position: 0.0,
            arm_target: BlasterArmState::HorizontalIn,
        }
    }
}

impl Default for SimAlgaeBlaster {
    fn default() -> Self {
        Self::new()
    }
}

impl AlgaeBlaster for SimAlgaeBlaster {
    fn set_arm_state(&mut self, state: BlasterArmState) {
        self.arm_target = state;
    }

    fn is_arm_at_state(&self, state: BlasterArmState) -> bool {
        (self.arm_position - state.setpoint()).abs() <= ARM_TOLERANCE
    }

    fn periodic(&mut self, dt: Duration) {
        let step = SIM_ARM_SPEED * dt.as_secs_f32();
        let error = self.arm_target.setpoint() - self.arm_position;

        self.arm_position += error.clamp(-step, step);
    }
}

/// Swings the blaster arm to a state, finished once it arrives
pub fn set_arm_state(blaster: &SharedAlgaeBlaster, state: BlasterArmState) -> BoxedCommand {
    let (init_blaster, done_blaster) = (blaster.clone(), blaster.clone());

    Box::new(FunctionalCommand::new(
        "blaster_arm_to_state",
        Resources::ALGAE_BLASTER,
        move || {
            init_blaster.lock().expect("Lock").set_arm_state(state);
            Ok(())
        },
        || Ok(()),
        |_interrupted| {},
        move || Ok(done_blaster.lock().expect("Lock").is_arm_at_state(state)),
    ))
}
