//! Algae ground intake: a deployable arm with intake rollers

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{BoxedCommand, FunctionalCommand};
use crate::resources::Resources;

/// Arm travel speed in simulation, fraction of full range per second
const SIM_ARM_SPEED: f32 = 2.0;
const ARM_TOLERANCE: f32 = 0.02;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeArmState {
    Extended,
    Retracted,
}

impl IntakeArmState {
    fn setpoint(&self) -> f32 {
        match self {
            IntakeArmState::Extended => 1.0,
            IntakeArmState::Retracted => 0.0,
        }
    }
}

pub trait AlgaeIntake {
    fn set_arm_state(&mut self, state: IntakeArmState);
    fn is_arm_at_state(&self, state: IntakeArmState) -> bool;
    fn set_rollers_voltage(&mut self, volts: f32);
    fn rollers_voltage(&self) -> f32;
    fn periodic(&mut self, dt: Duration);
}

pub type SharedAlgaeIntake = Arc<Mutex<dyn AlgaeIntake>>;

pub struct SimAlgaeIntake {
    arm_position: f32,
    arm_target: IntakeArmState,
    rollers_voltage: f32,
}

impl SimAlgaeIntake {
    pub fn new() -> Self {
        SimAlgaeIntake {
            arm_position: 0.0,
            arm_target: IntakeArmState::Retracted,
            rollers_voltage: 0.0,
        }
    }
}

impl Default for SimAlgaeIntake {
    fn default() -> Self {
        Self::new()
    }
}

impl AlgaeIntake for SimAlgaeIntake {
    fn set_arm_state(&mut self, state: IntakeArmState) {
        self.arm_target = state;
    }

    fn is_arm_at_state(&self, state: IntakeArmState) -> bool {
        (self.arm_position - state.setpoint()).abs() <= ARM_TOLERANCE
    }

    fn set_rollers_voltage(&mut self, volts: f32) {
        self.rollers_voltage = volts;
    }

    fn rollers_voltage(&self) -> f32 {
        self.rollers_voltage
    }

    fn periodic(&mut self, dt: Duration) {
        let step = SIM_ARM_SPEED * dt.as_secs_f32();
        let error = self.arm_target.setpoint() - self.arm_position;

        self.arm_position += error.clamp(-step, step);
    }
}

/// Deploys or stows the arm, finished once it arrives
pub fn set_state(intake: &SharedAlgaeIntake, state: IntakeArmState) -> BoxedCommand {
    let (init_intake, done_intake) = (intake.clone(), intake.clone());

    Box::new(FunctionalCommand::new(
        "intake_arm_to_state",
        Resources::ALGAE_INTAKE,
        move || {
            init_intake.lock().expect("Lock").set_arm_state(state);
            Ok(())
        },
        || Ok(()),
        |_interrupted| {},
        move || Ok(done_intake.lock().expect("Lock").is_arm_at_state(state)),
    ))
}

/// Spins the rollers until interrupted, then stops them
pub fn run_rollers(intake: &SharedAlgaeIntake, volts: f32) -> BoxedCommand {
    let (init_intake, end_intake) = (intake.clone(), intake.clone());

    Box::new(FunctionalCommand::new(
        "intake_rollers",
        Resources::ALGAE_INTAKE,
        move || {
            init_intake.lock().expect("Lock").set_rollers_voltage(volts);
            Ok(())
        },
        || Ok(()),
        move |_interrupted| end_intake.lock().expect("Lock").set_rollers_voltage(0.0),
        || Ok(false),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_travels_between_states() {
        let mut intake = SimAlgaeIntake::new();
        assert!(intake.is_arm_at_state(IntakeArmState::Retracted));

        intake.set_arm_state(IntakeArmState::Extended);
        for _ in 0..50 {
            intake.periodic(Duration::from_millis(20));
        }

        assert!(intake.is_arm_at_state(IntakeArmState::Extended));
    }
}
