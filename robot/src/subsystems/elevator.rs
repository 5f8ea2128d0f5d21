//! Elevator lift capability and simulation

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{BoxedCommand, FunctionalCommand};
use crate::resources::Resources;

/// Meters per second the carriage can slew in simulation
const SIM_MAX_VELOCITY: f32 = 1.5;
const HEIGHT_TOLERANCE: f32 = 0.02;

/// Named carriage setpoints
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElevatorHeight {
    L1,
    L2,
    L3,
    Feeder,
    Climb,
}

impl ElevatorHeight {
    /// Carriage height above the stow hardstop
    pub fn meters(&self) -> f32 {
        match self {
            ElevatorHeight::L1 => 0.05,
            ElevatorHeight::L2 => 0.6,
            ElevatorHeight::L3 => 2.1,
            ElevatorHeight::Feeder => 0.05,
            ElevatorHeight::Climb => -0.1,
        }
    }
}

/// Height settable mechanism capability
pub trait Elevator {
    fn set_target_height(&mut self, height: ElevatorHeight);
    fn is_at_target_position(&self) -> bool;
    fn current_height(&self) -> f32;
    fn periodic(&mut self, dt: Duration);
}

pub type SharedElevator = Arc<Mutex<dyn Elevator>>;

pub struct SimElevator {
    height: f32,
    target: ElevatorHeight,
}

impl SimElevator {
    pub fn new() -> Self {
        SimElevator {
            height: ElevatorHeight::L1.meters(),
            target: ElevatorHeight::L1,
        }
    }
}

impl Default for SimElevator {
    fn default() -> Self {
        Self::new()
    }
}

impl Elevator for SimElevator {
    fn set_target_height(&mut self, height: ElevatorHeight) {
        self.target = height;
    }

    fn is_at_target_position(&self) -> bool {
        (self.height - self.target.meters()).abs() <= HEIGHT_TOLERANCE
    }

    fn current_height(&self) -> f32 {
        self.height
    }

    fn periodic(&mut self, dt: Duration) {
        let step = SIM_MAX_VELOCITY * dt.as_secs_f32();
        let error = self.target.meters() - self.height;

        self.height += error.clamp(-step, step);
    }
}

/// Moves the carriage to a named height, finished once it arrives
pub fn set_target_height(elevator: &SharedElevator, height: ElevatorHeight) -> BoxedCommand {
    let (init_elevator, done_elevator) = (elevator.clone(), elevator.clone());

    Box::new(FunctionalCommand::new(
        "elevator_to_height",
        Resources::ELEVATOR,
        move || {
            init_elevator
                .lock()
                .expect("Lock")
                .set_target_height(height);
            Ok(())
        },
        || Ok(()),
        |_interrupted| {},
        move || Ok(done_elevator.lock().expect("Lock").is_at_target_position()),
    ))
}
