//! Composed routines built from the combinator primitives

use std::time::Duration;

use crate::command::combinators::{ConditionalGate, ParallelAll, Sequence, Timeout};
use crate::command::{BoxedCommand, WaitCommand};
use crate::field::ReefFace;
use crate::subsystems::algae_blaster::{self, BlasterArmState, SharedAlgaeBlaster};
use crate::subsystems::algae_intake::{self, IntakeArmState, SharedAlgaeIntake};
use crate::subsystems::elevator::{self, SharedElevator};

const INTAKE_EXTEND_TIMEOUT: Duration = Duration::from_secs(1);
const RELEASE_SPIT_TIME: Duration = Duration::from_millis(1200);
const RELEASE_ROLLERS_VOLTAGE: f32 = 6.0;
const BLASTER_SWING_DWELL: Duration = Duration::from_millis(400);

/// Deploys the intake arm (bounded in case it jams), then stows it with the
/// algae held
pub fn intake_algae(intake: &SharedAlgaeIntake) -> BoxedCommand {
    Box::new(Sequence::new(vec![
        Box::new(Timeout::new(
            algae_intake::set_state(intake, IntakeArmState::Extended),
            INTAKE_EXTEND_TIMEOUT,
        )),
        algae_intake::set_state(intake, IntakeArmState::Retracted),
    ]))
}

/// Stows the arm, then spits the algae out with the rollers
pub fn release_algae_from_intake(intake: &SharedAlgaeIntake) -> BoxedCommand {
    Box::new(Sequence::new(vec![
        algae_intake::set_state(intake, IntakeArmState::Retracted),
        Box::new(Timeout::new(
            algae_intake::run_rollers(intake, RELEASE_ROLLERS_VOLTAGE),
            RELEASE_SPIT_TIME,
        )),
    ]))
}

/// Raises the elevator to the face's algae height while swinging the blaster,
/// gated on the elevator already being at target
pub fn blast_algae_off_reef(
    face: ReefFace,
    elevator: &SharedElevator,
    blaster: &SharedAlgaeBlaster,
) -> BoxedCommand {
    let gate_elevator = elevator.clone();

    Box::new(ParallelAll::new(vec![
        elevator::set_target_height(elevator, face.algae_height()),
        Box::new(ConditionalGate::new(blast_algae_swing(blaster), move || {
            gate_elevator.lock().expect("Lock").is_at_target_position()
        })),
    ]))
}

/// Swings the blaster arm out, dwells, and pulls it back in
pub fn blast_algae_swing(blaster: &SharedAlgaeBlaster) -> BoxedCommand {
    Box::new(Sequence::new(vec![
        algae_blaster::set_arm_state(blaster, BlasterArmState::HorizontalOut),
        Box::new(WaitCommand::new(BLASTER_SWING_DWELL)),
        algae_blaster::set_arm_state(blaster, BlasterArmState::HorizontalIn),
    ]))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use super::*;
    use crate::resources::Resources;
    use crate::scheduler::Scheduler;
    use crate::subsystems::algae_blaster::{AlgaeBlaster, SimAlgaeBlaster};
    use crate::subsystems::algae_intake::{AlgaeIntake, SimAlgaeIntake};
    use crate::subsystems::elevator::{Elevator, ElevatorHeight, SimElevator};

    const PERIOD: Duration = Duration::from_millis(20);

    /// Runs the scheduler and sim mechanisms until idle, returning the tick
    /// count it took
    fn run_to_completion(
        scheduler: &mut Scheduler,
        intake: &SharedAlgaeIntake,
        elevator: &SharedElevator,
        blaster: &SharedAlgaeBlaster,
    ) -> u32 {
        let start = Instant::now();

        for tick in 0..2000u32 {
            intake.lock().expect("Lock").periodic(PERIOD);
            elevator.lock().expect("Lock").periodic(PERIOD);
            blaster.lock().expect("Lock").periodic(PERIOD);

            scheduler.run(start + PERIOD * tick);

            if scheduler.running_len() == 0 {
                return tick;
            }
        }

        panic!("routine never finished");
    }

    fn mechanisms() -> (SharedAlgaeIntake, SharedElevator, SharedAlgaeBlaster) {
        (
            Arc::new(Mutex::new(SimAlgaeIntake::new())),
            Arc::new(Mutex::new(SimElevator::new())),
            Arc::new(Mutex::new(SimAlgaeBlaster::new())),
        )
    }

    #[test]
    fn intake_routine_ends_stowed() {
        let (intake, elevator, blaster) = mechanisms();
        let mut scheduler = Scheduler::new();

        scheduler.schedule(intake_algae(&intake), Instant::now());
        assert_eq!(scheduler.claimed(), Resources::ALGAE_INTAKE);

        run_to_completion(&mut scheduler, &intake, &elevator, &blaster);

        assert!(intake
            .lock()
            .expect("Lock")
            .is_arm_at_state(IntakeArmState::Retracted));
        assert_eq!(scheduler.claimed(), Resources::empty());
    }

    #[test]
    fn release_routine_stops_the_rollers() {
        let (intake, elevator, blaster) = mechanisms();
        let mut scheduler = Scheduler::new();

        scheduler.schedule(release_algae_from_intake(&intake), Instant::now());
        let ticks = run_to_completion(&mut scheduler, &intake, &elevator, &blaster);

        // The spit phase is time bounded and the rollers end stopped
        assert!(ticks >= (RELEASE_SPIT_TIME.as_millis() / 20) as u32);
        assert_eq!(intake.lock().expect("Lock").rollers_voltage(), 0.0);
    }

    #[test]
    fn blast_swings_when_already_at_height() {
        let (_intake, elevator, blaster) = mechanisms();
        let mut scheduler = Scheduler::new();

        // Pre-position the elevator so the gate samples true at init
        {
            let mut elevator = elevator.lock().expect("Lock");
            elevator.set_target_height(ReefFace::AB.algae_height());
            for _ in 0..200 {
                elevator.periodic(PERIOD);
            }
            assert!(elevator.is_at_target_position());
        }

        scheduler.schedule(
            blast_algae_off_reef(ReefFace::AB, &elevator, &blaster),
            Instant::now(),
        );
        assert_eq!(
            scheduler.claimed(),
            Resources::ELEVATOR | Resources::ALGAE_BLASTER
        );

        let mut swung = false;
        let start = Instant::now();
        for tick in 0..2000u32 {
            elevator.lock().expect("Lock").periodic(PERIOD);
            blaster.lock().expect("Lock").periodic(PERIOD);
            scheduler.run(start + PERIOD * tick);

            swung |= blaster
                .lock()
                .expect("Lock")
                .is_arm_at_state(BlasterArmState::HorizontalOut);
            if scheduler.running_len() == 0 {
                break;
            }
        }

        assert!(swung, "blaster never swung out");
        assert!(blaster
            .lock()
            .expect("Lock")
            .is_arm_at_state(BlasterArmState::HorizontalIn));
    }

    #[test]
    fn blast_gate_skips_the_swing_when_still_travelling() {
        let (intake, elevator, blaster) = mechanisms();
        let mut scheduler = Scheduler::new();

        // Elevator starts at L1; AB wants L2, so the gate samples false
        scheduler.schedule(
            blast_algae_off_reef(ReefFace::AB, &elevator, &blaster),
            Instant::now(),
        );
        run_to_completion(&mut scheduler, &intake, &elevator, &blaster);

        assert!(elevator.lock().expect("Lock").is_at_target_position());
        assert!(blaster
            .lock()
            .expect("Lock")
            .is_arm_at_state(BlasterArmState::HorizontalIn));
        let height = elevator.lock().expect("Lock").current_height();
        assert!((height - ElevatorHeight::L2.meters()).abs() < 1e-3);
    }
}
