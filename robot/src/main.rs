//! Control software for the competition robot

pub mod command;
pub mod commands;
pub mod field;
pub mod pathfinding;
pub mod pose;
pub mod resources;
pub mod scheduler;
pub mod subsystems;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use common::error::LogErrorExt;
use common::types::{Pose, Transform};
use glam::Vec2;
use rand::Rng;
use tracing::{info, warn, Level};

use crate::command::combinators::Sequence;
use crate::field::ReefFace;
use crate::pathfinding::DirectPathfinder;
use crate::pose::quest::{QuestSim, QuestSource};
use crate::pose::vision::{VisionFrame, VisionSource};
use crate::pose::{PoseEstimator, SharedPoseEstimator};
use crate::scheduler::Scheduler;
use crate::subsystems::algae_blaster::{SharedAlgaeBlaster, SimAlgaeBlaster};
use crate::subsystems::algae_intake::{SharedAlgaeIntake, SimAlgaeIntake};
use crate::subsystems::elevator::{SharedElevator, SimElevator};
use crate::subsystems::swerve::{self, SharedSwerve, SimSwerve};

const PERIOD: Duration = Duration::from_millis(20);

/// Fixed mount offset from robot center to the headset tracker
const ROBOT_TO_QUEST: Transform = Transform {
    translation: Vec2::new(0.25, 0.0),
    rotation: 0.0,
};

const VISION_FRAME_PERIOD: Duration = Duration::from_millis(200);
const VISION_STD_DEV: f32 = 0.02;

static STOP_THE_WORLD: AtomicBool = AtomicBool::new(false);

fn world_stopped() -> bool {
    STOP_THE_WORLD.load(Ordering::Relaxed)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();
    info!("Starting robot");

    ctrlc::set_handler(|| STOP_THE_WORLD.store(true, Ordering::Relaxed))
        .context("Set ctrl-c")?;

    let start = Instant::now();

    let swerve_sim = Arc::new(Mutex::new(SimSwerve::new(PERIOD)));
    let swerve: SharedSwerve = swerve_sim.clone();
    let elevator: SharedElevator = Arc::new(Mutex::new(SimElevator::new()));
    let intake: SharedAlgaeIntake = Arc::new(Mutex::new(SimAlgaeIntake::new()));
    let blaster: SharedAlgaeBlaster = Arc::new(Mutex::new(SimAlgaeBlaster::new()));

    // Sim pose sources observe the drivetrain ground truth
    let quest_truth = swerve_sim.clone();
    let quest = QuestSim::new(
        move || {
            let pose = quest_truth.lock().expect("Lock").true_pose();
            (pose, start.elapsed())
        },
        ROBOT_TO_QUEST,
    );

    let (vision_tx, vision_rx) = crossbeam::channel::bounded(30);
    {
        let truth = swerve_sim.clone();
        thread::spawn(move || {
            let mut rng = rand::thread_rng();

            while !world_stopped() {
                let pose = truth.lock().expect("Lock").true_pose();
                let noisy = Pose::new(
                    pose.translation.x + rng.gen_range(-VISION_STD_DEV..VISION_STD_DEV),
                    pose.translation.y + rng.gen_range(-VISION_STD_DEV..VISION_STD_DEV),
                    pose.heading + rng.gen_range(-0.01..0.01),
                );

                vision_tx
                    .try_send(VisionFrame {
                        pose: noisy,
                        timestamp: start.elapsed(),
                        std_dev: VISION_STD_DEV,
                    })
                    .log_warn("Send vision frame");

                thread::sleep(VISION_FRAME_PERIOD);
            }
        });
    }

    let estimator: SharedPoseEstimator = Arc::new(RwLock::new(PoseEstimator::new(vec![
        Box::new(QuestSource::new(Box::new(quest), ROBOT_TO_QUEST)),
        Box::new(VisionSource::new(vision_rx)),
    ])));

    let pathfinder = DirectPathfinder::new(swerve.clone(), estimator.clone());
    let mut scheduler = Scheduler::new();

    info!("---------- Scheduling autonomous routine ----------");
    let auto = Sequence::new(vec![
        pathfinding::pathfind_to_pose(
            &pathfinder,
            ReefFace::AB.approach_pose(),
            pathfinding::DEFAULT_CONSTRAINTS,
        ),
        commands::blast_algae_off_reef(ReefFace::AB, &elevator, &blaster),
        commands::intake_algae(&intake),
        swerve::stop_driving(&swerve),
    ]);
    scheduler.schedule(Box::new(auto), Instant::now());
    info!("---------------------------------------------------");

    let mut deadline = Instant::now() + PERIOD;
    while !world_stopped() {
        let now = Instant::now();

        swerve.lock().expect("Lock").periodic(PERIOD);
        elevator.lock().expect("Lock").periodic(PERIOD);
        intake.lock().expect("Lock").periodic(PERIOD);
        blaster.lock().expect("Lock").periodic(PERIOD);

        // Fuse before any command reads the estimate this tick
        {
            let velocity = swerve.lock().expect("Lock").velocity();
            estimator.write().expect("Lock").update(velocity, PERIOD);
        }

        scheduler.run(now);

        if scheduler.running_len() == 0 {
            info!("All commands finished");
            break;
        }

        let remaining = deadline - Instant::now();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        } else {
            warn!("Behind schedule");
        }
        deadline += PERIOD;
    }

    scheduler.cancel_all();
    STOP_THE_WORLD.store(true, Ordering::Relaxed);
    info!("Robot stopped");

    Ok(())
}
