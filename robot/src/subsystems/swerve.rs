//! Drivable base capability, its simulation, and the navigation commands
//! built on top of it

use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::control::{PidConfig, PidController, ProfileConstraints, TrapezoidalProfile};
use common::types::{angle_difference, rotate, ChassisVelocity, Pose};

use crate::command::{BoxedCommand, FunctionalCommand, InstantCommand, RunCommand};
use crate::pose::SharedPoseEstimator;
use crate::resources::Resources;

const ROTATION_PID: PidConfig = PidConfig {
    k_p: 4.0,
    k_i: 0.0,
    k_d: 0.1,
    max_integral: 1.0,
};
const TRANSLATION_PID: PidConfig = PidConfig {
    k_p: 3.5,
    k_i: 0.0,
    k_d: 0.0,
    max_integral: 1.0,
};
const TRANSLATION_PROFILE: ProfileConstraints = ProfileConstraints {
    max_velocity: 4.0,
    max_acceleration: 3.0,
};

/// Meters per second at full open loop command
const MAX_OPEN_LOOP_SPEED: f32 = 4.0;
/// Radians per second at full open loop command
const MAX_OPEN_LOOP_OMEGA: f32 = 2.0 * PI;

const ROTATION_GOAL_TOLERANCE: f32 = 0.05;

/// Tight tolerances used by the PID drive-to-pose command
const PID_DISTANCE_TOLERANCE: f32 = 0.01;
const PID_ANGLE_TOLERANCE: f32 = 0.3 * PI / 180.0;

/// The drivable base capability consumed by navigation commands
pub trait Drivable {
    /// Open loop drive, inputs normalized to [-1, 1]
    fn drive_open_loop(&mut self, x: f32, y: f32, rotation: f32, field_relative: bool);

    /// Closed loop drive toward a target pose with PID on every axis
    fn drive_to_pose(&mut self, current: Pose, target: Pose);

    /// Closed loop drive toward a target pose with trapezoidal translation
    /// profiles
    fn drive_to_pose_trapezoidal(&mut self, current: Pose, target: Pose);

    /// Open loop translation while the rotation controller tracks its goal
    fn drive_with_target(&mut self, x: f32, y: f32, field_relative: bool, current_heading: f32);

    fn is_at_pose(&self, current: Pose, target: Pose, distance_tol: f32, angle_tol: f32) -> bool;

    fn stop(&mut self);

    fn set_goal_rotation(&mut self, heading: f32);
    fn reset_rotation_controller(&mut self);
    fn reset_translation_controllers(&mut self);
    fn at_rotation_goal(&self) -> bool;

    fn set_gyro_heading(&mut self, heading: f32);

    /// Cross the modules so the robot resists being pushed
    fn lock_wheels(&mut self);

    /// Field relative measured velocity, the odometry input
    fn velocity(&self) -> ChassisVelocity;

    /// Steps the base one control period
    fn periodic(&mut self, dt: Duration);
}

pub type SharedSwerve = Arc<Mutex<dyn Drivable>>;

/// Kinematic simulation of the swerve base
///
/// Integrates commanded chassis velocity directly; also serves as the ground
/// truth for the sim pose sources.
pub struct SimSwerve {
    true_pose: Pose,
    commanded: ChassisVelocity,
    locked: bool,

    rotation_controller: PidController,
    rotation_goal: Option<f32>,
    last_rotation_error: Option<f32>,

    translation_x: PidController,
    translation_y: PidController,
    profile_x: TrapezoidalProfile,
    profile_y: TrapezoidalProfile,
    period: f32,
}

impl SimSwerve {
    pub fn new(period: Duration) -> Self {
        SimSwerve {
            true_pose: Pose::default(),
            commanded: ChassisVelocity::default(),
            locked: false,

            rotation_controller: PidController::new(period),
            rotation_goal: None,
            last_rotation_error: None,

            translation_x: PidController::new(period),
            translation_y: PidController::new(period),
            profile_x: TrapezoidalProfile::new(TRANSLATION_PROFILE),
            profile_y: TrapezoidalProfile::new(TRANSLATION_PROFILE),
            period: period.as_secs_f32(),
        }
    }

    pub fn true_pose(&self) -> Pose {
        self.true_pose
    }

    fn rotation_output(&mut self, current_heading: f32) -> f32 {
        let Some(goal) = self.rotation_goal else {
            return 0.0;
        };

        let error = angle_difference(goal, current_heading);
        self.last_rotation_error = Some(error);
        self.rotation_controller.update(error, ROTATION_PID)
    }
}

impl Drivable for SimSwerve {
    fn drive_open_loop(&mut self, x: f32, y: f32, rotation: f32, field_relative: bool) {
        let linear = glam::Vec2::new(x, y) * MAX_OPEN_LOOP_SPEED;
        let linear = if field_relative {
            linear
        } else {
            rotate(linear, self.true_pose.heading)
        };

        self.locked = false;
        self.commanded = ChassisVelocity {
            linear,
            angular: rotation * MAX_OPEN_LOOP_OMEGA,
        };
    }

    fn drive_to_pose(&mut self, current: Pose, target: Pose) {
        let error = target.translation - current.translation;

        self.locked = false;
        self.commanded = ChassisVelocity {
            linear: glam::Vec2::new(
                self.translation_x.update(error.x, TRANSLATION_PID),
                self.translation_y.update(error.y, TRANSLATION_PID),
            )
            .clamp_length_max(TRANSLATION_PROFILE.max_velocity),
            angular: self.rotation_output(current.heading),
        };
    }

    fn drive_to_pose_trapezoidal(&mut self, current: Pose, target: Pose) {
        let error = target.translation - current.translation;

        self.locked = false;
        self.commanded = ChassisVelocity {
            linear: glam::Vec2::new(
                self.profile_x.advance(error.x, self.period),
                self.profile_y.advance(error.y, self.period),
            ),
            angular: self.rotation_output(current.heading),
        };
    }

    fn drive_with_target(&mut self, x: f32, y: f32, field_relative: bool, current_heading: f32) {
        let linear = glam::Vec2::new(x, y) * MAX_OPEN_LOOP_SPEED;
        let linear = if field_relative {
            linear
        } else {
            rotate(linear, self.true_pose.heading)
        };

        self.locked = false;
        self.commanded = ChassisVelocity {
            linear,
            angular: self.rotation_output(current_heading),
        };
    }

    fn is_at_pose(&self, current: Pose, target: Pose, distance_tol: f32, angle_tol: f32) -> bool {
        current.distance(target) <= distance_tol
            && current.heading_error(target).abs() <= angle_tol
    }

    fn stop(&mut self) {
        self.commanded = ChassisVelocity::default();
    }

    fn set_goal_rotation(&mut self, heading: f32) {
        self.rotation_goal = Some(heading);
    }

    fn reset_rotation_controller(&mut self) {
        self.rotation_controller.reset();
        self.last_rotation_error = None;
    }

    fn reset_translation_controllers(&mut self) {
        self.translation_x.reset();
        self.translation_y.reset();
        self.profile_x.reset();
        self.profile_y.reset();
    }

    fn at_rotation_goal(&self) -> bool {
        self.last_rotation_error
            .map_or(false, |error| error.abs() <= ROTATION_GOAL_TOLERANCE)
    }

    fn set_gyro_heading(&mut self, heading: f32) {
        self.true_pose.heading = heading;
    }

    fn lock_wheels(&mut self) {
        self.commanded = ChassisVelocity::default();
        self.locked = true;
    }

    fn velocity(&self) -> ChassisVelocity {
        if self.locked {
            ChassisVelocity::default()
        } else {
            self.commanded
        }
    }

    fn periodic(&mut self, dt: Duration) {
        let dt = dt.as_secs_f32();
        let velocity = self.velocity();

        self.true_pose.translation += velocity.linear * dt;
        self.true_pose.heading =
            common::types::wrap_angle(self.true_pose.heading + velocity.angular * dt);
    }
}

// Navigation command factories. Each one claims the drivetrain and reads the
// pose snapshot the estimator fused earlier in the same tick.

pub fn stop_driving(swerve: &SharedSwerve) -> BoxedCommand {
    let swerve = swerve.clone();

    Box::new(InstantCommand::new(
        "stop_driving",
        Resources::DRIVETRAIN,
        move || {
            swerve.lock().expect("Lock").stop();
            Ok(())
        },
    ))
}

pub fn drive_open_loop(
    swerve: &SharedSwerve,
    mut x: impl FnMut() -> f32 + 'static,
    mut y: impl FnMut() -> f32 + 'static,
    mut rotation: impl FnMut() -> f32 + 'static,
    mut robot_centric: impl FnMut() -> bool + 'static,
) -> BoxedCommand {
    let swerve = swerve.clone();

    Box::new(RunCommand::new(
        "drive_open_loop",
        Resources::DRIVETRAIN,
        move || {
            swerve
                .lock()
                .expect("Lock")
                .drive_open_loop(x(), y(), rotation(), !robot_centric());
            Ok(())
        },
    ))
}

pub fn go_to_pose_pid(
    swerve: &SharedSwerve,
    estimator: &SharedPoseEstimator,
    target: Pose,
) -> BoxedCommand {
    let (init_swerve, exec_swerve, end_swerve, done_swerve) = (
        swerve.clone(),
        swerve.clone(),
        swerve.clone(),
        swerve.clone(),
    );
    let (exec_estimator, done_estimator) = (estimator.clone(), estimator.clone());

    Box::new(FunctionalCommand::new(
        "go_to_pose_pid",
        Resources::DRIVETRAIN,
        move || {
            let mut swerve = init_swerve.lock().expect("Lock");
            swerve.reset_rotation_controller();
            swerve.set_goal_rotation(target.heading);
            Ok(())
        },
        move || {
            let current = exec_estimator.read().expect("Lock").current_pose();
            exec_swerve
                .lock()
                .expect("Lock")
                .drive_to_pose(current, target);
            Ok(())
        },
        move |_interrupted| end_swerve.lock().expect("Lock").stop(),
        move || {
            let current = done_estimator.read().expect("Lock").current_pose();
            Ok(done_swerve.lock().expect("Lock").is_at_pose(
                current,
                target,
                PID_DISTANCE_TOLERANCE,
                PID_ANGLE_TOLERANCE,
            ))
        },
    ))
}

pub fn go_to_pose_trapezoidal(
    swerve: &SharedSwerve,
    estimator: &SharedPoseEstimator,
    target: Pose,
    distance_tol: f32,
    angle_tol: f32,
) -> BoxedCommand {
    let (init_swerve, exec_swerve, end_swerve, done_swerve) = (
        swerve.clone(),
        swerve.clone(),
        swerve.clone(),
        swerve.clone(),
    );
    let (exec_estimator, done_estimator) = (estimator.clone(), estimator.clone());

    Box::new(FunctionalCommand::new(
        "go_to_pose_trapezoidal",
        Resources::DRIVETRAIN,
        move || {
            let mut swerve = init_swerve.lock().expect("Lock");
            swerve.reset_rotation_controller();
            swerve.reset_translation_controllers();
            swerve.set_goal_rotation(target.heading);
            Ok(())
        },
        move || {
            let current = exec_estimator.read().expect("Lock").current_pose();
            exec_swerve
                .lock()
                .expect("Lock")
                .drive_to_pose_trapezoidal(current, target);
            Ok(())
        },
        move |_interrupted| end_swerve.lock().expect("Lock").stop(),
        move || {
            let current = done_estimator.read().expect("Lock").current_pose();
            Ok(done_swerve
                .lock()
                .expect("Lock")
                .is_at_pose(current, target, distance_tol, angle_tol))
        },
    ))
}

pub fn rotate_to_target(
    swerve: &SharedSwerve,
    estimator: &SharedPoseEstimator,
    heading: f32,
) -> BoxedCommand {
    let (init_swerve, exec_swerve, done_swerve) =
        (swerve.clone(), swerve.clone(), swerve.clone());
    let estimator = estimator.clone();

    Box::new(FunctionalCommand::new(
        "rotate_to_target",
        Resources::DRIVETRAIN,
        move || {
            let mut swerve = init_swerve.lock().expect("Lock");
            swerve.reset_rotation_controller();
            swerve.set_goal_rotation(heading);
            Ok(())
        },
        move || {
            let current = estimator.read().expect("Lock").current_pose();
            exec_swerve
                .lock()
                .expect("Lock")
                .drive_with_target(0.0, 0.0, true, current.heading);
            Ok(())
        },
        |_interrupted| {},
        move || Ok(done_swerve.lock().expect("Lock").at_rotation_goal()),
    ))
}

pub fn drive_whilst_rotating_to_target(
    swerve: &SharedSwerve,
    estimator: &SharedPoseEstimator,
    mut x: impl FnMut() -> f32 + 'static,
    mut y: impl FnMut() -> f32 + 'static,
    heading: f32,
    mut robot_centric: impl FnMut() -> bool + 'static,
) -> BoxedCommand {
    let (init_swerve, exec_swerve) = (swerve.clone(), swerve.clone());
    let estimator = estimator.clone();

    Box::new(FunctionalCommand::new(
        "drive_whilst_rotating",
        Resources::DRIVETRAIN,
        move || {
            let mut swerve = init_swerve.lock().expect("Lock");
            swerve.reset_rotation_controller();
            swerve.set_goal_rotation(heading);
            Ok(())
        },
        move || {
            let current = estimator.read().expect("Lock").current_pose();
            exec_swerve.lock().expect("Lock").drive_with_target(
                x(),
                y(),
                !robot_centric(),
                current.heading,
            );
            Ok(())
        },
        |_interrupted| {},
        || Ok(false),
    ))
}

pub fn reset_gyro(swerve: &SharedSwerve) -> BoxedCommand {
    let swerve = swerve.clone();

    Box::new(InstantCommand::new(
        "reset_gyro",
        Resources::DRIVETRAIN,
        move || {
            swerve.lock().expect("Lock").set_gyro_heading(0.0);
            Ok(())
        },
    ))
}

pub fn lock_wheels(swerve: &SharedSwerve) -> BoxedCommand {
    let swerve = swerve.clone();

    Box::new(RunCommand::new(
        "lock_wheels",
        Resources::DRIVETRAIN,
        move || {
            swerve.lock().expect("Lock").lock_wheels();
            Ok(())
        },
    ))
}
