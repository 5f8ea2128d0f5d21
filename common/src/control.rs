//! Feedback controllers shared by the control loops

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    pub k_p: f32,
    pub k_i: f32,
    pub k_d: f32,

    pub max_integral: f32,
}

/// Basic PID loop, tuned per consumer via [`PidConfig`]
#[derive(Debug, Default, Clone)]
pub struct PidController {
    period: f32,
    last_error: Option<f32>,
    integral: f32,
}

impl PidController {
    pub fn new(period: Duration) -> Self {
        PidController {
            period: period.as_secs_f32(),
            last_error: None,
            integral: 0.0,
        }
    }

    pub fn update(&mut self, error: f32, config: PidConfig) -> f32 {
        let p = error;

        self.integral = clamp(self.integral + error * self.period, config.max_integral);
        let i = self.integral;

        let d = if let Some(last_error) = self.last_error {
            (error - last_error) / self.period
        } else {
            0.0
        };
        self.last_error = Some(error);

        p * config.k_p + i * config.k_i + d * config.k_d
    }

    pub fn reset(&mut self) {
        self.last_error = None;
        self.integral = 0.0;
    }
}

fn clamp(val: f32, range: f32) -> f32 {
    val.clamp(-range, range)
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConstraints {
    /// Meters (or radians) per second
    pub max_velocity: f32,
    /// Meters (or radians) per second squared
    pub max_acceleration: f32,
}

/// Acceleration limited velocity profile toward a positional goal
///
/// Tracks its own commanded velocity so repeated calls trace out a
/// trapezoid: ramp up, cruise, ramp down to stop at zero error.
#[derive(Debug, Clone)]
pub struct TrapezoidalProfile {
    constraints: ProfileConstraints,
    velocity: f32,
}

impl TrapezoidalProfile {
    pub fn new(constraints: ProfileConstraints) -> Self {
        TrapezoidalProfile {
            constraints,
            velocity: 0.0,
        }
    }

    /// Advances the profile one step and returns the velocity to command
    ///
    /// `error` is goal minus current position.
    pub fn advance(&mut self, error: f32, dt: f32) -> f32 {
        let ProfileConstraints {
            max_velocity,
            max_acceleration,
        } = self.constraints;

        // Fastest speed that can still stop within the remaining error
        let stop_limited = (2.0 * max_acceleration * error.abs()).sqrt();
        let target = error.signum() * stop_limited.min(max_velocity);

        let step = max_acceleration * dt;
        self.velocity += (target - self.velocity).clamp(-step, step);
        self.velocity
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn reset(&mut self) {
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_sign() {
        let config = PidConfig {
            k_p: 1.0,
            k_i: 0.0,
            k_d: 0.0,
            max_integral: 1.0,
        };
        let mut controller = PidController::new(Duration::from_millis(20));

        assert!(controller.update(0.5, config) > 0.0);
        assert!(controller.update(-0.5, config) < 0.0);
    }

    #[test]
    fn profile_reaches_goal() {
        let mut profile = TrapezoidalProfile::new(ProfileConstraints {
            max_velocity: 2.0,
            max_acceleration: 3.0,
        });

        let dt = 0.02;
        let goal = 4.0;
        let mut position = 0.0;

        for _ in 0..1000 {
            let velocity = profile.advance(goal - position, dt);
            assert!(velocity.abs() <= 2.0 + 1e-4);
            position += velocity * dt;
        }

        assert!((goal - position).abs() < 0.05);
        assert!(profile.velocity().abs() < 0.2);
    }
}
