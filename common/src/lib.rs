//! Code shared between the robot control crates

pub mod control;
pub mod error;
pub mod types;
