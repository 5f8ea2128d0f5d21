//! Physical subsystems as capability traits with simulated implementations
//!
//! Commands receive shared handles at construction; nothing reaches a
//! subsystem except through the handle of the command that claimed it.

pub mod algae_blaster;
pub mod algae_intake;
pub mod elevator;
pub mod swerve;
