//! The composable unit of cooperative work driven by the scheduler
//!
//! A command owns nothing while idle; once scheduled it claims its declared
//! resources until it ends. Ending is final: a command is never resumed, a
//! fresh one is built by its factory instead.

pub mod combinators;

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::resources::Resources;

pub trait Command {
    fn name(&self) -> &str {
        "command"
    }

    /// Resources this command must exclusively hold while running
    fn requirements(&self) -> Resources {
        Resources::empty()
    }

    /// Called once, synchronously, when the command is scheduled
    fn init(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    /// Called every tick while the command is running
    fn execute(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    /// Checked after `execute` each tick
    fn is_finished(&mut self, now: Instant) -> Result<bool>;

    /// Always called exactly once when the command stops running
    ///
    /// `interrupted` is true when the command was cancelled rather than
    /// finishing on its own.
    fn end(&mut self, _interrupted: bool) {}
}

pub type BoxedCommand = Box<dyn Command>;

/// Command defined by a closure per lifecycle callback
pub struct FunctionalCommand {
    name: &'static str,
    requirements: Resources,
    on_init: Box<dyn FnMut() -> Result<()>>,
    on_execute: Box<dyn FnMut() -> Result<()>>,
    on_end: Box<dyn FnMut(bool)>,
    finished: Box<dyn FnMut() -> Result<bool>>,
}

impl FunctionalCommand {
    pub fn new(
        name: &'static str,
        requirements: Resources,
        on_init: impl FnMut() -> Result<()> + 'static,
        on_execute: impl FnMut() -> Result<()> + 'static,
        on_end: impl FnMut(bool) + 'static,
        finished: impl FnMut() -> Result<bool> + 'static,
    ) -> Self {
        FunctionalCommand {
            name,
            requirements,
            on_init: Box::new(on_init),
            on_execute: Box::new(on_execute),
            on_end: Box::new(on_end),
            finished: Box::new(finished),
        }
    }
}

impl Command for FunctionalCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, _now: Instant) -> Result<()> {
        (self.on_init)()
    }

    fn execute(&mut self, _now: Instant) -> Result<()> {
        (self.on_execute)()
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        (self.finished)()
    }

    fn end(&mut self, interrupted: bool) {
        (self.on_end)(interrupted);
    }
}

/// Runs a closure once and immediately finishes
pub struct InstantCommand {
    name: &'static str,
    requirements: Resources,
    action: Box<dyn FnMut() -> Result<()>>,
}

impl InstantCommand {
    pub fn new(
        name: &'static str,
        requirements: Resources,
        action: impl FnMut() -> Result<()> + 'static,
    ) -> Self {
        InstantCommand {
            name,
            requirements,
            action: Box::new(action),
        }
    }
}

impl Command for InstantCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, _now: Instant) -> Result<()> {
        (self.action)()
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(true)
    }
}

/// Runs a closure every tick and never finishes on its own
pub struct RunCommand {
    name: &'static str,
    requirements: Resources,
    action: Box<dyn FnMut() -> Result<()>>,
}

impl RunCommand {
    pub fn new(
        name: &'static str,
        requirements: Resources,
        action: impl FnMut() -> Result<()> + 'static,
    ) -> Self {
        RunCommand {
            name,
            requirements,
            action: Box::new(action),
        }
    }
}

impl Command for RunCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn execute(&mut self, _now: Instant) -> Result<()> {
        (self.action)()
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(false)
    }
}

/// Finishes once a duration has elapsed since init
pub struct WaitCommand {
    duration: Duration,
    started: Option<Instant>,
}

impl WaitCommand {
    pub fn new(duration: Duration) -> Self {
        WaitCommand {
            duration,
            started: None,
        }
    }
}

impl Command for WaitCommand {
    fn name(&self) -> &str {
        "wait"
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        self.started = Some(now);
        Ok(())
    }

    fn is_finished(&mut self, now: Instant) -> Result<bool> {
        Ok(self
            .started
            .map_or(false, |started| now - started >= self.duration))
    }
}
