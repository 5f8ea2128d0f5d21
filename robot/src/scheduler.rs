//! Cooperative single threaded command scheduler
//!
//! Ticked at a fixed period by the run loop. Holds the claim map that makes
//! resource exclusivity real: scheduling a command whose requirements overlap
//! a running command's interrupts the holder before the newcomer starts.

use std::time::Instant;

use tracing::{debug, error, warn};

use crate::command::BoxedCommand;
use crate::resources::Resources;

struct RunningCommand {
    command: BoxedCommand,
    requirements: Resources,
    /// Tick counter value when this command was admitted; it first executes
    /// on the following tick
    admitted_tick: u64,
}

#[derive(Default)]
pub struct Scheduler {
    running: Vec<RunningCommand>,
    claimed: Resources,
    tick: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Admits a command, interrupting every running command it conflicts
    /// with
    ///
    /// Conflicts are resolved in registration order and the newcomer always
    /// wins. `init` runs synchronously; the first `execute` happens on the
    /// next tick.
    pub fn schedule(&mut self, mut command: BoxedCommand, now: Instant) {
        let requirements = command.requirements();

        if self.claimed.intersects(requirements) {
            let mut idx = 0;

            while idx < self.running.len() {
                if self.running[idx].requirements.intersects(requirements) {
                    let mut holder = self.running.remove(idx);

                    warn!(
                        name = holder.command.name(),
                        "Interrupting command over a resource conflict"
                    );
                    holder.command.end(true);
                    self.claimed.remove(holder.requirements);
                } else {
                    idx += 1;
                }
            }
        }

        debug!(name = command.name(), "Scheduling command");

        if let Err(err) = command.init(now) {
            error!(name = command.name(), "Command failed in init: {err:?}");
            command.end(true);
            return;
        }

        self.claimed.insert(requirements);
        self.running.push(RunningCommand {
            command,
            requirements,
            admitted_tick: self.tick,
        });
    }

    /// Advances every running command one tick
    ///
    /// A failing callback ends only its own command (interrupted); the tick
    /// always continues for everything else.
    pub fn run(&mut self, now: Instant) {
        self.tick += 1;

        let mut idx = 0;
        while idx < self.running.len() {
            if self.running[idx].admitted_tick >= self.tick {
                idx += 1;
                continue;
            }

            let slot = &mut self.running[idx];
            let advanced = match slot.command.execute(now) {
                Ok(()) => slot.command.is_finished(now),
                Err(err) => Err(err),
            };

            match advanced {
                Ok(false) => {
                    idx += 1;
                }
                Ok(true) => {
                    let mut finished = self.running.remove(idx);

                    debug!(name = finished.command.name(), "Command finished");
                    finished.command.end(false);
                    self.claimed.remove(finished.requirements);
                }
                Err(err) => {
                    let mut failed = self.running.remove(idx);

                    error!(
                        name = failed.command.name(),
                        "Command failed, ending it interrupted: {err:?}"
                    );
                    failed.command.end(true);
                    self.claimed.remove(failed.requirements);
                }
            }
        }
    }

    /// Ends every running command interrupted and clears all claims
    ///
    /// Used on mode transitions and shutdown.
    pub fn cancel_all(&mut self) {
        for mut slot in self.running.drain(..) {
            warn!(name = slot.command.name(), "Cancelling command");
            slot.command.end(true);
        }

        self.claimed = Resources::empty();
    }

    pub fn claimed(&self) -> Resources {
        self.claimed
    }

    /// True when any running command holds one of `resources`
    pub fn is_any_scheduled(&self, resources: Resources) -> bool {
        self.claimed.intersects(resources)
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }
}
