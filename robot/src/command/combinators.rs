//! Structural composition of commands
//!
//! Every combinator is itself a [`Command`] whose requirement set is the
//! union of its children's, so arbitrarily deep trees look like any other
//! command to the scheduler.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::command::{BoxedCommand, Command};
use crate::resources::Resources;

fn union_requirements(children: &[BoxedCommand]) -> Resources {
    children
        .iter()
        .fold(Resources::empty(), |acc, child| acc | child.requirements())
}

/// Runs its children one at a time, in order
pub struct Sequence {
    children: Vec<BoxedCommand>,
    requirements: Resources,
    current: usize,
}

impl Sequence {
    pub fn new(children: Vec<BoxedCommand>) -> Self {
        let requirements = union_requirements(&children);

        Sequence {
            children,
            requirements,
            current: 0,
        }
    }
}

impl Command for Sequence {
    fn name(&self) -> &str {
        "sequence"
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        self.current = 0;

        if let Some(child) = self.children.first_mut() {
            child.init(now)?;
        }

        Ok(())
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        let Some(child) = self.children.get_mut(self.current) else {
            return Ok(());
        };

        child.execute(now)?;

        if child.is_finished(now)? {
            child.end(false);
            self.current += 1;

            // The next child starts executing next tick
            if let Some(next) = self.children.get_mut(self.current) {
                next.init(now)?;
            }
        }

        Ok(())
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(self.current >= self.children.len())
    }

    fn end(&mut self, interrupted: bool) {
        if let Some(child) = self.children.get_mut(self.current) {
            child.end(interrupted);
        }
    }
}

struct Branch {
    command: BoxedCommand,
    finished: bool,
}

/// Runs all children at once, finished when every child is
pub struct ParallelAll {
    children: Vec<Branch>,
    requirements: Resources,
}

impl ParallelAll {
    pub fn new(children: Vec<BoxedCommand>) -> Self {
        let requirements = union_requirements(&children);

        ParallelAll {
            children: children
                .into_iter()
                .map(|command| Branch {
                    command,
                    finished: false,
                })
                .collect(),
            requirements,
        }
    }
}

impl Command for ParallelAll {
    fn name(&self) -> &str {
        "parallel"
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        for child in &mut self.children {
            child.finished = false;
            child.command.init(now)?;
        }

        Ok(())
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        for child in &mut self.children {
            if child.finished {
                continue;
            }

            child.command.execute(now)?;

            if child.command.is_finished(now)? {
                child.command.end(false);
                child.finished = true;
            }
        }

        Ok(())
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(self.children.iter().all(|child| child.finished))
    }

    fn end(&mut self, _interrupted: bool) {
        for child in &mut self.children {
            if !child.finished {
                child.command.end(true);
            }
        }
    }
}

/// Runs all children at once, finished when any child is
///
/// The children that did not finish first are ended interrupted.
pub struct ParallelRace {
    children: Vec<Branch>,
    requirements: Resources,
}

impl ParallelRace {
    pub fn new(children: Vec<BoxedCommand>) -> Self {
        let requirements = union_requirements(&children);

        ParallelRace {
            children: children
                .into_iter()
                .map(|command| Branch {
                    command,
                    finished: false,
                })
                .collect(),
            requirements,
        }
    }
}

impl Command for ParallelRace {
    fn name(&self) -> &str {
        "race"
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        for child in &mut self.children {
            child.finished = false;
            child.command.init(now)?;
        }

        Ok(())
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        for child in &mut self.children {
            child.command.execute(now)?;

            if child.command.is_finished(now)? {
                child.command.end(false);
                child.finished = true;
                break;
            }
        }

        Ok(())
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(self.children.iter().any(|child| child.finished))
    }

    fn end(&mut self, _interrupted: bool) {
        for child in &mut self.children {
            if !child.finished {
                child.command.end(true);
            }
        }
    }
}

/// Gates a command on a predicate sampled once at init
///
/// When the predicate is false the wrapped command never runs and the gate
/// finishes immediately as a no-op.
pub struct ConditionalGate {
    child: BoxedCommand,
    predicate: Box<dyn FnMut() -> bool>,
    requirements: Resources,
    active: bool,
}

impl ConditionalGate {
    pub fn new(child: BoxedCommand, predicate: impl FnMut() -> bool + 'static) -> Self {
        let requirements = child.requirements();

        ConditionalGate {
            child,
            predicate: Box::new(predicate),
            requirements,
            active: false,
        }
    }
}

impl Command for ConditionalGate {
    fn name(&self) -> &str {
        "gate"
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        self.active = (self.predicate)();

        if self.active {
            self.child.init(now)?;
        }

        Ok(())
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        if self.active {
            self.child.execute(now)?;
        }

        Ok(())
    }

    fn is_finished(&mut self, now: Instant) -> Result<bool> {
        if self.active {
            self.child.is_finished(now)
        } else {
            Ok(true)
        }
    }

    fn end(&mut self, interrupted: bool) {
        if self.active {
            self.child.end(interrupted);
        }
    }
}

/// Ends the wrapped command interrupted once a deadline passes
pub struct Timeout {
    child: BoxedCommand,
    duration: Duration,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl Timeout {
    pub fn new(child: BoxedCommand, duration: Duration) -> Self {
        Timeout {
            child,
            duration,
            deadline: None,
            timed_out: false,
        }
    }
}

impl Command for Timeout {
    fn name(&self) -> &str {
        "timeout"
    }

    fn requirements(&self) -> Resources {
        self.child.requirements()
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        self.deadline = Some(now + self.duration);
        self.timed_out = false;
        self.child.init(now)
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        self.child.execute(now)
    }

    fn is_finished(&mut self, now: Instant) -> Result<bool> {
        if self.child.is_finished(now)? {
            return Ok(true);
        }

        self.timed_out = self.deadline.map_or(false, |deadline| now >= deadline);
        Ok(self.timed_out)
    }

    fn end(&mut self, interrupted: bool) {
        self.child.end(self.timed_out || interrupted);
    }
}

/// Ends the wrapped command interrupted when a kill predicate fires
pub struct InterruptOn {
    child: BoxedCommand,
    predicate: Box<dyn FnMut() -> bool>,
    fired: bool,
}

impl InterruptOn {
    pub fn new(child: BoxedCommand, predicate: impl FnMut() -> bool + 'static) -> Self {
        InterruptOn {
            child,
            predicate: Box::new(predicate),
            fired: false,
        }
    }
}

impl Command for InterruptOn {
    fn name(&self) -> &str {
        "interrupt_on"
    }

    fn requirements(&self) -> Resources {
        self.child.requirements()
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        self.fired = false;
        self.child.init(now)
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        if (self.predicate)() {
            self.fired = true;
        } else {
            self.child.execute(now)?;
        }

        Ok(())
    }

    fn is_finished(&mut self, now: Instant) -> Result<bool> {
        if self.fired {
            return Ok(true);
        }

        self.child.is_finished(now)
    }

    fn end(&mut self, interrupted: bool) {
        self.child.end(self.fired || interrupted);
    }
}

/// Rebuilds a command from its factory every time it finishes, until a
/// predicate holds
///
/// Ended commands are never resumed; each repetition is a fresh lifecycle
/// instance from the factory.
pub struct RepeatUntil {
    factory: Box<dyn FnMut() -> BoxedCommand>,
    until: Box<dyn FnMut() -> bool>,
    current: BoxedCommand,
    requirements: Resources,
    done: bool,
}

impl RepeatUntil {
    pub fn new(
        mut factory: impl FnMut() -> BoxedCommand + 'static,
        until: impl FnMut() -> bool + 'static,
    ) -> Self {
        let current = factory();
        let requirements = current.requirements();

        RepeatUntil {
            factory: Box::new(factory),
            until: Box::new(until),
            current,
            requirements,
            done: false,
        }
    }
}

impl Command for RepeatUntil {
    fn name(&self) -> &str {
        "repeat_until"
    }

    fn requirements(&self) -> Resources {
        self.requirements
    }

    fn init(&mut self, now: Instant) -> Result<()> {
        self.done = (self.until)();

        if !self.done {
            self.current.init(now)?;
        }

        Ok(())
    }

    fn execute(&mut self, now: Instant) -> Result<()> {
        if self.done {
            return Ok(());
        }

        self.current.execute(now)?;

        if self.current.is_finished(now)? {
            self.current.end(false);

            if (self.until)() {
                self.done = true;
            } else {
                self.current = (self.factory)();
                self.current.init(now)?;
            }
        }

        Ok(())
    }

    fn is_finished(&mut self, _now: Instant) -> Result<bool> {
        Ok(self.done)
    }

    fn end(&mut self, interrupted: bool) {
        if !self.done {
            self.current.end(interrupted);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Logs every lifecycle callback and finishes after a set number of
    /// executes
    struct Probe {
        label: &'static str,
        log: Log,
        finish_after: u32,
        executed: u32,
        requirements: Resources,
    }

    impl Probe {
        fn new(label: &'static str, log: &Log, finish_after: u32) -> BoxedCommand {
            Box::new(Probe {
                label,
                log: log.clone(),
                finish_after,
                executed: 0,
                requirements: Resources::empty(),
            })
        }

        fn with_requirements(
            label: &'static str,
            log: &Log,
            finish_after: u32,
            requirements: Resources,
        ) -> BoxedCommand {
            Box::new(Probe {
                label,
                log: log.clone(),
                finish_after,
                executed: 0,
                requirements,
            })
        }
    }

    impl Command for Probe {
        fn requirements(&self) -> Resources {
            self.requirements
        }

        fn init(&mut self, _now: Instant) -> Result<()> {
            self.log.borrow_mut().push(format!("{}.init", self.label));
            Ok(())
        }

        fn execute(&mut self, _now: Instant) -> Result<()> {
            self.executed += 1;
            self.log.borrow_mut().push(format!("{}.exec", self.label));
            Ok(())
        }

        fn is_finished(&mut self, _now: Instant) -> Result<bool> {
            Ok(self.executed >= self.finish_after)
        }

        fn end(&mut self, interrupted: bool) {
            self.log
                .borrow_mut()
                .push(format!("{}.end({interrupted})", self.label));
        }
    }

    fn tick(command: &mut dyn Command, now: Instant) -> bool {
        command.execute(now).unwrap();
        command.is_finished(now).unwrap()
    }

    #[test]
    fn sequence_runs_children_in_order() {
        let log: Log = Default::default();
        let mut sequence = Sequence::new(vec![
            Probe::new("a", &log, 2),
            Probe::new("b", &log, 1),
        ]);

        let now = Instant::now();
        sequence.init(now).unwrap();

        assert!(!tick(&mut sequence, now));
        assert!(!tick(&mut sequence, now));
        assert!(tick(&mut sequence, now));
        sequence.end(false);

        assert_eq!(
            *log.borrow(),
            [
                "a.init", "a.exec", "a.exec", "a.end(false)", "b.init", "b.exec", "b.end(false)",
            ]
        );
    }

    #[test]
    fn sequence_interrupt_reaches_current_child() {
        let log: Log = Default::default();
        let mut sequence = Sequence::new(vec![
            Probe::new("a", &log, 1),
            Probe::new("b", &log, 5),
        ]);

        let now = Instant::now();
        sequence.init(now).unwrap();
        assert!(!tick(&mut sequence, now));
        assert!(!tick(&mut sequence, now));
        sequence.end(true);

        assert!(log.borrow().contains(&"b.end(true)".to_owned()));
        assert!(!log.borrow().contains(&"a.end(true)".to_owned()));
    }

    #[test]
    fn race_interrupts_the_losers() {
        let log: Log = Default::default();
        let mut race = ParallelRace::new(vec![
            Probe::new("slow", &log, 10),
            Probe::new("fast", &log, 1),
        ]);

        let now = Instant::now();
        race.init(now).unwrap();
        assert!(tick(&mut race, now));
        race.end(false);

        assert!(log.borrow().contains(&"fast.end(false)".to_owned()));
        assert!(log.borrow().contains(&"slow.end(true)".to_owned()));
    }

    #[test]
    fn parallel_all_waits_for_every_child() {
        let log: Log = Default::default();
        let mut parallel = ParallelAll::new(vec![
            Probe::new("a", &log, 1),
            Probe::new("b", &log, 3),
        ]);

        let now = Instant::now();
        parallel.init(now).unwrap();
        assert!(!tick(&mut parallel, now));
        assert!(!tick(&mut parallel, now));
        assert!(tick(&mut parallel, now));
        parallel.end(false);

        assert!(log.borrow().contains(&"a.end(false)".to_owned()));
        assert!(log.borrow().contains(&"b.end(false)".to_owned()));
        // A finished child only executes while unfinished
        let a_execs = log.borrow().iter().filter(|it| *it == "a.exec").count();
        assert_eq!(a_execs, 1);
    }

    #[test]
    fn gate_skips_the_child_entirely() {
        let log: Log = Default::default();
        let mut gate = ConditionalGate::new(Probe::new("a", &log, 1), || false);

        let now = Instant::now();
        gate.init(now).unwrap();
        assert!(gate.is_finished(now).unwrap());
        gate.end(false);

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn gate_delegates_when_open() {
        let log: Log = Default::default();
        let mut gate = ConditionalGate::new(Probe::new("a", &log, 1), || true);

        let now = Instant::now();
        gate.init(now).unwrap();
        assert!(tick(&mut gate, now));
        gate.end(false);

        assert_eq!(*log.borrow(), ["a.init", "a.exec", "a.end(false)"]);
    }

    #[test]
    fn timeout_interrupts_a_stuck_child() {
        let log: Log = Default::default();
        let mut timeout = Timeout::new(
            Probe::new("stuck", &log, u32::MAX),
            Duration::from_millis(100),
        );

        let start = Instant::now();
        timeout.init(start).unwrap();
        assert!(!tick(&mut timeout, start + Duration::from_millis(20)));
        assert!(tick(&mut timeout, start + Duration::from_millis(100)));
        timeout.end(false);

        assert!(log.borrow().contains(&"stuck.end(true)".to_owned()));
    }

    #[test]
    fn timeout_passes_through_a_natural_finish() {
        let log: Log = Default::default();
        let mut timeout = Timeout::new(Probe::new("quick", &log, 1), Duration::from_secs(5));

        let start = Instant::now();
        timeout.init(start).unwrap();
        assert!(tick(&mut timeout, start));
        timeout.end(false);

        assert!(log.borrow().contains(&"quick.end(false)".to_owned()));
    }

    #[test]
    fn interrupt_on_fires() {
        let log: Log = Default::default();
        let fire = Rc::new(RefCell::new(false));

        let flag = fire.clone();
        let mut command = InterruptOn::new(Probe::new("a", &log, 100), move || *flag.borrow());

        let now = Instant::now();
        command.init(now).unwrap();
        assert!(!tick(&mut command, now));

        *fire.borrow_mut() = true;
        assert!(tick(&mut command, now));
        command.end(false);

        assert!(log.borrow().contains(&"a.end(true)".to_owned()));
        // The child never executed after the predicate fired
        assert_eq!(log.borrow().iter().filter(|it| *it == "a.exec").count(), 1);
    }

    #[test]
    fn repeat_until_rebuilds_from_the_factory() {
        let log: Log = Default::default();
        let instances = Rc::new(RefCell::new(0u32));

        let counter = instances.clone();
        let factory_log = log.clone();
        let until_counter = instances.clone();

        let mut repeat = RepeatUntil::new(
            move || {
                *counter.borrow_mut() += 1;
                Probe::new("body", &factory_log, 1)
            },
            move || *until_counter.borrow() >= 3,
        );

        let now = Instant::now();
        repeat.init(now).unwrap();
        assert!(!tick(&mut repeat, now));
        assert!(!tick(&mut repeat, now));
        assert!(tick(&mut repeat, now));
        repeat.end(false);

        assert_eq!(*instances.borrow(), 3);
        assert_eq!(
            log.borrow().iter().filter(|it| *it == "body.init").count(),
            3
        );
    }

    #[test]
    fn requirement_union() {
        let log: Log = Default::default();
        let sequence = Sequence::new(vec![
            Probe::with_requirements("a", &log, 1, Resources::DRIVETRAIN),
            Probe::with_requirements("b", &log, 1, Resources::ELEVATOR),
        ]);

        assert_eq!(
            sequence.requirements(),
            Resources::DRIVETRAIN | Resources::ELEVATOR
        );
    }
}
