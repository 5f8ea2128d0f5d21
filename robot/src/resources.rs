//! Mutually exclusive physical resources commands may claim

use bitflags::bitflags;

bitflags! {
    /// Set of physical resources a command requires
    ///
    /// The scheduler guarantees that at most one running command holds any
    /// given resource at a time.
    pub struct Resources: u8 {
        const DRIVETRAIN    = 0b0001;
        const ELEVATOR      = 0b0010;
        const ALGAE_INTAKE  = 0b0100;
        const ALGAE_BLASTER = 0b1000;
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources::empty()
    }
}
