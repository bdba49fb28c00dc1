//! Complex modules with business logic related to the problem
//! domain, that lay on top of abstract drivers. Devices are
//! generic, while board specifics (registers, pins, clocks) are
//! handled in the `ports` module.

pub mod automaton;
pub mod bank_selector;
pub mod controlflow;
pub mod dispatcher;
pub mod firmware;
pub mod flash_lock;
pub mod loader;
pub mod memory_map;
pub mod validator;

/// General purpose traits that summarize requirements on devices.
pub mod traits {
    use crate::{error, hal::{flash, otp, rng}};
    use marker_blanket::marker_blanket;

    /// A supported flash must be readable, erasable and write protectable,
    /// and report errors the loader understands.
    #[marker_blanket]
    pub trait Flash:
        flash::WriteProtection + flash::Control + flash::Read<Error: error::Convertible>
    {
    }

    /// One-time-programmable memory holding the erase progress markers.
    #[marker_blanket]
    pub trait Otp: otp::Otp<Error: error::Convertible> {}

    /// Source of the control flow seed.
    #[marker_blanket]
    pub trait Rng: rng::Rng<Error: error::Convertible> {}
}
