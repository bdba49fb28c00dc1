//! Hardware random number generator.
use core::fmt;

pub trait Rng {
    type Error: Clone + Copy + fmt::Debug;
    /// Returns `WouldBlock` until a fresh word, which passed the
    /// generator's health checks, is available.
    fn random_word(&mut self) -> nb::Result<u32, Self::Error>;
}
