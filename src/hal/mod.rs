//! Hardware Abstraction Layer, containing interfaces
//! for the low level drivers the loader consumes.
#![macro_use]

pub mod flash;
pub mod gpio;
pub mod otp;
pub mod rng;
pub mod system;
pub mod time;

#[cfg(not(target_arch = "arm"))]
#[doc(hidden)]
pub mod doubles;
