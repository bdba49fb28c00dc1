//! Host side test doubles for every hardware interface the loader consumes,
//! plus a small flash layout and image builder to exercise it with.
pub mod error;
pub mod firmware;
pub mod flash;
pub mod gpio;
pub mod memory_map;
pub mod otp;
pub mod rng;
pub mod system;
pub mod time;
