//! # Flintlock
//!
//! First stage loader for dual-bank Cortex-M microcontrollers. At every
//! power-on it decides which of the two firmware banks (FLIP and FLOP) is
//! authentic, not rolled back and intact, write-protects flash and jumps to
//! it, while resisting fault injection attempts to skip or forge any of
//! those decisions.
//!
//! This crate contains all functionality in library form. The binary in
//! `src/bin/flintlock.rs` only constructs a port and runs the loader.
#![cfg_attr(test, allow(unused_imports))]
#![cfg_attr(target_arch = "arm", no_std)]

#[cfg(all(target_arch = "arm", feature = "stm32f429"))]
pub use stm32f4::stm32f429 as stm32pac;

#[macro_use]
pub mod utilities {
    pub mod bitwise;
    pub mod logging;
    mod macros;
    pub mod memory;
    pub mod secbool;
}

pub mod devices;
pub mod error;
pub mod hal;
pub mod ports;
