//! # Simple GPIO interface
//!
//! The loader only ever reads one pin: the boot mode select button.

/// Interface to a readable pin.
pub trait InputPin {
    fn is_high(&self) -> bool;
    fn is_low(&self) -> bool;
}
