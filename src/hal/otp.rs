//! One-time-programmable memory, used by the loader as tamper evident
//! progress markers. Programming can only clear bits, and a locked block
//! cannot be programmed at all.
use core::fmt;

pub const OTP_BLOCKS: u8 = 16;
pub const OTP_BLOCK_SIZE: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct OtpBlock(pub u8);

pub trait Otp {
    type Error: Clone + Copy + fmt::Debug;
    /// Reads the first `bytes.len()` bytes of a block.
    fn read_block(&mut self, block: OtpBlock, bytes: &mut [u8]) -> nb::Result<(), Self::Error>;
    /// Programs the first `bytes.len()` bytes of a block.
    fn write_block(&mut self, block: OtpBlock, bytes: &[u8]) -> nb::Result<(), Self::Error>;
    fn lock_block(&mut self, block: OtpBlock) -> nb::Result<(), Self::Error>;
}
