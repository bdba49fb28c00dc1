use super::error::FakeError;
use crate::hal::otp::{Otp, OtpBlock, OTP_BLOCKS, OTP_BLOCK_SIZE};

/// One-time-programmable memory: writes can only clear bits, and locked
/// blocks reject writes.
#[derive(Clone, Debug)]
pub struct FakeOtp {
    pub blocks: [[u8; OTP_BLOCK_SIZE]; OTP_BLOCKS as usize],
    pub locked: [bool; OTP_BLOCKS as usize],
    pub writes: usize,
}

impl Default for FakeOtp {
    fn default() -> Self {
        Self {
            blocks: [[0xFF; OTP_BLOCK_SIZE]; OTP_BLOCKS as usize],
            locked: [false; OTP_BLOCKS as usize],
            writes: 0,
        }
    }
}

impl FakeOtp {
    fn index(block: OtpBlock, length: usize) -> nb::Result<usize, FakeError> {
        if block.0 < OTP_BLOCKS && length <= OTP_BLOCK_SIZE {
            Ok(block.0 as usize)
        } else {
            Err(nb::Error::Other(FakeError))
        }
    }
}

impl Otp for FakeOtp {
    type Error = FakeError;

    fn read_block(&mut self, block: OtpBlock, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        let index = Self::index(block, bytes.len())?;
        bytes.copy_from_slice(&self.blocks[index][..bytes.len()]);
        Ok(())
    }

    fn write_block(&mut self, block: OtpBlock, bytes: &[u8]) -> nb::Result<(), Self::Error> {
        let index = Self::index(block, bytes.len())?;
        if self.locked[index] {
            return Err(nb::Error::Other(FakeError));
        }
        self.blocks[index].iter_mut().zip(bytes).for_each(|(cell, byte)| *cell &= *byte);
        self.writes += 1;
        Ok(())
    }

    fn lock_block(&mut self, block: OtpBlock) -> nb::Result<(), Self::Error> {
        let index = Self::index(block, 0)?;
        self.locked[index] = true;
        Ok(())
    }
}
