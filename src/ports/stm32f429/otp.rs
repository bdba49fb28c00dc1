//! One-time-programmable area of the STM32F429: 16 blocks of 32 bytes, each
//! with a lock byte. Programmed a byte at a time through the flash
//! controller.
use crate::{
    error::{Convertible, Error as LoaderError},
    hal::otp::{self, OtpBlock, OTP_BLOCKS, OTP_BLOCK_SIZE},
    stm32pac::{flash::RegisterBlock, FLASH},
};
use core::ptr;

const OTP_BASE: usize = 0x1FFF_7800;
const LOCK_BASE: usize = 0x1FFF_7A00;
const UNLOCK_KEYS: [u32; 2] = [0x4567_0123, 0xCDEF_89AB];

const CR_PG: u32 = 1 << 0;
const CR_PSIZE_MASK: u32 = 0b11 << 8;
const CR_LOCK: u32 = 1 << 31;
const SR_BSY: u32 = 1 << 16;
const SR_ERRORS: u32 = 0x1F2;

#[derive(Copy, Clone, Debug)]
pub enum Error {
    BlockOutOfRange,
    BlockLocked,
    ProgrammingFailed,
}

impl Convertible for Error {
    fn into_error(self) -> LoaderError {
        LoaderError::DriverError(match self {
            Error::BlockOutOfRange => "OTP block out of range",
            Error::BlockLocked => "OTP block locked",
            Error::ProgrammingFailed => "OTP programming failed",
        })
    }
}

/// OTP memory. Shares the flash controller with
/// [`McuFlash`](super::flash::McuFlash), which never runs an operation
/// concurrently with it.
pub struct OtpMemory {
    _private: (),
}

impl OtpMemory {
    /// # Safety
    ///
    /// The caller must not drive the flash controller from anywhere else
    /// while an OTP operation runs.
    pub unsafe fn new() -> Self { Self { _private: () } }

    fn controller(&self) -> &RegisterBlock {
        // NOTE(Safety): Register block of a memory mapped peripheral, only
        // touched while no flash operation is in flight.
        unsafe { &*FLASH::ptr() }
    }

    fn check(block: OtpBlock, length: usize) -> Result<usize, Error> {
        if block.0 < OTP_BLOCKS && length <= OTP_BLOCK_SIZE {
            Ok(block.0 as usize)
        } else {
            Err(Error::BlockOutOfRange)
        }
    }

    fn is_locked(&self, index: usize) -> bool {
        // NOTE(Safety): Lock bytes are memory mapped and always readable.
        unsafe { ptr::read_volatile((LOCK_BASE + index) as *const u8) != 0xFF }
    }

    /// Programs bytes one by one, unlocking the controller for the duration
    /// if it was locked.
    fn program(&mut self, address: usize, bytes: &[u8]) -> Result<(), Error> {
        let flash = self.controller();
        while flash.sr.read().bits() & SR_BSY != 0 {}
        let relock = flash.cr.read().bits() & CR_LOCK != 0;
        if relock {
            flash.keyr.write(|w| unsafe { w.bits(UNLOCK_KEYS[0]) });
            flash.keyr.write(|w| unsafe { w.bits(UNLOCK_KEYS[1]) });
        }
        flash.sr.write(|w| unsafe { w.bits(SR_ERRORS) });
        flash.cr.modify(|r, w| unsafe { w.bits((r.bits() & !CR_PSIZE_MASK) | CR_PG) });

        let mut failed = false;
        for (offset, byte) in bytes.iter().enumerate() {
            // NOTE(Safety): Inside the OTP area, with the controller in
            // byte programming mode.
            unsafe { ptr::write_volatile((address + offset) as *mut u8, *byte) };
            while flash.sr.read().bits() & SR_BSY != 0 {}
            if flash.sr.read().bits() & SR_ERRORS != 0 {
                failed = true;
                break;
            }
        }

        flash.cr.modify(|r, w| unsafe { w.bits(r.bits() & !CR_PG) });
        flash.sr.write(|w| unsafe { w.bits(SR_ERRORS) });
        if relock {
            flash.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_LOCK) });
        }
        if failed {
            Err(Error::ProgrammingFailed)
        } else {
            Ok(())
        }
    }
}

impl otp::Otp for OtpMemory {
    type Error = Error;

    fn read_block(&mut self, block: OtpBlock, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        let index = Self::check(block, bytes.len())?;
        let base = (OTP_BASE + index * OTP_BLOCK_SIZE) as *const u8;
        for (offset, byte) in bytes.iter_mut().enumerate() {
            // NOTE(Safety): Within the checked block of the OTP area.
            *byte = unsafe { ptr::read_volatile(base.add(offset)) };
        }
        Ok(())
    }

    fn write_block(&mut self, block: OtpBlock, bytes: &[u8]) -> nb::Result<(), Self::Error> {
        let index = Self::check(block, bytes.len())?;
        if self.is_locked(index) {
            return Err(nb::Error::Other(Error::BlockLocked));
        }
        Ok(self.program(OTP_BASE + index * OTP_BLOCK_SIZE, bytes)?)
    }

    fn lock_block(&mut self, block: OtpBlock) -> nb::Result<(), Self::Error> {
        let index = Self::check(block, 0)?;
        if self.is_locked(index) {
            return Ok(());
        }
        Ok(self.program(LOCK_BASE + index, &[0x00])?)
    }
}
