//! Interface to the internal flash controller.
//!
//! Erase and program operations follow the `nb` convention: a call either
//! completes, or returns `WouldBlock` while the controller is busy and must
//! be called again with the same arguments.
use crate::utilities::memory::Address;
use core::fmt;

/// Physical flash bank, as seen by the write protection option bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum FlashBank {
    One,
    Two,
}

/// Chip level read-out protection. Encoded as far apart patterns so that a
/// glitched read cannot turn a weak level into the strongest one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReadProtection(u32);

impl ReadProtection {
    /// Flash contents can be read out through the debug port.
    pub const DEACTIVATED: ReadProtection = ReadProtection(0x8560_6B8C);
    /// Debug access is allowed but flash reads through it are blocked.
    pub const MEMORY_PROTECTED: ReadProtection = ReadProtection(0x7590_9B7C);
    /// Debug access is permanently disabled.
    pub const CHIP_PROTECTED: ReadProtection = ReadProtection(0x8A6F_6483);

    pub const fn raw(self) -> u32 { self.0 }
    pub const fn from_raw(raw: u32) -> Self { ReadProtection(raw) }

    pub fn name(self) -> &'static str {
        match self {
            Self::DEACTIVATED => "deactivated",
            Self::MEMORY_PROTECTED => "memory protected",
            Self::CHIP_PROTECTED => "chip protected",
            _ => "unknown",
        }
    }
}

/// Reads a range of bytes.
pub trait Read {
    type Error: Clone + Copy + fmt::Debug;
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error>;
}

/// Key protected control of the flash controller and its option bytes.
pub trait Control: Read {
    /// Control register key sequence. Required before erasing or programming.
    fn unlock(&mut self);
    fn lock(&mut self);
    /// Option byte key sequence. Required before changing write protection.
    fn unlock_options(&mut self);
    /// Commits any pending option byte change, then relocks them.
    fn lock_options(&mut self);

    fn erase_sector(&mut self, sector: Address) -> nb::Result<(), Self::Error>;
    fn erase_bank(&mut self, bank: FlashBank) -> nb::Result<(), Self::Error>;
    fn program_word(&mut self, address: Address, word: u32) -> nb::Result<(), Self::Error>;
    fn program_dword(&mut self, address: Address, dword: u64) -> nb::Result<(), Self::Error>;

    fn read_protection(&mut self) -> ReadProtection;
}

/// Write protection option bytes. Only effective inside an option byte
/// unlock/lock bracket.
pub trait WriteProtection: Control {
    fn write_lock_bank(&mut self, bank: FlashBank);
    fn write_unlock_bank(&mut self, bank: FlashBank);
    fn write_lock_bootloader(&mut self);
}
