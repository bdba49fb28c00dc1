//! Internal flash controller of the STM32F429 in dual bank mode.
//!
//! Erase and program operations spin on the busy flag until the controller
//! is done, then check and clear its error flags.
use crate::{
    error::{Convertible, Error as LoaderError},
    hal::flash::{self, FlashBank, ReadProtection},
    stm32pac::FLASH,
    utilities::{
        bitwise::BitFlags,
        memory::{Address, Region},
    },
};
use core::ptr;

/// Control register key sequence.
const UNLOCK_KEYS: [u32; 2] = [0x4567_0123, 0xCDEF_89AB];
/// Option byte key sequence.
const OPTION_KEYS: [u32; 2] = [0x0819_2A3B, 0x4C5D_6E7F];

mod sr {
    pub const OPERR: u8 = 1;
    pub const WRPERR: u8 = 4;
    pub const PGAERR: u8 = 5;
    pub const PGPERR: u8 = 6;
    pub const PGSERR: u8 = 7;
    pub const RDERR: u8 = 8;
    pub const BSY: u8 = 16;
    pub const ERRORS: u32 = (1 << OPERR)
        | (1 << WRPERR)
        | (1 << PGAERR)
        | (1 << PGPERR)
        | (1 << PGSERR)
        | (1 << RDERR);
}

mod cr {
    pub const PG: u32 = 1 << 0;
    pub const SER: u32 = 1 << 1;
    pub const MER: u32 = 1 << 2;
    pub const SNB_SHIFT: u32 = 3;
    pub const SNB_MASK: u32 = 0x1F << SNB_SHIFT;
    pub const PSIZE_X32: u32 = 0b10 << 8;
    pub const PSIZE_MASK: u32 = 0b11 << 8;
    pub const MER1: u32 = 1 << 15;
    pub const STRT: u32 = 1 << 16;
    pub const LOCK: u32 = 1 << 31;
}

mod optcr {
    pub const OPTLOCK: u32 = 1 << 0;
    pub const OPTSTRT: u32 = 1 << 1;
    pub const RDP_SHIFT: u32 = 8;
    pub const NWRP_SHIFT: u32 = 16;
    /// nWRP bits of one bank. A cleared bit write protects its sector.
    pub const NWRP_MASK: u32 = 0xFFF << NWRP_SHIFT;
}

/// Raw RDP option byte values.
const RDP_LEVEL_0: u8 = 0xAA;
const RDP_LEVEL_2: u8 = 0xCC;

/// Sector layout of the 2MB dual bank part. Sectors 12 to 23 sit in bank 2.
const SECTORS: [(u32, usize); 24] = [
    (0x0800_0000, kb!(16)),
    (0x0800_4000, kb!(16)),
    (0x0800_8000, kb!(16)),
    (0x0800_C000, kb!(16)),
    (0x0801_0000, kb!(64)),
    (0x0802_0000, kb!(128)),
    (0x0804_0000, kb!(128)),
    (0x0806_0000, kb!(128)),
    (0x0808_0000, kb!(128)),
    (0x080A_0000, kb!(128)),
    (0x080C_0000, kb!(128)),
    (0x080E_0000, kb!(128)),
    (0x0810_0000, kb!(16)),
    (0x0810_4000, kb!(16)),
    (0x0810_8000, kb!(16)),
    (0x0810_C000, kb!(16)),
    (0x0811_0000, kb!(64)),
    (0x0812_0000, kb!(128)),
    (0x0814_0000, kb!(128)),
    (0x0816_0000, kb!(128)),
    (0x0818_0000, kb!(128)),
    (0x081A_0000, kb!(128)),
    (0x081C_0000, kb!(128)),
    (0x081E_0000, kb!(128)),
];
const SECTORS_PER_BANK: usize = 12;

#[derive(Copy, Clone, Debug)]
pub enum Error {
    /// Address outside main flash, or not a sector boundary.
    MemoryNotReachable,
    MisalignedAccess,
    /// The controller raised one of its error flags.
    Operation(u32),
}

impl Convertible for Error {
    fn into_error(self) -> LoaderError {
        LoaderError::DriverError(match self {
            Error::MemoryNotReachable => "MCU flash memory not reachable",
            Error::MisalignedAccess => "MCU flash memory access misaligned",
            Error::Operation(_) => "MCU flash operation failed",
        })
    }
}

pub struct McuFlash {
    flash: FLASH,
    /// Region write locked by `write_lock_bootloader`.
    bootloader: Region,
}

fn sector_index(address: Address) -> Option<usize> {
    SECTORS.iter().position(|(start, _)| *start == address.0)
}

/// Sector number as encoded in the SNB field.
fn sector_number(index: usize) -> u32 {
    if index < SECTORS_PER_BANK {
        index as u32
    } else {
        0x10 | (index - SECTORS_PER_BANK) as u32
    }
}

fn flash_range() -> Region {
    let (last_start, last_size) = SECTORS[SECTORS.len() - 1];
    let start = Address(SECTORS[0].0);
    Region { start, size: (last_start as usize + last_size) - start.0 as usize }
}

impl McuFlash {
    pub fn new(flash: FLASH, bootloader: Region) -> Self { Self { flash, bootloader } }

    fn is_busy(&self) -> bool { self.flash.sr.read().bits().is_set(sr::BSY) }

    fn wait_until_done(&self) {
        while self.is_busy() {}
    }

    /// Checks, then clears, the error flags of the last operation.
    fn take_errors(&mut self) -> Result<(), Error> {
        let status = self.flash.sr.read().bits() & sr::ERRORS;
        if status == 0 {
            return Ok(());
        }
        self.flash.sr.write(|w| unsafe { w.bits(status) });
        Err(Error::Operation(status))
    }

    /// Starts an erase with the given control bits and waits for it.
    fn erase(&mut self, bits: u32) -> nb::Result<(), Error> {
        if self.is_busy() {
            return Err(nb::Error::WouldBlock);
        }
        self.take_errors()?;
        self.flash.cr.modify(|r, w| unsafe {
            w.bits((r.bits() & !(cr::SNB_MASK | cr::PSIZE_MASK)) | cr::PSIZE_X32 | bits)
        });
        self.flash.cr.modify(|r, w| unsafe { w.bits(r.bits() | cr::STRT) });
        self.wait_until_done();
        self.flash
            .cr
            .modify(|r, w| unsafe { w.bits(r.bits() & !(cr::SER | cr::MER | cr::MER1 | cr::SNB_MASK)) });
        Ok(self.take_errors()?)
    }

    fn program(&mut self, address: Address, word: u32) -> nb::Result<(), Error> {
        if address.0 % 4 != 0 {
            return Err(nb::Error::Other(Error::MisalignedAccess));
        }
        if !flash_range().contains(address) {
            return Err(nb::Error::Other(Error::MemoryNotReachable));
        }
        if self.is_busy() {
            return Err(nb::Error::WouldBlock);
        }
        self.take_errors()?;
        self.flash.cr.modify(|r, w| unsafe {
            w.bits((r.bits() & !cr::PSIZE_MASK) | cr::PSIZE_X32 | cr::PG)
        });
        // NOTE(Safety): The address was checked to be an aligned word of
        // main flash, and the controller is in programming mode.
        unsafe { ptr::write_volatile(address.0 as *mut u32, word) };
        self.wait_until_done();
        self.flash.cr.modify(|r, w| unsafe { w.bits(r.bits() & !cr::PG) });
        Ok(self.take_errors()?)
    }

    /// Rewrites the nWRP bits of one bank's option register.
    fn set_write_protection(&mut self, bank: FlashBank, protect: bool) {
        let update = |bits: u32| {
            if protect {
                bits & !optcr::NWRP_MASK
            } else {
                bits | optcr::NWRP_MASK
            }
        };
        match bank {
            FlashBank::One => self.flash.optcr.modify(|r, w| unsafe { w.bits(update(r.bits())) }),
            FlashBank::Two => self.flash.optcr1.modify(|r, w| unsafe { w.bits(update(r.bits())) }),
        }
    }
}

impl flash::Read for McuFlash {
    type Error = Error;

    fn read(&mut self, address: Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        let range = flash_range();
        if !range.contains(address) || (address + bytes.len()) > range.end() {
            return Err(nb::Error::Other(Error::MemoryNotReachable));
        }
        for (offset, byte) in bytes.iter_mut().enumerate() {
            // NOTE(Safety): Main flash is memory mapped, and the whole range
            // was checked to lie inside it.
            *byte = unsafe { ptr::read_volatile((address.0 as *const u8).add(offset)) };
        }
        Ok(())
    }
}

impl flash::Control for McuFlash {
    fn unlock(&mut self) {
        if self.flash.cr.read().bits() & cr::LOCK != 0 {
            self.flash.keyr.write(|w| unsafe { w.bits(UNLOCK_KEYS[0]) });
            self.flash.keyr.write(|w| unsafe { w.bits(UNLOCK_KEYS[1]) });
        }
    }

    fn lock(&mut self) { self.flash.cr.modify(|r, w| unsafe { w.bits(r.bits() | cr::LOCK) }); }

    fn unlock_options(&mut self) {
        if self.flash.optcr.read().bits() & optcr::OPTLOCK != 0 {
            self.flash.optkeyr.write(|w| unsafe { w.bits(OPTION_KEYS[0]) });
            self.flash.optkeyr.write(|w| unsafe { w.bits(OPTION_KEYS[1]) });
        }
    }

    fn lock_options(&mut self) {
        if self.flash.optcr.read().bits() & optcr::OPTLOCK == 0 {
            self.wait_until_done();
            self.flash.optcr.modify(|r, w| unsafe { w.bits(r.bits() | optcr::OPTSTRT) });
            self.wait_until_done();
        }
        self.flash.optcr.modify(|r, w| unsafe { w.bits(r.bits() | optcr::OPTLOCK) });
    }

    fn erase_sector(&mut self, sector: Address) -> nb::Result<(), Self::Error> {
        let index = sector_index(sector).ok_or(nb::Error::Other(Error::MemoryNotReachable))?;
        self.erase(cr::SER | (sector_number(index) << cr::SNB_SHIFT))
    }

    fn erase_bank(&mut self, bank: FlashBank) -> nb::Result<(), Self::Error> {
        match bank {
            FlashBank::One => self.erase(cr::MER),
            FlashBank::Two => self.erase(cr::MER1),
        }
    }

    fn program_word(&mut self, address: Address, word: u32) -> nb::Result<(), Self::Error> {
        self.program(address, word)
    }

    fn program_dword(&mut self, address: Address, dword: u64) -> nb::Result<(), Self::Error> {
        self.program(address, dword as u32)?;
        self.program(address + 4, (dword >> 32) as u32)
    }

    fn read_protection(&mut self) -> ReadProtection {
        match (self.flash.optcr.read().bits() >> optcr::RDP_SHIFT) as u8 {
            RDP_LEVEL_0 => ReadProtection::DEACTIVATED,
            RDP_LEVEL_2 => ReadProtection::CHIP_PROTECTED,
            _ => ReadProtection::MEMORY_PROTECTED,
        }
    }
}

impl flash::WriteProtection for McuFlash {
    fn write_lock_bank(&mut self, bank: FlashBank) { self.set_write_protection(bank, true) }

    fn write_unlock_bank(&mut self, bank: FlashBank) { self.set_write_protection(bank, false) }

    fn write_lock_bootloader(&mut self) {
        let bootloader = self.bootloader;
        let (mut bank_one, mut bank_two) = (0u32, 0u32);
        for (index, (start, size)) in SECTORS.iter().enumerate() {
            let sector = Region { start: Address(*start), size: *size };
            let overlaps = sector.start < bootloader.end() && bootloader.start < sector.end();
            if overlaps && index < SECTORS_PER_BANK {
                bank_one |= 1 << (optcr::NWRP_SHIFT as usize + index);
            } else if overlaps {
                bank_two |= 1 << (optcr::NWRP_SHIFT as usize + index - SECTORS_PER_BANK);
            }
        }
        self.flash.optcr.modify(|r, w| unsafe { w.bits(r.bits() & !bank_one) });
        self.flash.optcr1.modify(|r, w| unsafe { w.bits(r.bits() & !bank_two) });
    }
}
