use super::error::FakeError;
use crate::{
    hal::flash::{self, FlashBank, ReadProtection},
    utilities::memory::Address,
};

/// Erase granularity of the fake. Sector erases clear this many bytes.
pub const FAKE_SECTOR_SIZE: usize = 0x4000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlashEvent {
    Unlock,
    Lock,
    UnlockOptions,
    LockOptions,
    EraseSector(Address),
    EraseBank(FlashBank),
    WriteLock(FlashBank),
    WriteUnlock(FlashBank),
    LockBootloader,
}

/// Write protection as committed to the option bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FakeWriteProtection {
    pub bank_one: bool,
    pub bank_two: bool,
    pub bootloader: bool,
}

/// Flash controller over a vector of bytes, split in two equally sized
/// banks. Every control operation is journaled in `events`.
pub struct FakeFlash {
    base: Address,
    data: Vec<u8>,
    pub events: Vec<FlashEvent>,
    pub rdp: ReadProtection,
    pub unlocked: bool,
    pub options_unlocked: bool,
    pub committed: FakeWriteProtection,
    pending: FakeWriteProtection,
    /// Erasing this sector fails, as if power was lost mid erase.
    pub failing_sector: Option<Address>,
    /// Each erase reports `WouldBlock` once before completing.
    pub busy_once: bool,
    busy: bool,
}

impl FakeFlash {
    pub fn new(base: Address, size: usize) -> Self {
        Self {
            base,
            data: vec![0xFF; size],
            events: Vec::new(),
            rdp: ReadProtection::CHIP_PROTECTED,
            unlocked: false,
            options_unlocked: false,
            committed: FakeWriteProtection::default(),
            pending: FakeWriteProtection::default(),
            failing_sector: None,
            busy_once: false,
            busy: false,
        }
    }

    fn range(&self, address: Address, length: usize) -> Option<core::ops::Range<usize>> {
        if address < self.base {
            return None;
        }
        let start = address - self.base;
        let end = start.checked_add(length)?;
        (end <= self.data.len()).then(|| start..end)
    }

    /// Writes bytes directly, bypassing the controller. For test setup.
    pub fn write_bytes(&mut self, address: Address, bytes: &[u8]) {
        let range = self.range(address, bytes.len()).expect("Write outside of fake flash");
        self.data[range].copy_from_slice(bytes);
    }

    pub fn bytes(&self, address: Address, length: usize) -> &[u8] {
        let range = self.range(address, length).expect("Read outside of fake flash");
        &self.data[range]
    }

    pub fn is_erased(&self, address: Address, length: usize) -> bool {
        self.bytes(address, length).iter().all(|byte| *byte == 0xFF)
    }

    pub fn erased_sectors(&self) -> Vec<Address> {
        self.events
            .iter()
            .filter_map(|event| match event {
                FlashEvent::EraseSector(sector) => Some(*sector),
                _ => None,
            })
            .collect()
    }

    fn bank_range(&self, bank: FlashBank) -> core::ops::Range<usize> {
        let half = self.data.len() / 2;
        match bank {
            FlashBank::One => 0..half,
            FlashBank::Two => half..self.data.len(),
        }
    }

    fn stall(&mut self) -> nb::Result<(), FakeError> {
        if self.busy_once && !self.busy {
            self.busy = true;
            return Err(nb::Error::WouldBlock);
        }
        self.busy = false;
        Ok(())
    }

    fn program(&mut self, address: Address, bytes: &[u8]) -> nb::Result<(), FakeError> {
        if !self.unlocked {
            return Err(nb::Error::Other(FakeError));
        }
        let range = self.range(address, bytes.len()).ok_or(nb::Error::Other(FakeError))?;
        self.data[range].iter_mut().zip(bytes).for_each(|(cell, byte)| *cell &= *byte);
        Ok(())
    }
}

impl flash::Read for FakeFlash {
    type Error = FakeError;
    fn read(&mut self, address: Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        let range = self.range(address, bytes.len()).ok_or(nb::Error::Other(FakeError))?;
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }
}

impl flash::Control for FakeFlash {
    fn unlock(&mut self) {
        self.unlocked = true;
        self.events.push(FlashEvent::Unlock);
    }

    fn lock(&mut self) {
        self.unlocked = false;
        self.events.push(FlashEvent::Lock);
    }

    fn unlock_options(&mut self) {
        self.options_unlocked = true;
        self.pending = self.committed;
        self.events.push(FlashEvent::UnlockOptions);
    }

    fn lock_options(&mut self) {
        if self.options_unlocked {
            self.committed = self.pending;
        }
        self.options_unlocked = false;
        self.events.push(FlashEvent::LockOptions);
    }

    fn erase_sector(&mut self, sector: Address) -> nb::Result<(), Self::Error> {
        if !self.unlocked || self.failing_sector == Some(sector) {
            return Err(nb::Error::Other(FakeError));
        }
        self.stall()?;
        let range = self.range(sector, FAKE_SECTOR_SIZE).ok_or(nb::Error::Other(FakeError))?;
        self.data[range].iter_mut().for_each(|byte| *byte = 0xFF);
        self.events.push(FlashEvent::EraseSector(sector));
        Ok(())
    }

    fn erase_bank(&mut self, bank: FlashBank) -> nb::Result<(), Self::Error> {
        if !self.unlocked {
            return Err(nb::Error::Other(FakeError));
        }
        self.stall()?;
        let range = self.bank_range(bank);
        self.data[range].iter_mut().for_each(|byte| *byte = 0xFF);
        self.events.push(FlashEvent::EraseBank(bank));
        Ok(())
    }

    fn program_word(&mut self, address: Address, word: u32) -> nb::Result<(), Self::Error> {
        self.program(address, &word.to_le_bytes())
    }

    fn program_dword(&mut self, address: Address, dword: u64) -> nb::Result<(), Self::Error> {
        self.program(address, &dword.to_le_bytes())
    }

    fn read_protection(&mut self) -> ReadProtection { self.rdp }
}

impl flash::WriteProtection for FakeFlash {
    fn write_lock_bank(&mut self, bank: FlashBank) {
        if self.options_unlocked {
            match bank {
                FlashBank::One => self.pending.bank_one = true,
                FlashBank::Two => self.pending.bank_two = true,
            }
        }
        self.events.push(FlashEvent::WriteLock(bank));
    }

    fn write_unlock_bank(&mut self, bank: FlashBank) {
        if self.options_unlocked {
            match bank {
                FlashBank::One => self.pending.bank_one = false,
                FlashBank::Two => self.pending.bank_two = false,
            }
        }
        self.events.push(FlashEvent::WriteUnlock(bank));
    }

    fn write_lock_bootloader(&mut self) {
        if self.options_unlocked {
            self.pending.bootloader = true;
        }
        self.events.push(FlashEvent::LockBootloader);
    }
}
