//! Flash layout the loader is built around. The constants at the bottom
//! are generated at build time from the RON configuration.
use crate::{
    devices::firmware::Bank,
    hal::{flash::FlashBank, otp::OtpBlock, time::Milliseconds},
    utilities::memory::{Address, EntryPoint, KeyRegion, Region},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PartitionLayout {
    pub bank: Bank,
    /// Location of the persisted firmware record.
    pub header: Address,
    pub base: Address,
    pub size: usize,
    pub firmware_entry: EntryPoint,
    pub dfu_entry: EntryPoint,
    pub flash_bank: FlashBank,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EraseTarget {
    Sector(Address),
    Bank(FlashBank),
}

/// One resumable step of the mass erase, marked done in `marker`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EraseStep {
    pub label: &'static str,
    pub targets: &'static [EraseTarget],
    pub marker: OtpBlock,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryMap {
    pub bootloader: Region,
    pub flip: PartitionLayout,
    pub flop: PartitionLayout,
    pub erase_plan: &'static [EraseStep],
}

impl MemoryMap {
    pub fn partition(&self, bank: Bank) -> &PartitionLayout {
        match bank {
            Bank::Flip => &self.flip,
            Bank::Flop => &self.flop,
        }
    }

    /// The only four addresses the loader ever jumps to.
    pub fn entry_points(&self) -> [EntryPoint; 4] {
        [self.flip.firmware_entry, self.flop.firmware_entry, self.flip.dfu_entry, self.flop.dfu_entry]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DfuWait {
    pub windows: u32,
    pub window: Milliseconds,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootPolicy {
    pub rdp_check: bool,
    pub dfu_wait: Option<DfuWait>,
    pub retained_keys: Option<KeyRegion>,
}

include!(concat!(env!("OUT_DIR"), "/layout.rs"));
