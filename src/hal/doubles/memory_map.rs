use super::flash::FakeFlash;
use crate::{
    devices::{
        firmware::Bank,
        memory_map::{BootPolicy, DfuWait, EraseStep, EraseTarget, MemoryMap, PartitionLayout},
    },
    hal::{flash::FlashBank, otp::OtpBlock, time::Milliseconds},
    utilities::memory::{Address, EntryPoint, Region},
};

/// Scaled down dual bank layout over a 256KB fake flash.
pub static TEST_MEMORY_MAP: MemoryMap = MemoryMap {
    bootloader: Region { start: Address(0x0800_0000), size: 0x8000 },
    flip: PartitionLayout {
        bank: Bank::Flip,
        header: Address(0x0800_8000),
        base: Address(0x0802_0000),
        size: 0x1000,
        firmware_entry: EntryPoint(0x0802_0189),
        dfu_entry: EntryPoint(0x0802_0989),
        flash_bank: FlashBank::One,
    },
    flop: PartitionLayout {
        bank: Bank::Flop,
        header: Address(0x0801_0000),
        base: Address(0x0803_0000),
        size: 0x1000,
        firmware_entry: EntryPoint(0x0803_0189),
        dfu_entry: EntryPoint(0x0803_0989),
        flash_bank: FlashBank::Two,
    },
    erase_plan: &[
        EraseStep {
            label: "keybags",
            targets: &[EraseTarget::Sector(Address(0x0801_8000))],
            marker: OtpBlock(0),
        },
        EraseStep {
            label: "dfu",
            targets: &[
                EraseTarget::Sector(Address(0x0803_8000)),
                EraseTarget::Sector(Address(0x0803_C000)),
            ],
            marker: OtpBlock(1),
        },
        EraseStep {
            label: "kernels",
            targets: &[
                EraseTarget::Sector(Address(0x0802_0000)),
                EraseTarget::Sector(Address(0x0803_0000)),
            ],
            marker: OtpBlock(2),
        },
        EraseStep {
            label: "headers",
            targets: &[
                EraseTarget::Sector(Address(0x0800_8000)),
                EraseTarget::Sector(Address(0x0800_C000)),
                EraseTarget::Sector(Address(0x0801_0000)),
                EraseTarget::Sector(Address(0x0801_4000)),
            ],
            marker: OtpBlock(3),
        },
    ],
};

pub const TEST_POLICY: BootPolicy = BootPolicy {
    rdp_check: true,
    dfu_wait: Some(DfuWait { windows: 2, window: Milliseconds(100) }),
    retained_keys: None,
};

pub fn test_flash() -> FakeFlash { FakeFlash::new(Address(0x0800_0000), 0x40000) }
