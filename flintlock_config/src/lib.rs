//! This flintlock sub-crate contains all definitions to help generate
//! final flintlock binaries.
//!
//! NOTE: This code is not included anywhere from flintlock itself! This
//! is a dependency of the flintlock **build script**. The build script
//! uses this dependency to help generate the code that flintlock includes
//! (memory map, boot policy, erase plan and linker script).

use std::fmt::Display;

use boot::{BootConfiguration, Dfu};
use erase::{ErasePlan, EraseTarget, OTP_BLOCKS};
use itertools::Itertools;
use memory::{MemoryMap, Region};
use port::Port;
use serde::{Deserialize, Serialize};

pub mod boot;
pub mod codegen;
pub mod erase;
pub mod memory;
pub mod port;

/// Bytes taken by the signature header at the start of a firmware record.
pub const SIGNATURE_HEADER_SIZE: u32 = 192;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub port: Port,
    pub memory_map: MemoryMap,
    #[serde(default)]
    pub boot: BootConfiguration,
    pub erase_plan: ErasePlan,
}

impl Configuration {
    pub fn complete(&self) -> bool { self.problems().is_empty() }

    pub fn problems(&self) -> Vec<Problem> {
        let map = &self.memory_map;
        let (flash_start, flash_end) = self.port.flash_range();
        let flash = Region { start: flash_start, size: flash_end - flash_start };
        let inside_flash = |region: &Region| {
            flash.contains(region.start) && region.end() <= flash.end()
        };

        let partitions = [("flip", &map.flip), ("flop", &map.flop)];
        let mut problems = Vec::new();

        if !inside_flash(&map.bootloader) {
            problems.push(Problem::OutsideFlash("bootloader"));
        }

        if map.record_sector_size < SIGNATURE_HEADER_SIZE {
            problems.push(Problem::RecordSectorTooSmall);
        }

        for (name, partition) in partitions.iter() {
            let record = map.record(partition);
            if !inside_flash(&partition.region()) || !inside_flash(&record) {
                problems.push(Problem::OutsideFlash(name));
            }
            if partition.region().overlaps(&map.bootloader) || record.overlaps(&map.bootloader) {
                problems.push(Problem::OverlapsBootloader(name));
            }
            if !partition.region().contains(map.entry_point(partition.firmware_kernel))
                || !partition.region().contains(map.entry_point(partition.dfu_kernel))
            {
                problems.push(Problem::EntryOutsidePartition(name));
            }
            if partition.flash_bank == 0 || partition.flash_bank > self.port.flash_banks() {
                problems.push(Problem::UnknownFlashBank(name));
            }
        }

        let regions = [
            map.flip.region(),
            map.flop.region(),
            map.record(&map.flip),
            map.record(&map.flop),
        ];
        if regions.iter().tuple_combinations().any(|(a, b)| a.overlaps(b)) {
            problems.push(Problem::PartitionsOverlap);
        }

        if self.erase_plan.is_empty() || self.erase_plan.len() > OTP_BLOCKS as usize {
            problems.push(Problem::ErasePlanSize);
        }
        if !self.erase_plan.iter().map(|step| step.marker).all_unique()
            || self.erase_plan.iter().any(|step| step.marker >= OTP_BLOCKS)
        {
            problems.push(Problem::EraseMarkers);
        }
        let sectors = self.port.sectors();
        let bad_target = |target: &EraseTarget| match target {
            EraseTarget::Sector(address) => {
                match sectors.iter().find(|sector| sector.start == *address) {
                    Some(sector) => sector.overlaps(&map.bootloader),
                    None => true,
                }
            }
            EraseTarget::Bank(bank) => match self.port.bank(*bank) {
                Some(bank) => bank.overlaps(&map.bootloader),
                None => true,
            },
        };
        if self.erase_plan.iter().flat_map(|step| step.targets.iter()).any(bad_target) {
            problems.push(Problem::EraseTargets);
        }

        if let Dfu::Enabled { windows, window_ms } = self.boot.dfu {
            if windows == 0 || window_ms == 0 {
                problems.push(Problem::DfuWindows);
            }
        }

        problems
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Problem {
    OutsideFlash(&'static str),
    OverlapsBootloader(&'static str),
    EntryOutsidePartition(&'static str),
    UnknownFlashBank(&'static str),
    PartitionsOverlap,
    RecordSectorTooSmall,
    ErasePlanSize,
    EraseMarkers,
    EraseTargets,
    DfuWindows,
}

impl Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Problem::OutsideFlash(name) => {
                write!(f, "[Memory Map] `{}` does not fit in the target flash", name)
            }
            Problem::OverlapsBootloader(name) => {
                write!(f, "[Memory Map] `{}` overlaps the bootloader region", name)
            }
            Problem::EntryOutsidePartition(name) => {
                write!(f, "[Memory Map] `{}` has a kernel entry point outside its partition", name)
            }
            Problem::UnknownFlashBank(name) => {
                write!(f, "[Memory Map] `{}` refers to a flash bank the target lacks", name)
            }
            Problem::PartitionsOverlap => {
                f.write_str("[Memory Map] Partitions and firmware records must not overlap")
            }
            Problem::RecordSectorTooSmall => {
                f.write_str("[Memory Map] Record sector cannot hold a signature header")
            }
            Problem::ErasePlanSize => {
                f.write_str("[Erase Plan] Define between one and sixteen erase steps")
            }
            Problem::EraseMarkers => {
                f.write_str("[Erase Plan] Each step needs its own OTP marker block below 16")
            }
            Problem::EraseTargets => {
                f.write_str("[Erase Plan] Erase targets must be sector starts or existing banks, clear of the bootloader")
            }
            Problem::DfuWindows => f.write_str("[Boot] DFU wait needs at least one non-empty window"),
        }
    }
}
