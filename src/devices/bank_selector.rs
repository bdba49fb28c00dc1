//! Choice between the FLIP and FLOP banks.
//!
//! A lone bootable bank wins. When both are bootable, the strictly newer
//! version wins, which keeps the device from rolling back to the older image.
//! Every decision that changes which firmware runs is taken twice, through
//! separate calls to out-of-line predicates; the second evaluation
//! disagreeing with the first is reported as a fault.
use crate::{
    devices::firmware::{Bank, FirmwareRecord},
    error::Error,
    utilities::{
        logging::{info, warn},
        secbool::SecBool,
    },
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub bank: Bank,
    pub firmware: FirmwareRecord,
    pub boot_flip: SecBool,
    pub boot_flop: SecBool,
}

impl Selection {
    fn of(bank: Bank, firmware: &FirmwareRecord) -> Self {
        let flip = bank == Bank::Flip;
        Self {
            bank,
            firmware: *firmware,
            boot_flip: SecBool::from(flip),
            boot_flop: SecBool::from(!flip),
        }
    }
}

#[inline(never)]
fn is_bootable(firmware: &FirmwareRecord) -> bool { firmware.bootable.is_bootable() }

#[inline(never)]
fn is_newer(candidate: &FirmwareRecord, other: &FirmwareRecord) -> bool {
    core::hint::black_box(candidate.header.version) > core::hint::black_box(other.header.version)
}

#[inline(never)]
fn built_for(firmware: &FirmwareRecord, bank: Bank) -> bool {
    core::hint::black_box(firmware.header.partition) == bank.partition_type()
}

pub fn select_bank(flip: &FirmwareRecord, flop: &FirmwareRecord) -> Result<Selection, Error> {
    let selection = match (is_bootable(flip), is_bootable(flop)) {
        (true, true) => {
            if !is_bootable(flip) || !is_bootable(flop) {
                return Err(Error::FaultDetected);
            }
            if is_newer(flip, flop) {
                if !is_newer(flip, flop) || is_newer(flop, flip) {
                    return Err(Error::FaultDetected);
                }
                Selection::of(Bank::Flip, flip)
            } else if is_newer(flop, flip) {
                if !is_newer(flop, flip) || is_newer(flip, flop) {
                    return Err(Error::FaultDetected);
                }
                Selection::of(Bank::Flop, flop)
            } else {
                warn!("Both banks hold version {}", flip.header.version);
                return Err(Error::RollbackDetected);
            }
        }
        (true, false) => {
            if !is_bootable(flip) || is_bootable(flop) {
                return Err(Error::FaultDetected);
            }
            Selection::of(Bank::Flip, flip)
        }
        (false, true) => {
            if is_bootable(flip) || !is_bootable(flop) {
                return Err(Error::FaultDetected);
            }
            Selection::of(Bank::Flop, flop)
        }
        (false, false) => return Err(Error::NoBootableBank),
    };

    // NOTE: Checked twice on purpose. Do not merge.
    if !built_for(&selection.firmware, selection.bank) {
        return Err(Error::PartitionMismatch);
    }
    if !built_for(&selection.firmware, selection.bank) {
        return Err(Error::FaultDetected);
    }

    info!("Selected {} version {}", selection.bank.name(), selection.firmware.header.version);
    Ok(selection)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        devices::firmware::{Bootable, PartitionType},
        hal::doubles::{
            firmware::{install, FirmwareImage},
            memory_map::{test_flash, TEST_MEMORY_MAP},
        },
    };

    fn record(bank: Bank, version: u32, bootable: Bootable) -> FirmwareRecord {
        let mut flash = test_flash();
        let mut image = FirmwareImage::new(bank, version);
        image.bootable = bootable;
        install(&mut flash, TEST_MEMORY_MAP.partition(bank), &image)
    }

    #[test]
    fn newer_version_wins_when_both_banks_are_bootable() {
        // Given
        let flip = record(Bank::Flip, 5, Bootable::BOOTABLE);
        let flop = record(Bank::Flop, 7, Bootable::BOOTABLE);

        // When
        let selection = select_bank(&flip, &flop).unwrap();

        // Then
        assert_eq!(selection.bank, Bank::Flop);
        assert_eq!(selection.firmware, flop);
        assert!(selection.boot_flop.is_true());
        assert!(selection.boot_flip.is_false());
    }

    #[test]
    fn swapping_versions_swaps_the_outcome() {
        let flip = record(Bank::Flip, 7, Bootable::BOOTABLE);
        let flop = record(Bank::Flop, 5, Bootable::BOOTABLE);

        let selection = select_bank(&flip, &flop).unwrap();

        assert_eq!(selection.bank, Bank::Flip);
        assert_eq!(selection.firmware.header.version, 7);
        assert!(selection.boot_flip.is_true());
        assert!(selection.boot_flop.is_false());
    }

    #[test]
    fn lone_bootable_bank_wins_regardless_of_version() {
        let flip = record(Bank::Flip, 9, Bootable::NOT_BOOTABLE);
        let flop = record(Bank::Flop, 2, Bootable::BOOTABLE);
        assert_eq!(select_bank(&flip, &flop).unwrap().bank, Bank::Flop);

        let flip = record(Bank::Flip, 1, Bootable::BOOTABLE);
        let flop = record(Bank::Flop, 2, Bootable(0xFFFF_FFFF));
        assert_eq!(select_bank(&flip, &flop).unwrap().bank, Bank::Flip);
    }

    #[test]
    fn equal_versions_are_treated_as_rollback() {
        let flip = record(Bank::Flip, 4, Bootable::BOOTABLE);
        let flop = record(Bank::Flop, 4, Bootable::BOOTABLE);
        assert_eq!(select_bank(&flip, &flop), Err(Error::RollbackDetected));
    }

    #[test]
    fn no_bootable_bank_is_a_breach() {
        let flip = record(Bank::Flip, 4, Bootable::NOT_BOOTABLE);
        let flop = record(Bank::Flop, 5, Bootable(Bootable::BOOTABLE.0 ^ 1));
        assert_eq!(select_bank(&flip, &flop), Err(Error::NoBootableBank));
    }

    #[test]
    fn header_built_for_the_other_bank_is_rejected() {
        // Given
        let flip = record(Bank::Flip, 3, Bootable::NOT_BOOTABLE);
        let mut flop = record(Bank::Flop, 8, Bootable::BOOTABLE);
        flop.header.partition = PartitionType::FLIP;

        // Then
        assert_eq!(select_bank(&flip, &flop), Err(Error::PartitionMismatch));
    }
}
