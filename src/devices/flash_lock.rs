//! Write protection around the boot decision, and the resumable mass erase.
//!
//! Both the control register and the option bytes are only ever unlocked
//! through a [`Session`], which relocks them when it drops out of scope, no
//! matter the return path.
use core::ops::{Deref, DerefMut};

use nb::block;

use crate::{
    devices::{
        memory_map::{EraseStep, EraseTarget, MemoryMap},
        traits::{Flash, Otp},
    },
    error::Error,
    hal::{
        flash::Control,
        otp::{OtpBlock, OTP_BLOCK_SIZE},
    },
    utilities::{
        bitwise::SliceBitSubset,
        logging::{debug, error, info},
        memory::EntryPoint,
        secbool::SecBool,
    },
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scope {
    Control,
    Options,
}

/// Exclusive access to an unlocked flash controller. Relocks on drop.
pub struct Session<'a, F: Control> {
    flash: &'a mut F,
    scope: Scope,
}

impl<'a, F: Control> Session<'a, F> {
    /// Unlocks the control register, for erasing and programming.
    pub fn control(flash: &'a mut F) -> Self {
        flash.unlock();
        Self { flash, scope: Scope::Control }
    }

    /// Unlocks the option bytes. Changes are committed when the session
    /// ends.
    pub fn options(flash: &'a mut F) -> Self {
        flash.unlock_options();
        Self { flash, scope: Scope::Options }
    }
}

impl<'a, F: Control> Deref for Session<'a, F> {
    type Target = F;
    fn deref(&self) -> &F { self.flash }
}

impl<'a, F: Control> DerefMut for Session<'a, F> {
    fn deref_mut(&mut self) -> &mut F { self.flash }
}

impl<'a, F: Control> Drop for Session<'a, F> {
    fn drop(&mut self) {
        match self.scope {
            Scope::Control => self.flash.lock(),
            Scope::Options => self.flash.lock_options(),
        }
    }
}

#[inline(never)]
fn is_exact(flag: SecBool) -> bool { flag.is_true() || flag.is_false() }

/// Applies the write protection the boot decision calls for and returns the
/// entry point of the next stage.
///
/// Without DFU both banks are locked. In DFU mode, the selected bank stays
/// locked while the other one is opened for the update agent. The
/// bootloader region is always locked last.
pub fn apply_boot_policy<F: Flash>(
    flash: &mut F,
    map: &MemoryMap,
    boot_flip: SecBool,
    boot_flop: SecBool,
    dfu_mode: SecBool,
) -> Result<EntryPoint, Error> {
    let mut session = Session::options(flash);

    if !is_exact(dfu_mode) || !is_exact(boot_flip) || !is_exact(boot_flop) {
        error!("Corrupted boot flags");
        return Err(Error::FaultDetected);
    }
    if boot_flip.is_true() == boot_flop.is_true() || boot_flip.is_false() == boot_flop.is_false() {
        error!("Boot flags name {} banks", if boot_flip.is_true() { "both" } else { "no" });
        return Err(Error::FaultDetected);
    }

    let (flip, flop) = (map.flip.flash_bank, map.flop.flash_bank);
    let entry = if dfu_mode.is_true() {
        if !dfu_mode.is_true() || dfu_mode.is_false() {
            return Err(Error::FaultDetected);
        }
        if boot_flip.is_true() {
            if !boot_flip.is_true() || !boot_flop.is_false() {
                return Err(Error::FaultDetected);
            }
            session.write_lock_bank(flip);
            session.write_unlock_bank(flop);
            map.flip.dfu_entry
        } else {
            if !boot_flop.is_true() || !boot_flip.is_false() {
                return Err(Error::FaultDetected);
            }
            session.write_unlock_bank(flip);
            session.write_lock_bank(flop);
            map.flop.dfu_entry
        }
    } else {
        if !dfu_mode.is_false() || dfu_mode.is_true() {
            return Err(Error::FaultDetected);
        }
        session.write_lock_bank(flip);
        session.write_lock_bank(flop);
        if boot_flip.is_true() {
            if !boot_flip.is_true() || boot_flop.is_true() {
                return Err(Error::FaultDetected);
            }
            map.flip.firmware_entry
        } else {
            if !boot_flop.is_true() || boot_flip.is_true() {
                return Err(Error::FaultDetected);
            }
            map.flop.firmware_entry
        }
    };

    session.write_lock_bootloader();
    info!("Write protection applied, next stage at {}", entry.0);
    Ok(entry)
}

/// Contents of a marker block once its erase step has completed.
pub const ERASE_MARKER: [u8; OTP_BLOCK_SIZE] = {
    let pattern = SecBool::TRUE.raw().to_le_bytes();
    let mut marker = [0u8; OTP_BLOCK_SIZE];
    let mut i = 0;
    while i < OTP_BLOCK_SIZE {
        marker[i] = pattern[i % pattern.len()];
        i += 1;
    }
    marker
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EraseProgress {
    /// No marker was ever touched.
    Idle,
    /// Some steps are done or being marked. Resumes at `next_step`.
    Ongoing { next_step: usize },
    Complete,
}

fn read_marker<O: Otp>(otp: &mut O, block: OtpBlock) -> Result<[u8; OTP_BLOCK_SIZE], Error> {
    let mut marker = [0u8; OTP_BLOCK_SIZE];
    block!(otp.read_block(block, &mut marker))?;
    Ok(marker)
}

fn is_blank(marker: &[u8; OTP_BLOCK_SIZE]) -> bool { marker.iter().all(|byte| *byte == 0xFF) }

pub fn erase_progress<O: Otp>(otp: &mut O, plan: &[EraseStep]) -> Result<EraseProgress, Error> {
    let mut touched = false;
    let mut next_step = None;
    for (index, step) in plan.iter().enumerate() {
        let marker = read_marker(otp, step.marker)?;
        if marker == ERASE_MARKER {
            touched = true;
        } else {
            touched |= !is_blank(&marker);
            next_step.get_or_insert(index);
        }
    }
    Ok(match (touched, next_step) {
        (false, _) => EraseProgress::Idle,
        (true, Some(next_step)) => EraseProgress::Ongoing { next_step },
        (true, None) => EraseProgress::Complete,
    })
}

/// Whether a previous mass erase was interrupted before its last step.
pub fn mass_erase_ongoing<O: Otp>(otp: &mut O, plan: &[EraseStep]) -> Result<bool, Error> {
    Ok(matches!(erase_progress(otp, plan)?, EraseProgress::Ongoing { .. }))
}

/// Erases every step of `plan` whose marker is not yet complete, marking
/// and locking each marker as its step finishes. Completed steps are left
/// untouched, so an interrupted erase resumes exactly where it stopped.
pub fn mass_erase<F: Flash, O: Otp>(
    flash: &mut F,
    otp: &mut O,
    plan: &[EraseStep],
) -> Result<(), Error> {
    let mut session = Session::control(flash);
    let mut corrupted = false;

    for step in plan {
        let marker = read_marker(otp, step.marker)?;
        if marker == ERASE_MARKER {
            debug!("Erase step {} already done", step.label);
            block!(otp.lock_block(step.marker))?;
            continue;
        }

        info!("Erasing {}", step.label);
        for target in step.targets {
            match *target {
                EraseTarget::Sector(sector) => block!(session.erase_sector(sector))?,
                EraseTarget::Bank(bank) => block!(session.erase_bank(bank))?,
            }
        }

        // A marker can only be completed over contents the sentinel can
        // still be programmed onto.
        if !ERASE_MARKER[..].is_subset_of(&marker[..]) {
            error!("Marker of erase step {} cannot be completed", step.label);
            corrupted = true;
            continue;
        }
        block!(otp.write_block(step.marker, &ERASE_MARKER))?;
        block!(otp.lock_block(step.marker))?;
        debug!("Erase step {} marked", step.label);
    }

    if corrupted {
        Err(Error::EraseMarkerCorrupted)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        hal::{
            doubles::{
                flash::{FakeFlash, FakeWriteProtection, FlashEvent},
                memory_map::{test_flash, TEST_MEMORY_MAP},
                otp::FakeOtp,
            },
            flash::FlashBank,
        },
        utilities::memory::Address,
    };

    fn policy(
        flash: &mut FakeFlash,
        boot_flip: SecBool,
        dfu_mode: SecBool,
    ) -> Result<EntryPoint, Error> {
        let boot_flop = SecBool::from(!boot_flip.is_true());
        apply_boot_policy(flash, &TEST_MEMORY_MAP, boot_flip, boot_flop, dfu_mode)
    }

    fn plan_sectors(steps: &[EraseStep]) -> Vec<Address> {
        steps
            .iter()
            .flat_map(|step| step.targets.iter())
            .filter_map(|target| match target {
                EraseTarget::Sector(sector) => Some(*sector),
                EraseTarget::Bank(_) => None,
            })
            .collect()
    }

    fn mark_done(otp: &mut FakeOtp, steps: usize) {
        for step in &TEST_MEMORY_MAP.erase_plan[..steps] {
            otp.blocks[step.marker.0 as usize] = ERASE_MARKER;
            otp.locked[step.marker.0 as usize] = true;
        }
    }

    #[test]
    fn nominal_boot_locks_both_banks_then_the_bootloader() {
        // Given
        let mut flash = test_flash();

        // When
        let entry = policy(&mut flash, SecBool::FALSE, SecBool::FALSE).unwrap();

        // Then
        assert_eq!(entry, TEST_MEMORY_MAP.flop.firmware_entry);
        assert_eq!(flash.events, vec![
            FlashEvent::UnlockOptions,
            FlashEvent::WriteLock(FlashBank::One),
            FlashEvent::WriteLock(FlashBank::Two),
            FlashEvent::LockBootloader,
            FlashEvent::LockOptions,
        ]);
        assert!(flash.committed.bank_one && flash.committed.bank_two && flash.committed.bootloader);
        assert!(!flash.options_unlocked);
    }

    #[test]
    fn dfu_on_flip_opens_only_the_other_bank() {
        let mut flash = test_flash();

        let entry = policy(&mut flash, SecBool::TRUE, SecBool::TRUE).unwrap();

        assert_eq!(entry, TEST_MEMORY_MAP.flip.dfu_entry);
        assert_eq!(flash.events, vec![
            FlashEvent::UnlockOptions,
            FlashEvent::WriteLock(FlashBank::One),
            FlashEvent::WriteUnlock(FlashBank::Two),
            FlashEvent::LockBootloader,
            FlashEvent::LockOptions,
        ]);
        assert!(flash.committed.bank_one && !flash.committed.bank_two);
    }

    #[test]
    fn dfu_on_flop_opens_only_the_other_bank() {
        let mut flash = test_flash();

        let entry = policy(&mut flash, SecBool::FALSE, SecBool::TRUE).unwrap();

        assert_eq!(entry, TEST_MEMORY_MAP.flop.dfu_entry);
        assert_eq!(flash.events[1..3], [
            FlashEvent::WriteUnlock(FlashBank::One),
            FlashEvent::WriteLock(FlashBank::Two),
        ]);
        assert_eq!(flash.events.last(), Some(&FlashEvent::LockOptions));
    }

    #[test]
    fn corrupted_flags_abort_and_still_relock_options() {
        // Given
        let mut flash = test_flash();
        let glitched = SecBool::from_raw(SecBool::TRUE.raw() ^ 0x4);

        // When
        let result = policy(&mut flash, SecBool::TRUE, glitched);

        // Then
        assert_eq!(result, Err(Error::FaultDetected));
        assert_eq!(flash.events, vec![FlashEvent::UnlockOptions, FlashEvent::LockOptions]);
        assert_eq!(flash.committed, FakeWriteProtection::default());
    }

    #[test]
    fn agreeing_bank_flags_are_a_fault() {
        let mut flash = test_flash();
        let result =
            apply_boot_policy(&mut flash, &TEST_MEMORY_MAP, SecBool::TRUE, SecBool::TRUE, SecBool::FALSE);
        assert_eq!(result, Err(Error::FaultDetected));
        assert!(!flash.options_unlocked);
    }

    #[test]
    fn full_mass_erase_visits_every_step_in_order() {
        // Given
        let mut flash = test_flash();
        flash.busy_once = true;
        let mut otp = FakeOtp::default();
        let plan = TEST_MEMORY_MAP.erase_plan;

        // When
        mass_erase(&mut flash, &mut otp, plan).unwrap();

        // Then
        assert_eq!(flash.erased_sectors(), plan_sectors(plan));
        assert_eq!(flash.events.first(), Some(&FlashEvent::Unlock));
        assert_eq!(flash.events.last(), Some(&FlashEvent::Lock));
        for step in plan {
            assert_eq!(otp.blocks[step.marker.0 as usize], ERASE_MARKER);
            assert!(otp.locked[step.marker.0 as usize]);
        }
        assert_eq!(erase_progress(&mut otp, plan), Ok(EraseProgress::Complete));
    }

    #[test]
    fn interrupted_erase_resumes_at_the_first_pending_step() {
        // Given
        let mut flash = test_flash();
        let mut otp = FakeOtp::default();
        let plan = TEST_MEMORY_MAP.erase_plan;
        mark_done(&mut otp, 3);
        assert!(mass_erase_ongoing(&mut otp, plan).unwrap());
        assert_eq!(erase_progress(&mut otp, plan), Ok(EraseProgress::Ongoing { next_step: 3 }));

        // When
        mass_erase(&mut flash, &mut otp, plan).unwrap();

        // Then
        assert_eq!(flash.erased_sectors(), plan_sectors(&plan[3..]));
        assert!(!mass_erase_ongoing(&mut otp, plan).unwrap());
    }

    #[test]
    fn power_loss_mid_erase_leaves_the_step_pending() {
        // Given
        let mut flash = test_flash();
        let mut otp = FakeOtp::default();
        let plan = TEST_MEMORY_MAP.erase_plan;
        flash.failing_sector = Some(Address(0x0803_0000));

        // When
        let result = mass_erase(&mut flash, &mut otp, plan);

        // Then
        assert!(result.is_err());
        assert!(!flash.unlocked);
        assert_eq!(erase_progress(&mut otp, plan), Ok(EraseProgress::Ongoing { next_step: 2 }));

        // And the retry picks up the kernels again.
        flash.failing_sector = None;
        flash.events.clear();
        mass_erase(&mut flash, &mut otp, plan).unwrap();
        assert_eq!(flash.erased_sectors(), plan_sectors(&plan[2..]));
    }

    #[test]
    fn partially_written_marker_is_completed() {
        // Given
        let mut flash = test_flash();
        let mut otp = FakeOtp::default();
        let plan = TEST_MEMORY_MAP.erase_plan;
        otp.blocks[0][..8].copy_from_slice(&ERASE_MARKER[..8]);

        // When
        assert_eq!(erase_progress(&mut otp, plan), Ok(EraseProgress::Ongoing { next_step: 0 }));
        mass_erase(&mut flash, &mut otp, plan).unwrap();

        // Then
        assert_eq!(otp.blocks[0], ERASE_MARKER);
        assert_eq!(flash.erased_sectors(), plan_sectors(plan));
    }

    #[test]
    fn foreign_marker_contents_are_reported_but_later_steps_still_run() {
        // Given
        let mut flash = test_flash();
        let mut otp = FakeOtp::default();
        let plan = TEST_MEMORY_MAP.erase_plan;
        otp.blocks[1] = [0x00; OTP_BLOCK_SIZE];

        // When
        let result = mass_erase(&mut flash, &mut otp, plan);

        // Then
        assert_eq!(result, Err(Error::EraseMarkerCorrupted));
        assert_eq!(flash.erased_sectors(), plan_sectors(plan));
        assert_eq!(otp.blocks[3], ERASE_MARKER);
    }

    #[test]
    fn untouched_markers_mean_no_erase_ever_started() {
        let mut otp = FakeOtp::default();
        assert_eq!(erase_progress(&mut otp, TEST_MEMORY_MAP.erase_plan), Ok(EraseProgress::Idle));
        assert!(!mass_erase_ongoing(&mut otp, TEST_MEMORY_MAP.erase_plan).unwrap());
    }

    #[test]
    fn bank_targets_use_the_bank_erase() {
        static PLAN: [EraseStep; 1] = [EraseStep {
            label: "bank",
            targets: &[EraseTarget::Bank(FlashBank::Two)],
            marker: OtpBlock(5),
        }];
        let mut flash = FakeFlash::new(Address(0x0800_0000), 0x40000);
        flash.write_bytes(Address(0x0803_0000), &[0u8; 16]);
        let mut otp = FakeOtp::default();

        mass_erase(&mut flash, &mut otp, &PLAN).unwrap();

        assert!(flash.events.contains(&FlashEvent::EraseBank(FlashBank::Two)));
        assert!(flash.is_erased(Address(0x0803_0000), 16));
        assert!(otp.locked[5]);
    }
}
