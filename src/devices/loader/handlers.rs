//! Transition handlers. Each one passes its control flow checkpoint, does
//! its work on the context, and returns the next request.
use super::Loader;
use crate::{
    devices::{
        automaton::{Request, State},
        bank_selector,
        dispatcher::{self, ValidatedEntry},
        firmware::FirmwareRecord,
        flash_lock::{self, EraseProgress},
        traits::{Flash, Otp, Rng},
        validator,
    },
    error::Error,
    hal::{flash::ReadProtection, gpio::InputPin, system::System, time},
    utilities::{
        logging::{error, info, warn},
        secbool::SecBool,
    },
};

#[inline(never)]
fn is_chip_protected(level: ReadProtection) -> bool {
    core::hint::black_box(level.raw()) == ReadProtection::CHIP_PROTECTED.raw()
}

impl<F: Flash, O: Otp, R: Rng, B: InputPin, T: time::Now, S: System> Loader<F, O, R, B, T, S> {
    /// Refuses to go any further while a mass erase is unfinished or after
    /// one has completed. An interrupted erase is resumed first.
    pub(super) fn init(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::INIT)?;
        match flash_lock::erase_progress(&mut self.otp, self.memory_map.erase_plan)? {
            EraseProgress::Idle => Ok(Request::RDPCHECK),
            EraseProgress::Ongoing { next_step } => {
                warn!("Resuming interrupted mass erase at step {}", next_step);
                flash_lock::mass_erase(&mut self.flash, &mut self.otp, self.memory_map.erase_plan)?;
                Ok(Request::SECBREACH)
            }
            EraseProgress::Complete => {
                error!("Flash was mass erased, refusing to boot");
                Ok(Request::SECBREACH)
            }
        }
    }

    /// Hub state. Enforces the read protection level, then dispatches on
    /// the state it was entered from.
    pub(super) fn rdp_check(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::RDPCHECK)?;

        if self.policy.rdp_check {
            let level = self.flash.read_protection();
            if !is_chip_protected(level) || !is_chip_protected(self.flash.read_protection()) {
                error!("Read protection is {}, erasing flash", level.name());
                flash_lock::mass_erase(&mut self.flash, &mut self.otp, self.memory_map.erase_plan)?;
                return Err(Error::FlashUnprotected);
            }
        }

        match from {
            State::INIT => Ok(Request::DFUCHECK),
            State::DFUWAIT => Ok(Request::SELECTBANK),
            State::SELECTBANK => Ok(Request::CRCCHECK),
            State::HDRCRC => Ok(Request::INTEGRITYCHECK),
            State::FWINTEGRITY => Ok(Request::FLASHLOCK),
            State::FLASHLOCK => Ok(Request::BOOT),
            _ => Err(Error::ControlFlowViolation),
        }
    }

    /// Polls the boot mode select button, with interrupts enabled only for
    /// the duration of the wait.
    pub(super) fn dfu_wait(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::DFUWAIT)?;

        let wait = match self.policy.dfu_wait {
            Some(wait) => wait,
            None => {
                self.context.dfu_mode = SecBool::FALSE;
                return Ok(Request::RDPCHECK);
            }
        };

        self.system.enable_interrupts();
        let mut pressed = false;
        self.context.dfu_wait_remaining = wait.windows;
        while self.context.dfu_wait_remaining > 0 && !pressed {
            let start = self.clock.now();
            while self.clock.now() - start < wait.window {
                if self.button.is_high() {
                    pressed = true;
                    break;
                }
            }
            self.context.dfu_wait_remaining -= 1;
        }
        self.system.disable_interrupts();

        self.context.dfu_mode = SecBool::from(pressed);
        info!("DFU mode {}", self.context.dfu_mode.name());
        Ok(Request::RDPCHECK)
    }

    pub(super) fn select_bank(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::SELECTBANK)?;

        let flip = FirmwareRecord::read(&mut self.flash, self.memory_map.flip.header)?;
        let flop = FirmwareRecord::read(&mut self.flash, self.memory_map.flop.header)?;
        flip.dump(self.memory_map.flip.bank);
        flop.dump(self.memory_map.flop.bank);

        let selection = bank_selector::select_bank(&flip, &flop)?;
        self.context.bank = Some(selection.bank);
        self.context.firmware = Some(selection.firmware);
        self.context.boot_flip = selection.boot_flip;
        self.context.boot_flop = selection.boot_flop;
        Ok(Request::RDPCHECK)
    }

    pub(super) fn header_crc(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::HDRCRC)?;

        let firmware = self.context.firmware.ok_or(Error::FaultDetected)?;
        let verdict = validator::check_header_crc(&mut self.flash, &firmware)?;
        // NOTE: Checked twice on purpose. Do not merge.
        if verdict.is_true() {
            if verdict.is_true() {
                return Ok(Request::RDPCHECK);
            }
        }
        Err(Error::CrcInvalid)
    }

    pub(super) fn firmware_integrity(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::FWINTEGRITY)?;

        let firmware = self.context.firmware.ok_or(Error::FaultDetected)?;
        let bank = self.context.bank.ok_or(Error::FaultDetected)?;
        let partition = self.memory_map.partition(bank);
        let verdict = validator::check_fw_hash(&mut self.flash, &firmware, partition)?;
        // NOTE: Checked twice on purpose. Do not merge.
        if verdict.is_true() {
            if verdict.is_true() {
                return Ok(Request::RDPCHECK);
            }
        }
        Err(Error::HashInvalid)
    }

    pub(super) fn flash_lock(&mut self, from: State) -> Result<Request, Error> {
        self.checkpoint(from, State::FLASHLOCK)?;

        let entry = flash_lock::apply_boot_policy(
            &mut self.flash,
            self.memory_map,
            self.context.boot_flip,
            self.context.boot_flop,
            self.context.dfu_mode,
        )?;
        self.context.next_stage = Some(entry);
        Ok(Request::RDPCHECK)
    }

    /// Last step before the jump: the entry point must be one of the four
    /// the memory map declares.
    pub(super) fn boot_firmware(&mut self, from: State) -> Result<ValidatedEntry, Error> {
        self.checkpoint(from, State::BOOTFW)?;

        let entry = self.context.next_stage.ok_or(Error::InvalidEntryPoint)?;
        let validated = dispatcher::validate(self.memory_map, entry)?;
        info!("Next stage at {}", validated.entry().0);
        Ok(validated)
    }
}
