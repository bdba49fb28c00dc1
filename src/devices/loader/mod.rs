//! Generic loader.
//!
//! This module contains the automaton driver and its transition handlers.
//! Construction is handled by the `ports` module as it depends on board
//! specific information.
//!
//! Every request is checked against the transition table before its
//! handler runs, and every handler passes a control flow checkpoint before
//! touching anything. The only ways out are a jump to a validated entry
//! point or a reset from one of the terminal states.
use crate::{
    devices::{
        automaton::{Automaton, Request, State},
        controlflow::ControlFlow,
        dispatcher::{self, ValidatedEntry},
        memory_map::{BootPolicy, MemoryMap},
        traits::{Flash, Otp, Rng},
    },
    error::Error,
    hal::{gpio::InputPin, system::System, time},
    utilities::logging::{debug, error},
};

pub mod context;
mod handlers;

use context::Context;

pub struct Loader<F: Flash, O: Otp, R: Rng, B: InputPin, T: time::Now, S: System> {
    pub(crate) flash: F,
    pub(crate) otp: O,
    pub(crate) rng: R,
    pub(crate) button: B,
    pub(crate) clock: T,
    pub(crate) system: S,
    pub(crate) automaton: Automaton,
    pub(crate) controlflow: ControlFlow,
    pub(crate) context: Context,
    pub(crate) memory_map: &'static MemoryMap,
    pub(crate) policy: &'static BootPolicy,
}

/// How a run of the automaton ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Exit {
    Boot(ValidatedEntry),
    /// A terminal state was reached.
    Reset(State),
}

impl<F: Flash, O: Otp, R: Rng, B: InputPin, T: time::Now, S: System> Loader<F, O, R, B, T, S> {
    /// Main loader routine. Decides, locks down flash and hands off, or
    /// resets the device.
    pub fn run(mut self) -> ! {
        self.system.disable_interrupts();
        match self.drive() {
            Exit::Boot(entry) => dispatcher::boot(&mut self.system, self.policy, entry),
            Exit::Reset(state) => {
                error!("Terminal state {} reached, resetting", state.name());
                self.system.reset()
            }
        }
    }

    /// Drives the automaton from START until it either boots or reaches a
    /// terminal state.
    pub fn drive(&mut self) -> Exit {
        self.controlflow = match ControlFlow::init_controlflow(&mut self.rng) {
            Ok(controlflow) => controlflow,
            Err(e) => panic!("FATAL: Failed to seed control flow tracker: {}", e.name()),
        };

        let mut request = Request::INIT;
        loop {
            let state = self.automaton.get_state();
            if !self.automaton.is_valid_transition(state, request) {
                return Exit::Reset(self.automaton.get_state());
            }
            let next = match self.automaton.next_state(state, request) {
                Some(next) => next,
                None => return Exit::Reset(State::ERROR),
            };
            debug!("{} -> {}", state.name(), next.name());

            let outcome = match next {
                State::INIT => self.init(state),
                State::RDPCHECK => self.rdp_check(state),
                State::DFUWAIT => self.dfu_wait(state),
                State::SELECTBANK => self.select_bank(state),
                State::HDRCRC => self.header_crc(state),
                State::FWINTEGRITY => self.firmware_integrity(state),
                State::FLASHLOCK => self.flash_lock(state),
                State::BOOTFW => match self.boot_firmware(state) {
                    Ok(entry) => return Exit::Boot(entry),
                    Err(e) => Err(e),
                },
                State::ERROR | State::SECBREACH => {
                    self.automaton.set_state(next);
                    return Exit::Reset(self.automaton.get_state());
                }
                _ => Err(Error::InvalidTransition),
            };

            request = match outcome {
                Ok(request) => request,
                Err(e) => {
                    error!("{} failed: {}", next.name(), e.name());
                    e.escalation()
                }
            };
        }
    }

    /// Folds `to` into the control flow accumulator and demands that it
    /// matches the canonical sequence, then commits the state. Nothing
    /// observable may happen in a handler before this passes.
    fn checkpoint(&mut self, from: State, to: State) -> Result<(), Error> {
        self.controlflow.update_flowstate(to);
        // NOTE: Checked twice on purpose. Do not merge.
        if !self.controlflow.calculate_flowstate(from, to).is_true() {
            error!("Control flow mismatch on {} -> {}", from.name(), to.name());
            return Err(Error::ControlFlowViolation);
        }
        if !self.controlflow.calculate_flowstate(from, to).is_true() {
            return Err(Error::ControlFlowViolation);
        }
        self.automaton.set_state(to);
        Ok(())
    }
}
