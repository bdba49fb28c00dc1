//! Mutable state of one boot decision.
use crate::{
    devices::firmware::{Bank, FirmwareRecord},
    utilities::{memory::EntryPoint, secbool::SecBool},
};

/// Written only by the transition handlers, and discarded at the hand-off.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Context {
    /// Whether the boot mode select button was pressed.
    pub dfu_mode: SecBool,
    pub boot_flip: SecBool,
    pub boot_flop: SecBool,
    pub bank: Option<Bank>,
    pub firmware: Option<FirmwareRecord>,
    pub next_stage: Option<EntryPoint>,
    /// Button polling windows still to go.
    pub dfu_wait_remaining: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            dfu_mode: SecBool::FALSE,
            boot_flip: SecBool::FALSE,
            boot_flop: SecBool::FALSE,
            bank: None,
            firmware: None,
            next_stage: None,
            dfu_wait_remaining: 0,
        }
    }
}
