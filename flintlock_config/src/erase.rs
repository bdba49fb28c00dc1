use serde::{Deserialize, Serialize};

use crate::memory::hex;

/// Number of one-time-programmable blocks available as erase markers.
pub const OTP_BLOCKS: u8 = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseTarget {
    Sector(#[serde(with = "hex")] u32),
    Bank(u8),
}

/// A single resumable step of the mass erase. Its completion is recorded
/// in the OTP block `marker`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraseStep {
    pub label: String,
    pub targets: Vec<EraseTarget>,
    pub marker: u8,
}

pub type ErasePlan = Vec<EraseStep>;
