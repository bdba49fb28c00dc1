use serde::{Deserialize, Serialize};

use crate::memory::hex;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dfu {
    /// Poll the boot mode button for `windows` periods of `window_ms` each.
    Enabled { windows: u32, window_ms: u32 },
    Disabled,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedKeys {
    #[serde(with = "hex")]
    pub source: u32,
    pub length: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfiguration {
    /// Refuse to boot (and wipe the device) unless flash read-out protection
    /// is at its strongest level. Only development boards should disable it.
    pub rdp_check: bool,
    pub dfu: Dfu,
    pub retained_keys: Option<RetainedKeys>,
}

impl Default for BootConfiguration {
    fn default() -> Self {
        Self {
            rdp_check: true,
            dfu: Dfu::Enabled { windows: 2, window_ms: 1000 },
            retained_keys: None,
        }
    }
}
