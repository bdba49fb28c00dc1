use std::fmt::Display;

use crate::{memory::Region, KB};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Port {
    Stm32F429,
}

impl Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Port::Stm32F429 => "stm32f429",
        })
    }
}

impl Port {
    /// Name of the cargo feature that selects this port.
    pub fn feature_name(&self) -> &'static str {
        match self {
            Port::Stm32F429 => "stm32f429",
        }
    }

    /// Full range of the internal flash, as `(start, end)`.
    pub fn flash_range(&self) -> (u32, u32) {
        match self {
            Port::Stm32F429 => (0x0800_0000, 0x0820_0000),
        }
    }

    /// Number of independently protectable flash banks.
    pub fn flash_banks(&self) -> u8 {
        match self {
            Port::Stm32F429 => 2,
        }
    }

    /// Region covered by flash bank `bank`, counting from one.
    pub fn bank(&self, bank: u8) -> Option<Region> {
        let (start, end) = self.flash_range();
        let size = (end - start) / self.flash_banks() as u32;
        match bank {
            0 => None,
            n if n > self.flash_banks() => None,
            n => Some(Region { start: start + (n as u32 - 1) * size, size }),
        }
    }

    /// Erasable sectors of the internal flash, in address order.
    pub fn sectors(&self) -> Vec<Region> {
        match self {
            Port::Stm32F429 => {
                let bank_layout = [
                    KB!(16), KB!(16), KB!(16), KB!(16), KB!(64),
                    KB!(128), KB!(128), KB!(128), KB!(128), KB!(128), KB!(128), KB!(128),
                ];
                (1..=self.flash_banks())
                    .filter_map(|bank| self.bank(bank))
                    .flat_map(|bank| {
                        bank_layout.iter().scan(bank.start, |start, size| {
                            let sector = Region { start: *start, size: *size };
                            *start += size;
                            Some(sector)
                        })
                    })
                    .collect()
            }
        }
    }

    /// RAM available to the loader. The flash area of the linker script
    /// comes from the configured bootloader region instead.
    pub fn ram(&self) -> LinkerArea {
        match self {
            Port::Stm32F429 => LinkerArea { origin: 0x2000_0000, size: KB!(192) },
        }
    }
}

pub struct LinkerArea {
    pub origin: u32,
    pub size: u32,
}
