use serde::{Deserialize, Serialize};

#[macro_export(local_inner_macros)]
macro_rules! KB {
    ($val:expr) => {
        $val * 1024
    };
}

/// Serde adapter for addresses and sizes written as hex strings
/// (`"0x08020000"`) in configuration files.
pub mod hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn parse(text: &str) -> Result<u32, String> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or_else(|| format!("`{}` is missing the 0x prefix", text))?;
        u32::from_str_radix(&digits.replace('_', ""), 16)
            .map_err(|e| format!("`{}` is not a valid hex value: {}", text, e))
    }

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:08X}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(with = "hex")]
    pub start: u32,
    #[serde(with = "hex")]
    pub size: u32,
}

impl Region {
    pub fn end(&self) -> u32 { self.start + self.size }
    pub fn contains(&self, address: u32) -> bool { address >= self.start && address < self.end() }
    pub fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// One of the two redundant firmware banks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Location of the persisted firmware record (signature header,
    /// padding, bootable flag, padding).
    #[serde(with = "hex")]
    pub header: u32,
    #[serde(with = "hex")]
    pub base: u32,
    #[serde(with = "hex")]
    pub size: u32,
    #[serde(with = "hex")]
    pub firmware_kernel: u32,
    #[serde(with = "hex")]
    pub dfu_kernel: u32,
    /// Physical flash bank (1-indexed) holding the partition.
    pub flash_bank: u8,
}

impl Partition {
    pub fn region(&self) -> Region { Region { start: self.base, size: self.size } }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMap {
    pub bootloader: Region,
    #[serde(with = "hex")]
    pub vector_table_size: u32,
    /// Size of the flash sector holding the signature header. The bootable
    /// flag occupies the sector right after it.
    #[serde(with = "hex")]
    pub record_sector_size: u32,
    pub flip: Partition,
    pub flop: Partition,
}

impl MemoryMap {
    /// Thumb entry point of a kernel placed at `base`.
    pub fn entry_point(&self, base: u32) -> u32 { base + self.vector_table_size + 1 }

    pub fn record(&self, partition: &Partition) -> Region {
        Region { start: partition.header, size: self.record_sector_size * 2 }
    }
}
