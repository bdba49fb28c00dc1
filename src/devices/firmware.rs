//! Persisted firmware record of a bank.
//!
//! Each bank keeps, at a fixed flash location, one record spanning two
//! sectors: the signature header, padded to the end of the first sector,
//! then the bootable flag, padded to the end of the second one. Integers are
//! stored little endian.
use core::mem::size_of;

use nb::block;
use static_assertions::const_assert;

use crate::{
    devices::memory_map::RECORD_SECTOR_SIZE,
    error::{Convertible, Error},
    hal::flash,
    utilities::{logging::debug, memory::Address},
};

/// Room reserved for the signature, enough for any supported curve.
pub const SIGNATURE_MAX_LEN: usize = 132;
pub const HASH_LEN: usize = 32;

pub const CRC_OFFSET: usize = 6 * size_of::<u32>();
pub const HASH_OFFSET: usize = CRC_OFFSET + size_of::<u32>();
pub const SIGNATURE_OFFSET: usize = HASH_OFFSET + HASH_LEN;
pub const HEADER_SIZE: usize = SIGNATURE_OFFSET + SIGNATURE_MAX_LEN;

pub const BOOTABLE_OFFSET: usize = RECORD_SECTOR_SIZE;
pub const RECORD_SIZE: usize = 2 * RECORD_SECTOR_SIZE;

const_assert!(HEADER_SIZE == 192);
const_assert!(HEADER_SIZE <= RECORD_SECTOR_SIZE);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Bank {
    Flip,
    Flop,
}

impl Bank {
    pub fn partition_type(self) -> PartitionType {
        match self {
            Bank::Flip => PartitionType::FLIP,
            Bank::Flop => PartitionType::FLOP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Bank::Flip => "FLIP",
            Bank::Flop => "FLOP",
        }
    }
}

/// Bank a firmware image was built for, as recorded in its header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PartitionType(pub u32);

impl PartitionType {
    pub const FLIP: PartitionType = PartitionType(0);
    pub const FLOP: PartitionType = PartitionType(1);
}

/// Bootable flag. Anything but the exact `BOOTABLE` sentinel means the bank
/// must not be booted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bootable(pub u32);

impl Bootable {
    pub const BOOTABLE: Bootable = Bootable(0x5374_7421);
    pub const NOT_BOOTABLE: Bootable = Bootable(0x5E19_BE55);

    #[inline(never)]
    pub fn is_bootable(self) -> bool { core::hint::black_box(self.0) == Self::BOOTABLE.0 }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub magic: u32,
    pub partition: PartitionType,
    pub version: u32,
    pub len: u32,
    pub siglen: u32,
    pub chunksize: u32,
    pub crc32: u32,
    pub hash: [u8; HASH_LEN],
    pub signature: [u8; SIGNATURE_MAX_LEN],
}

fn word_at(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; size_of::<u32>()];
    word.copy_from_slice(&bytes[offset..offset + size_of::<u32>()]);
    u32::from_le_bytes(word)
}

impl FirmwareHeader {
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&bytes[HASH_OFFSET..SIGNATURE_OFFSET]);
        let mut signature = [0u8; SIGNATURE_MAX_LEN];
        signature.copy_from_slice(&bytes[SIGNATURE_OFFSET..HEADER_SIZE]);
        Self {
            magic: word_at(bytes, 0),
            partition: PartitionType(word_at(bytes, 4)),
            version: word_at(bytes, 8),
            len: word_at(bytes, 12),
            siglen: word_at(bytes, 16),
            chunksize: word_at(bytes, 20),
            crc32: word_at(bytes, CRC_OFFSET),
            hash,
            signature,
        }
    }

    /// Big endian encoding of the fields covered by the content hash.
    pub fn hashed_fields(&self) -> [u8; CRC_OFFSET] {
        let mut bytes = [0u8; CRC_OFFSET];
        let fields = [
            self.magic,
            self.partition.0,
            self.version,
            self.len,
            self.siglen,
            self.chunksize,
        ];
        for (chunk, field) in bytes.chunks_exact_mut(size_of::<u32>()).zip(fields.iter()) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
        bytes
    }
}

/// A bank's record as read from flash.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FirmwareRecord {
    pub header: FirmwareHeader,
    pub bootable: Bootable,
    pub location: Address,
}

impl FirmwareRecord {
    pub fn read<F>(flash: &mut F, location: Address) -> Result<Self, Error>
    where
        F: flash::Read,
        F::Error: Convertible,
    {
        let mut header = [0u8; HEADER_SIZE];
        block!(flash.read(location, &mut header))?;
        let mut bootable = [0u8; size_of::<u32>()];
        block!(flash.read(location + BOOTABLE_OFFSET, &mut bootable))?;
        Ok(Self {
            header: FirmwareHeader::parse(&header),
            bootable: Bootable(u32::from_le_bytes(bootable)),
            location,
        })
    }

    pub fn dump(&self, bank: Bank) {
        let header = &self.header;
        debug!(
            "{} record: magic {} type {} version {} len {} siglen {} chunksize {} crc {} bootable {}",
            bank.name(),
            header.magic,
            header.partition.0,
            header.version,
            header.len,
            header.siglen,
            header.chunksize,
            header.crc32,
            self.bootable.0
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::doubles::{firmware::encode_header, flash::FakeFlash};

    fn sample_header() -> FirmwareHeader {
        FirmwareHeader {
            magic: 0xDEC0_DE00,
            partition: PartitionType::FLOP,
            version: 7,
            len: 0x400,
            siglen: 72,
            chunksize: 0x1000,
            crc32: 0x1122_3344,
            hash: [0xAB; HASH_LEN],
            signature: [0x5A; SIGNATURE_MAX_LEN],
        }
    }

    #[test]
    fn header_fields_sit_at_their_offsets() {
        let bytes = encode_header(&sample_header());
        assert_eq!(&bytes[8..12], &7u32.to_le_bytes());
        assert_eq!(&bytes[CRC_OFFSET..HASH_OFFSET], &0x1122_3344u32.to_le_bytes());
        assert_eq!(bytes[HASH_OFFSET], 0xAB);
        assert_eq!(bytes[SIGNATURE_OFFSET], 0x5A);
        assert_eq!(FirmwareHeader::parse(&bytes), sample_header());
    }

    #[test]
    fn hashed_fields_are_big_endian() {
        let fields = sample_header().hashed_fields();
        assert_eq!(&fields[0..4], &[0xDE, 0xC0, 0xDE, 0x00]);
        assert_eq!(&fields[8..12], &[0, 0, 0, 7]);
        assert_eq!(&fields[20..24], &[0, 0, 0x10, 0]);
    }

    #[test]
    fn records_are_read_with_their_bootable_flag() {
        // Given
        let mut flash = FakeFlash::new(Address(0x0800_0000), 0x40000);
        let location = Address(0x0800_8000);
        flash.write_bytes(location, &encode_header(&sample_header()));
        flash.write_bytes(location + BOOTABLE_OFFSET, &Bootable::BOOTABLE.0.to_le_bytes());

        // When
        let record = FirmwareRecord::read(&mut flash, location).unwrap();

        // Then
        assert_eq!(record.header, sample_header());
        assert!(record.bootable.is_bootable());
        assert_eq!(record.location, location);
    }

    #[test]
    fn only_the_exact_sentinel_is_bootable() {
        assert!(Bootable::BOOTABLE.is_bootable());
        assert!(!Bootable::NOT_BOOTABLE.is_bootable());
        assert!(!Bootable(Bootable::BOOTABLE.0 ^ 0x8000).is_bootable());
        assert!(!Bootable(0xFFFF_FFFF).is_bootable());
    }
}
