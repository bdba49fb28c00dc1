use super::flash::FakeFlash;
use crate::{
    devices::{
        firmware::{
            Bank, Bootable, FirmwareHeader, FirmwareRecord, PartitionType, BOOTABLE_OFFSET,
            CRC_OFFSET, HASH_LEN, HASH_OFFSET, HEADER_SIZE, RECORD_SIZE, SIGNATURE_MAX_LEN,
            SIGNATURE_OFFSET,
        },
        memory_map::PartitionLayout,
        validator,
    },
    utilities::memory::Address,
};

pub const TEST_MAGIC: u32 = 0xDEC0_DE00;

/// Everything needed to lay a bank's image and record down in flash.
#[derive(Clone, Debug)]
pub struct FirmwareImage {
    pub magic: u32,
    pub partition: PartitionType,
    pub version: u32,
    pub bootable: Bootable,
    pub payload: Vec<u8>,
    pub siglen: u32,
    pub chunksize: u32,
}

impl FirmwareImage {
    /// Bootable image built for `bank`, with a payload that differs per
    /// version.
    pub fn new(bank: Bank, version: u32) -> Self {
        Self {
            magic: TEST_MAGIC,
            partition: bank.partition_type(),
            version,
            bootable: Bootable::BOOTABLE,
            payload: (0..0x200u32).map(|i| (i * 7 + version) as u8).collect(),
            siglen: 72,
            chunksize: 0x1000,
        }
    }
}

pub fn encode_header(header: &FirmwareHeader) -> [u8; HEADER_SIZE] {
    let mut bytes = [0xFFu8; HEADER_SIZE];
    let fields = [
        header.magic,
        header.partition.0,
        header.version,
        header.len,
        header.siglen,
        header.chunksize,
        header.crc32,
    ];
    for (chunk, field) in bytes[..HASH_OFFSET].chunks_exact_mut(4).zip(fields.iter()) {
        chunk.copy_from_slice(&field.to_le_bytes());
    }
    bytes[HASH_OFFSET..SIGNATURE_OFFSET].copy_from_slice(&header.hash);
    bytes[SIGNATURE_OFFSET..].copy_from_slice(&header.signature);
    bytes
}

/// Lays down `image` and a sealed record for `partition`, the way the
/// update agent would, and returns the record as the loader reads it.
pub fn install(
    flash: &mut FakeFlash,
    partition: &PartitionLayout,
    image: &FirmwareImage,
) -> FirmwareRecord {
    flash.write_bytes(partition.header, &vec![0xFF; RECORD_SIZE]);
    flash.write_bytes(partition.base, &vec![0xFF; partition.size]);
    flash.write_bytes(partition.base, &image.payload);

    let mut signature = [0xFFu8; SIGNATURE_MAX_LEN];
    signature.iter_mut().take(image.siglen as usize).for_each(|byte| *byte = 0x5A);
    let mut header = FirmwareHeader {
        magic: image.magic,
        partition: image.partition,
        version: image.version,
        len: image.payload.len() as u32,
        siglen: image.siglen,
        chunksize: image.chunksize,
        crc32: 0,
        hash: [0u8; HASH_LEN],
        signature,
    };
    header.hash = validator::content_digest(flash, &header, partition).unwrap();

    flash.write_bytes(partition.header, &encode_header(&header));
    flash.write_bytes(partition.header + BOOTABLE_OFFSET, &image.bootable.0.to_le_bytes());
    let crc = validator::header_crc(flash, partition.header).unwrap();
    flash.write_bytes(partition.header + CRC_OFFSET, &crc.to_le_bytes());

    FirmwareRecord::read(flash, partition.header).unwrap()
}

/// Overwrites a single word of a record, leaving its CRC stale.
pub fn patch_record(flash: &mut FakeFlash, location: Address, offset: usize, word: u32) {
    flash.write_bytes(location + offset, &word.to_le_bytes());
}
