//! Firmware authentication: header CRC and content hash.
//!
//! Both checks are mandatory and either failing is final. Verdicts are
//! reported as [`SecBool`], and every comparison that decides one is made
//! more than once through an out-of-line predicate.
use core::cmp::min;

use crc::{crc32, Hasher32};
use nb::block;
use sha2::{Digest, Sha256};

use crate::{
    devices::{
        firmware::{
            FirmwareHeader, FirmwareRecord, CRC_OFFSET, HASH_LEN, HEADER_SIZE, RECORD_SIZE,
            SIGNATURE_MAX_LEN,
        },
        memory_map::PartitionLayout,
    },
    error::{Convertible, Error},
    hal::flash,
    utilities::{logging::warn, memory::Address, secbool::SecBool},
};

// Generic buffer to hold temporary slices read from flash memory.
const BUFFER_SIZE: usize = 256;

/// Visits `size` bytes of flash starting at `start`, one buffer at a time.
/// The callback receives the offset of each chunk from `start`.
fn stream<F, V>(flash: &mut F, start: Address, size: usize, mut visit: V) -> Result<(), Error>
where
    F: flash::Read,
    F::Error: Convertible,
    V: FnMut(usize, &mut [u8]),
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut offset = 0;
    while offset < size {
        let chunk = &mut buffer[..min(BUFFER_SIZE, size - offset)];
        block!(flash.read(start + offset, chunk))?;
        visit(offset, chunk);
        offset += chunk.len();
    }
    Ok(())
}

/// CRC-32 of the whole record at `location`, with the `crc32`, `hash` and
/// signature fields read as `0xFF` filler. Those fields are written after
/// the CRC is sealed, so the stored value stays reproducible.
pub fn header_crc<F>(flash: &mut F, location: Address) -> Result<u32, Error>
where
    F: flash::Read,
    F::Error: Convertible,
{
    let mut digest = crc32::Digest::new(crc32::IEEE);
    stream(flash, location, RECORD_SIZE, |offset, chunk| {
        for (index, byte) in chunk.iter_mut().enumerate() {
            if (CRC_OFFSET..HEADER_SIZE).contains(&(offset + index)) {
                *byte = 0xFF;
            }
        }
        digest.write(chunk);
    })?;
    Ok(digest.sum32())
}

#[inline(never)]
fn crc_matches(left: u32, right: u32) -> bool {
    core::hint::black_box(left) == core::hint::black_box(right)
}

/// Recomputes the record CRC and compares it with the stored one. A header
/// declaring a signature longer than its slot is rejected outright.
pub fn check_header_crc<F>(flash: &mut F, record: &FirmwareRecord) -> Result<SecBool, Error>
where
    F: flash::Read,
    F::Error: Convertible,
{
    if record.header.siglen as usize > SIGNATURE_MAX_LEN {
        warn!("Signature length {} exceeds {}", record.header.siglen, SIGNATURE_MAX_LEN);
        return Err(Error::SignatureTooLong);
    }

    let computed = header_crc(flash, record.location)?;
    let stored = record.header.crc32;

    // NOTE: Both comparisons must pass. They are separate calls on purpose
    // and must not be folded into one.
    if crc_matches(computed, stored) {
        if crc_matches(stored, computed) {
            return Ok(SecBool::TRUE);
        }
    }
    warn!("Header CRC mismatch: stored {}, computed {}", stored, computed);
    Ok(SecBool::FALSE)
}

/// SHA-256 over the big endian header fields followed by the whole
/// partition, padding included.
pub fn content_digest<F>(
    flash: &mut F,
    header: &FirmwareHeader,
    partition: &PartitionLayout,
) -> Result<[u8; HASH_LEN], Error>
where
    F: flash::Read,
    F::Error: Convertible,
{
    let mut hasher = Sha256::new();
    hasher.update(header.hashed_fields());
    stream(flash, partition.base, partition.size, |_, chunk| hasher.update(&chunk[..]))?;
    let mut digest = [0u8; HASH_LEN];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

/// Constant structure equality: every byte is visited whatever the
/// contents.
#[inline(never)]
fn digests_match(left: &[u8; HASH_LEN], right: &[u8; HASH_LEN]) -> bool {
    let difference = left.iter().zip(right.iter()).fold(0u8, |acc, (l, r)| acc | (l ^ r));
    core::hint::black_box(difference) == 0
}

/// Recomputes the content hash of `partition` and compares it with the one
/// recorded in its header.
pub fn check_fw_hash<F>(
    flash: &mut F,
    record: &FirmwareRecord,
    partition: &PartitionLayout,
) -> Result<SecBool, Error>
where
    F: flash::Read,
    F::Error: Convertible,
{
    if record.header.len as usize > partition.size {
        return Err(Error::FirmwareTooLarge);
    }

    let computed = content_digest(flash, &record.header, partition)?;
    let stored = &record.header.hash;

    // NOTE: Three independent comparisons, the second with its arguments
    // swapped. They must stay separate calls.
    if digests_match(&computed, stored) {
        if digests_match(stored, &computed) {
            if digests_match(&computed, stored) {
                return Ok(SecBool::TRUE);
            }
        }
    }
    warn!("Firmware hash mismatch");
    Ok(SecBool::FALSE)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        devices::firmware::{Bank, Bootable, PartitionType, BOOTABLE_OFFSET, HASH_OFFSET},
        hal::doubles::{
            firmware::{install, FirmwareImage},
            flash::FakeFlash,
            memory_map::{test_flash, TEST_MEMORY_MAP},
        },
    };

    fn installed(bank: Bank) -> (FakeFlash, FirmwareRecord) {
        let mut flash = test_flash();
        let record =
            install(&mut flash, TEST_MEMORY_MAP.partition(bank), &FirmwareImage::new(bank, 5));
        (flash, record)
    }

    #[test]
    fn recomputing_the_header_crc_reproduces_the_stored_value() {
        // Given
        let (mut flash, record) = installed(Bank::Flip);

        // When
        let first = header_crc(&mut flash, record.location).unwrap();
        let second = header_crc(&mut flash, record.location).unwrap();

        // Then
        assert_eq!(first, record.header.crc32);
        assert_eq!(second, first);
        assert!(check_header_crc(&mut flash, &record).unwrap().is_true());
    }

    #[test]
    fn header_crc_matches_known_vector() {
        // Given
        let mut flash = test_flash();
        let location = TEST_MEMORY_MAP.flip.header;
        let fields = [0xDEC0_DE00u32, 0, 5, 0x40, 72, 0x1000];
        for (index, field) in fields.iter().enumerate() {
            flash.write_bytes(location + index * 4, &field.to_le_bytes());
        }
        flash.write_bytes(location + CRC_OFFSET, &[0x12, 0x34, 0x56, 0x78, 0x9A]);
        flash.write_bytes(location + BOOTABLE_OFFSET, &Bootable::BOOTABLE.0.to_le_bytes());

        // Then
        assert_eq!(header_crc(&mut flash, location).unwrap(), 0xFCC4_0D89);
    }

    #[test]
    fn hash_and_signature_fields_do_not_affect_the_crc() {
        let (mut flash, record) = installed(Bank::Flip);
        flash.write_bytes(record.location + HASH_OFFSET, &[0u8; 64]);
        flash.write_bytes(record.location + HEADER_SIZE - 4, &[0u8; 4]);
        assert_eq!(header_crc(&mut flash, record.location).unwrap(), record.header.crc32);
    }

    #[test]
    fn tampered_headers_fail_the_crc_check() {
        // Given
        let (mut flash, record) = installed(Bank::Flop);
        flash.write_bytes(record.location + 8, &9u32.to_le_bytes());

        // When
        let tampered = FirmwareRecord::read(&mut flash, record.location).unwrap();

        // Then
        assert!(check_header_crc(&mut flash, &tampered).unwrap().is_false());
    }

    #[test]
    fn bootable_flag_is_covered_by_the_crc() {
        let (mut flash, record) = installed(Bank::Flop);
        flash.write_bytes(record.location + BOOTABLE_OFFSET, &Bootable::NOT_BOOTABLE.0.to_le_bytes());
        assert!(check_header_crc(&mut flash, &record).unwrap().is_false());
    }

    #[test]
    fn signature_longer_than_its_slot_is_rejected_before_the_crc() {
        // Given
        let mut image = FirmwareImage::new(Bank::Flip, 3);
        image.siglen = SIGNATURE_MAX_LEN as u32 + 1;
        let mut flash = test_flash();
        let record = install(&mut flash, &TEST_MEMORY_MAP.flip, &image);

        // Then
        assert_eq!(check_header_crc(&mut flash, &record), Err(Error::SignatureTooLong));

        image.siglen = SIGNATURE_MAX_LEN as u32;
        let record = install(&mut flash, &TEST_MEMORY_MAP.flip, &image);
        assert!(check_header_crc(&mut flash, &record).unwrap().is_true());
    }

    #[test]
    fn content_digest_matches_known_vector() {
        // Given
        let mut flash = test_flash();
        let partition = &TEST_MEMORY_MAP.flip;
        let payload: Vec<u8> = (0..0x40u8).collect();
        flash.write_bytes(partition.base, &payload);
        let mut header = installed(Bank::Flip).1.header;
        header.magic = 0xDEC0_DE00;
        header.partition = PartitionType::FLIP;
        header.version = 5;
        header.len = 0x40;
        header.siglen = 72;
        header.chunksize = 0x1000;

        // When
        let digest = content_digest(&mut flash, &header, partition).unwrap();

        // Then
        let expected = [
            0x97, 0xce, 0x36, 0xc5, 0xa8, 0xfa, 0x7d, 0xee, 0xcb, 0x56, 0x5c, 0x91, 0x4d, 0x23,
            0x6c, 0x8b, 0x1c, 0x7f, 0x07, 0xe3, 0x5a, 0x39, 0x3c, 0xee, 0x19, 0x19, 0x48, 0x90,
            0x2f, 0x40, 0x48, 0x67,
        ];
        assert_eq!(digest, expected);
    }

    #[test]
    fn untouched_payload_passes_the_hash_check() {
        let (mut flash, record) = installed(Bank::Flip);
        let verdict = check_fw_hash(&mut flash, &record, &TEST_MEMORY_MAP.flip).unwrap();
        assert!(verdict.is_true());
    }

    #[test]
    fn mutated_payload_fails_the_hash_check() {
        // Given
        let (mut flash, record) = installed(Bank::Flip);
        let partition = &TEST_MEMORY_MAP.flip;
        flash.write_bytes(partition.base + 3, &[0x00]);

        // When
        let verdict = check_fw_hash(&mut flash, &record, partition).unwrap();

        // Then
        assert!(verdict.is_false());
    }

    #[test]
    fn bytes_past_the_payload_are_still_covered() {
        let (mut flash, record) = installed(Bank::Flop);
        let partition = &TEST_MEMORY_MAP.flop;
        flash.write_bytes(partition.base + (partition.size - 1), &[0x00]);
        assert!(check_fw_hash(&mut flash, &record, partition).unwrap().is_false());
    }

    #[test]
    fn oversized_firmware_is_rejected_before_hashing() {
        let (mut flash, mut record) = installed(Bank::Flip);
        record.header.len = TEST_MEMORY_MAP.flip.size as u32 + 1;
        assert_eq!(
            check_fw_hash(&mut flash, &record, &TEST_MEMORY_MAP.flip),
            Err(Error::FirmwareTooLarge)
        );
    }

    #[test]
    fn digest_comparison_is_exact() {
        let digest = [0x5Au8; HASH_LEN];
        let mut other = digest;
        assert!(digests_match(&digest, &other));
        other[HASH_LEN - 1] ^= 0x01;
        assert!(!digests_match(&digest, &other));
        assert!(!digests_match(&other, &digest));
    }
}
