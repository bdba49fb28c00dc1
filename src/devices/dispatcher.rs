//! Hand-off to the next stage.
//!
//! The loader only ever jumps to one of the four entry points its memory map
//! declares. A [`ValidatedEntry`] can only be obtained by checking a
//! candidate against that list, so a corrupted dispatch target is rejected
//! before any side effect of the hand-off.
use crate::{
    devices::memory_map::{BootPolicy, MemoryMap},
    error::Error,
    hal::system::System,
    utilities::{
        logging::{error, info},
        memory::EntryPoint,
    },
};

/// An entry point known to be one of the memory map's four.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ValidatedEntry(EntryPoint);

impl ValidatedEntry {
    pub fn entry(&self) -> EntryPoint { self.0 }
}

#[inline(never)]
fn is_known(map: &MemoryMap, entry: EntryPoint) -> bool {
    map.entry_points().iter().any(|known| core::hint::black_box(known.0) == entry.0)
}

pub fn validate(map: &MemoryMap, entry: EntryPoint) -> Result<ValidatedEntry, Error> {
    // NOTE: Checked twice on purpose. Do not merge.
    if is_known(map, entry) {
        if is_known(map, entry) {
            return Ok(ValidatedEntry(entry));
        }
    }
    error!("Refusing to dispatch to {}", entry.0);
    Err(Error::InvalidEntryPoint)
}

/// Transfers control to the next stage. Never returns.
pub fn boot<S: System>(system: &mut S, policy: &BootPolicy, entry: ValidatedEntry) -> ! {
    system.disable_interrupts();
    info!("Booting next stage at {}", entry.0 .0);
    system.release_console();
    if let Some(keys) = policy.retained_keys {
        system.retain_keys(keys);
    }
    // SAFETY: `entry` is one of the memory map's entry points, and the
    // image behind it passed every check of the boot sequence.
    unsafe { system.jump(entry.0) }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        hal::doubles::{
            memory_map::{TEST_MEMORY_MAP, TEST_POLICY},
            system::{FakeSystem, SystemEvent},
        },
        utilities::memory::{Address, KeyRegion},
    };
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn only_the_four_declared_entry_points_validate() {
        for entry in TEST_MEMORY_MAP.entry_points() {
            assert_eq!(validate(&TEST_MEMORY_MAP, entry).unwrap().entry(), entry);
        }
        let flip = TEST_MEMORY_MAP.flip.firmware_entry.0;
        for bogus in [flip - 1, flip + 1, flip ^ 0x8000_0000, 0, TEST_MEMORY_MAP.flip.base.0] {
            assert_eq!(validate(&TEST_MEMORY_MAP, EntryPoint(bogus)), Err(Error::InvalidEntryPoint));
        }
    }

    #[test]
    fn boot_quiesces_the_core_before_jumping() {
        // Given
        let mut system = FakeSystem::default();
        let entry = validate(&TEST_MEMORY_MAP, TEST_MEMORY_MAP.flop.firmware_entry).unwrap();

        // When
        let outcome =
            catch_unwind(AssertUnwindSafe(|| boot(&mut system, &TEST_POLICY, entry)));

        // Then
        let message = *outcome.unwrap_err().downcast::<String>().unwrap();
        assert_eq!(message, "jump to 0x08030189");
        assert_eq!(system.events, vec![SystemEvent::DisableInterrupts, SystemEvent::ReleaseConsole]);
    }

    #[test]
    fn configured_keys_are_retained_before_the_jump() {
        let mut system = FakeSystem::default();
        let keys = KeyRegion { source: Address(0x0801_8000), length: 64 };
        let policy = BootPolicy { retained_keys: Some(keys), ..TEST_POLICY };
        let entry = validate(&TEST_MEMORY_MAP, TEST_MEMORY_MAP.flip.dfu_entry).unwrap();

        let _ = catch_unwind(AssertUnwindSafe(|| boot(&mut system, &policy, entry)));

        assert_eq!(system.events.last(), Some(&SystemEvent::RetainKeys(keys)));
    }
}
