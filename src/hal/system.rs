//! Core level operations: interrupt masking, reset and the hand-off to the
//! next stage.
use crate::utilities::memory::{EntryPoint, KeyRegion};

pub trait System {
    fn disable_interrupts(&mut self);
    fn enable_interrupts(&mut self);
    fn reset(&mut self) -> !;

    /// Quiesces the debug console before control leaves the loader.
    fn release_console(&mut self) {}

    /// Copies key material into retained, access restricted memory so that
    /// the next stage can find it.
    fn retain_keys(&mut self, region: KeyRegion);

    /// Transfers control to `entry`.
    ///
    /// # Safety
    ///
    /// `entry` must point at the code of a valid next stage image. The
    /// caller gives up every guarantee the loader established.
    unsafe fn jump(&mut self, entry: EntryPoint) -> !;
}
