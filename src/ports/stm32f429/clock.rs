//! Monotonic time from the DWT cycle counter.
use crate::hal::time::{self, Hertz, Milliseconds};
use cortex_m::peripheral::{DCB, DWT};

/// The loader never reconfigures clocks, so the core runs from the HSI.
pub const SYSTEM_CLOCK: Hertz = Hertz(16_000_000);

#[derive(Copy, Clone, Debug)]
pub struct Cycles(u32);

pub struct CycleCounter {
    _dwt: DWT,
}

impl CycleCounter {
    pub fn new(mut dwt: DWT, dcb: &mut DCB) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self { _dwt: dwt }
    }
}

impl time::Instant for Cycles {}

impl time::Now for CycleCounter {
    type I = Cycles;
    fn now(&self) -> Cycles { Cycles(DWT::get_cycle_count()) }
}

/// Elapsed time between two readings. Correct across one counter wrap,
/// which takes over four minutes at the HSI frequency.
impl core::ops::Sub for Cycles {
    type Output = Milliseconds;
    fn sub(self, rhs: Self) -> Milliseconds {
        Milliseconds(self.0.wrapping_sub(rhs.0) / SYSTEM_CLOCK.cycles_per_ms())
    }
}

impl core::ops::Add<Milliseconds> for Cycles {
    type Output = Self;
    fn add(self, rhs: Milliseconds) -> Self {
        Cycles(self.0.wrapping_add(rhs.0.wrapping_mul(SYSTEM_CLOCK.cycles_per_ms())))
    }
}
