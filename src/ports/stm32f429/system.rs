//! Core level operations on the Cortex-M4, and retention of key material
//! in the battery backed SRAM.
use crate::{
    hal::system::System,
    stm32pac::{PWR, RCC},
    utilities::memory::{EntryPoint, KeyRegion},
};
use core::ptr;
use cortex_m::peripheral::SCB;

const APB1ENR_PWREN: u32 = 1 << 28;
const AHB1ENR_BKPSRAMEN: u32 = 1 << 18;
const PWR_CR_DBP: u32 = 1 << 8;

const BKPSRAM_BASE: usize = 0x4002_4000;
const BKPSRAM_SIZE: usize = 0x1000;

pub struct Core {
    rcc: RCC,
    pwr: PWR,
}

impl Core {
    pub fn new(rcc: RCC, pwr: PWR) -> Self { Self { rcc, pwr } }

    pub fn rcc(&self) -> &RCC { &self.rcc }
}

impl System for Core {
    fn disable_interrupts(&mut self) { cortex_m::interrupt::disable() }

    fn enable_interrupts(&mut self) {
        // NOTE(Safety): The loader installs no interrupt handlers that
        // could observe the boot decision.
        unsafe { cortex_m::interrupt::enable() }
    }

    fn reset(&mut self) -> ! { SCB::sys_reset() }

    fn retain_keys(&mut self, region: KeyRegion) {
        self.rcc.apb1enr.modify(|r, w| unsafe { w.bits(r.bits() | APB1ENR_PWREN) });
        self.pwr.cr.modify(|r, w| unsafe { w.bits(r.bits() | PWR_CR_DBP) });
        self.rcc.ahb1enr.modify(|r, w| unsafe { w.bits(r.bits() | AHB1ENR_BKPSRAMEN) });

        let length = core::cmp::min(region.length, BKPSRAM_SIZE);
        for offset in 0..length {
            // NOTE(Safety): The source region is configured memory, and the
            // destination stays within the powered backup SRAM.
            unsafe {
                let byte = ptr::read_volatile((region.source.0 as usize + offset) as *const u8);
                ptr::write_volatile((BKPSRAM_BASE + offset) as *mut u8, byte);
            }
        }

        self.pwr.cr.modify(|r, w| unsafe { w.bits(r.bits() & !PWR_CR_DBP) });
    }

    unsafe fn jump(&mut self, entry: EntryPoint) -> ! {
        let next_stage = core::mem::transmute::<usize, extern "C" fn() -> !>(entry.0 as usize);
        next_stage()
    }
}
