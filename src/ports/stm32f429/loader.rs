//! Construction of the loader from the STM32F429 drivers.
use super::{
    button::UserButton, clock::CycleCounter, flash::McuFlash, otp::OtpMemory, rng::HardwareRng,
    system::Core,
};
use crate::{
    devices::{
        automaton::Automaton,
        controlflow::ControlFlow,
        loader::{context::Context, Loader},
        memory_map::{BOOT_POLICY, MEMORY_MAP},
    },
    stm32pac,
};

pub type Stm32f429Loader =
    Loader<McuFlash, OtpMemory, HardwareRng, UserButton, CycleCounter, Core>;

/// Takes ownership of the peripherals and builds the loader. Returns
/// `None` if they were already taken.
pub fn construct() -> Option<Stm32f429Loader> {
    let peripherals = stm32pac::Peripherals::take()?;
    let mut core_peripherals = cortex_m::Peripherals::take()?;

    let system = Core::new(peripherals.RCC, peripherals.PWR);
    let rng = HardwareRng::new(peripherals.RNG, system.rcc());
    let button = UserButton::new(peripherals.GPIOA, system.rcc());
    let clock = CycleCounter::new(core_peripherals.DWT, &mut core_peripherals.DCB);
    let flash = McuFlash::new(peripherals.FLASH, MEMORY_MAP.bootloader);
    // NOTE(Safety): The loader drives flash and OTP operations strictly
    // one after the other.
    let otp = unsafe { OtpMemory::new() };

    Some(Loader {
        flash,
        otp,
        rng,
        button,
        clock,
        system,
        automaton: Automaton::new(),
        controlflow: ControlFlow::default(),
        context: Context::default(),
        memory_map: &MEMORY_MAP,
        policy: &BOOT_POLICY,
    })
}
