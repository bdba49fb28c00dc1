#![cfg_attr(test, allow(unused_attributes))]
#![cfg_attr(all(not(test), target_arch = "arm"), no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
use defmt_rtt as _;

#[cfg(target_arch = "arm")]
#[cortex_m_rt::entry]
fn main() -> ! {
    use flintlock_lib::ports::loader::construct;

    match construct() {
        Some(loader) => loader.run(),
        None => panic!("FATAL: Peripherals were already taken"),
    }
}

/// Halts with interrupts masked. There is no way back into the boot
/// sequence once something has gone this wrong.
#[cfg(target_arch = "arm")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    if let Some(location) = info.location() {
        defmt::error!("Panicked at {}:{}", location.file(), location.line());
    } else {
        defmt::error!("Panicked");
    }
    loop {
        cortex_m::asm::nop();
    }
}

#[cfg(target_arch = "arm")]
#[defmt::timestamp]
fn timestamp() -> u64 { 0 }

#[cfg(not(target_arch = "arm"))]
fn main() {}
