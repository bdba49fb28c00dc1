//! User button of the STM32F429 discovery board, on PA0. Pulled down on the
//! board, reads high while pressed.
use crate::{
    hal::gpio::InputPin,
    stm32pac::{GPIOA, RCC},
};

const AHB1ENR_GPIOAEN: u32 = 1 << 0;
const PIN: u32 = 0;

pub struct UserButton {
    port: GPIOA,
}

impl UserButton {
    pub fn new(port: GPIOA, rcc: &RCC) -> Self {
        rcc.ahb1enr.modify(|r, w| unsafe { w.bits(r.bits() | AHB1ENR_GPIOAEN) });
        // Input, no internal pull.
        port.moder.modify(|r, w| unsafe { w.bits(r.bits() & !(0b11 << (PIN * 2))) });
        port.pupdr.modify(|r, w| unsafe { w.bits(r.bits() & !(0b11 << (PIN * 2))) });
        Self { port }
    }
}

impl InputPin for UserButton {
    fn is_high(&self) -> bool { self.port.idr.read().bits() & (1 << PIN) != 0 }
    fn is_low(&self) -> bool { !self.is_high() }
}
