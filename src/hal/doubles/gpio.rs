use crate::hal::gpio::InputPin;

#[derive(Clone, Debug, Default)]
pub struct FakeButton {
    pub pressed: bool,
}

impl FakeButton {
    pub fn pressed() -> Self { Self { pressed: true } }
}

impl InputPin for FakeButton {
    fn is_high(&self) -> bool { self.pressed }
    fn is_low(&self) -> bool { !self.pressed }
}
