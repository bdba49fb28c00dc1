use crate::hal::time::{self, Milliseconds};
use std::cell::Cell;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FakeInstant(pub u32);

/// Clock that moves forward by `step` every time it is read.
#[derive(Debug)]
pub struct FakeClock {
    current: Cell<u32>,
    step: u32,
}

impl FakeClock {
    pub fn new(step: Milliseconds) -> Self { Self { current: Cell::new(0), step: step.0 } }
    pub fn elapsed(&self) -> Milliseconds { Milliseconds(self.current.get()) }
}

impl time::Instant for FakeInstant {}

impl time::Now for FakeClock {
    type I = FakeInstant;
    fn now(&self) -> FakeInstant {
        let now = self.current.get();
        self.current.set(now + self.step);
        FakeInstant(now)
    }
}

impl core::ops::Sub for FakeInstant {
    type Output = Milliseconds;
    fn sub(self, rhs: Self) -> Self::Output { Milliseconds(self.0.saturating_sub(rhs.0)) }
}

impl core::ops::Add<Milliseconds> for FakeInstant {
    type Output = Self;
    fn add(self, rhs: Milliseconds) -> Self { FakeInstant(self.0 + rhs.0) }
}
