use crate::{
    hal::system::System,
    utilities::memory::{EntryPoint, KeyRegion},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SystemEvent {
    DisableInterrupts,
    EnableInterrupts,
    ReleaseConsole,
    RetainKeys(KeyRegion),
}

/// Records core operations. Resetting or jumping ends the test with a panic
/// naming the outcome.
#[derive(Clone, Debug, Default)]
pub struct FakeSystem {
    pub events: Vec<SystemEvent>,
}

impl FakeSystem {
    pub fn interrupts_enabled(&self) -> bool {
        self.events
            .iter()
            .rev()
            .find_map(|event| match event {
                SystemEvent::EnableInterrupts => Some(true),
                SystemEvent::DisableInterrupts => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl System for FakeSystem {
    fn disable_interrupts(&mut self) { self.events.push(SystemEvent::DisableInterrupts) }
    fn enable_interrupts(&mut self) { self.events.push(SystemEvent::EnableInterrupts) }
    fn reset(&mut self) -> ! { panic!("reset") }
    fn release_console(&mut self) { self.events.push(SystemEvent::ReleaseConsole) }
    fn retain_keys(&mut self, region: KeyRegion) { self.events.push(SystemEvent::RetainKeys(region)) }
    unsafe fn jump(&mut self, entry: EntryPoint) -> ! { panic!("jump to {:#010x}", entry.0) }
}
