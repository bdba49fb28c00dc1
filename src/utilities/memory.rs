//! Addresses and regions of the memory map.
#![macro_use]

use core::ops::{Add, Sub};

#[macro_export]
macro_rules! kb {
    ($val:expr) => {
        $val * 1024
    };
}

/// Absolute address in the MCU memory space.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Address(pub u32);

impl Add<usize> for Address {
    type Output = Address;
    fn add(self, rhs: usize) -> Self::Output { Address(self.0.wrapping_add(rhs as u32)) }
}

impl Sub<usize> for Address {
    type Output = Address;
    fn sub(self, rhs: usize) -> Self::Output { Address(self.0.saturating_sub(rhs as u32)) }
}

impl Sub<Address> for Address {
    type Output = usize;
    fn sub(self, rhs: Address) -> Self::Output { self.0.saturating_sub(rhs.0) as usize }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self { address.0 as usize }
}

/// Entry point of a next stage image: the start of its code, right after the
/// vector table, with the Thumb bit set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct EntryPoint(pub u32);

/// Contiguous span of memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub start: Address,
    pub size: usize,
}

impl Region {
    pub fn end(&self) -> Address { self.start + self.size }
    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end()
    }
}

/// Key material that survives the hand-off to the next stage in a
/// retained, access restricted memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyRegion {
    pub source: Address,
    pub length: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn regions_are_half_open() {
        let region = Region { start: Address(0x0800_0000), size: kb!(32) };
        assert!(region.contains(Address(0x0800_0000)));
        assert!(region.contains(Address(0x0800_7FFF)));
        assert!(!region.contains(Address(0x0800_8000)));
        assert!(!region.contains(Address(0x07FF_FFFF)));
        assert_eq!(region.end() - region.start, kb!(32));
    }

    #[test]
    fn address_arithmetic_saturates_below_zero() {
        assert_eq!(Address(0x10) - 0x20usize, Address(0));
        assert_eq!(Address(0x10) - Address(0x20), 0);
        assert_eq!(Address(0x10) + kb!(1), Address(0x0000_0410));
    }
}
