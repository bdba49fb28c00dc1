//! Bit level helpers for register fields and one-time-programmable memory.
use core::ops::BitOr;

/// Queries single bits of an integer.
pub trait BitFlags {
    fn is_set(&self, bit: u8) -> bool;
}

/// Checks that every '1' bit is a '1' on the right hand side.
///
/// Programming one-time-programmable memory can only clear bits, so a value
/// can be written over existing contents only if it is a bit subset of them.
pub trait BitSubset: Copy {
    fn is_subset_of(self, rhs: Self) -> bool;
}

/// Variant of the BitSubset trait for slices.
pub trait SliceBitSubset {
    fn is_subset_of(self, rhs: Self) -> bool;
}

impl<U: Copy + Into<u32>> BitFlags for U {
    fn is_set(&self, bit: u8) -> bool {
        assert!(bit < 32);
        ((*self).into() & (1u32 << bit)) != 0
    }
}

impl<U: Copy + BitOr<Output = Self> + PartialEq> BitSubset for U {
    fn is_subset_of(self, rhs: Self) -> bool { (self | rhs) == rhs }
}

impl<T: BitSubset> SliceBitSubset for &[T] {
    fn is_subset_of(self, rhs: Self) -> bool {
        self.len() == rhs.len() && self.iter().zip(rhs.iter()).all(|(a, b)| a.is_subset_of(*b))
    }
}
