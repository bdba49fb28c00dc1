//! Booleans hardened against single bit flips.
//!
//! A `SecBool` is only true when it holds the exact `TRUE` pattern, and only
//! false when it holds the exact `FALSE` pattern. The two patterns are bitwise
//! complements, so no handful of flipped bits turns one into the other, and a
//! corrupted value is neither.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct SecBool(u32);

impl SecBool {
    pub const TRUE: SecBool = SecBool(0xAA55_AA55);
    pub const FALSE: SecBool = SecBool(0x55AA_55AA);

    pub const fn from_raw(raw: u32) -> Self { SecBool(raw) }
    pub const fn raw(self) -> u32 { self.0 }

    #[inline(never)]
    pub fn is_true(self) -> bool { core::hint::black_box(self.0) == Self::TRUE.0 }

    #[inline(never)]
    pub fn is_false(self) -> bool { core::hint::black_box(self.0) == Self::FALSE.0 }

    pub fn name(self) -> &'static str {
        if self.is_true() {
            "true"
        } else if self.is_false() {
            "false"
        } else {
            "corrupted"
        }
    }
}

impl From<bool> for SecBool {
    fn from(value: bool) -> Self { if value { Self::TRUE } else { Self::FALSE } }
}

impl Default for SecBool {
    fn default() -> Self { Self::FALSE }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_exact_patterns_are_true_or_false() {
        assert!(SecBool::TRUE.is_true());
        assert!(SecBool::FALSE.is_false());
        assert!(!SecBool::FALSE.is_true());
        assert!(!SecBool::TRUE.is_false());

        let flipped = SecBool::from_raw(SecBool::TRUE.raw() ^ 0x0000_0100);
        assert!(!flipped.is_true());
        assert!(!flipped.is_false());
        assert_eq!(flipped.name(), "corrupted");
    }

    #[test]
    fn patterns_are_complementary() {
        assert_eq!(SecBool::TRUE.raw(), !SecBool::FALSE.raw());
        assert_eq!(SecBool::from(true), SecBool::TRUE);
        assert_eq!(SecBool::default(), SecBool::FALSE);
    }
}
