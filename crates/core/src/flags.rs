//! Behavioral switches fixed at construction time.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Deserializer, Serialize};

/// Bitset of engine-wide post-processing and presence switches.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Flags(u8);

impl Flags {
    /// Every empty string in the produced output becomes `null`.
    pub const EMPTY_STRING_TO_NULL: Flags = Flags(1);
    /// Expected fields missing from the input and carrying no optional marker
    /// are treated as optional with a `null` default.
    pub const ALL_OPTIONAL: Flags = Flags(2);

    const KNOWN_BITS: u8 = 1 | 2;

    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Keep only the bits this engine understands.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Flags(bits & Self::KNOWN_BITS)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

/// Unknown bits are dropped, as in [`Flags::from_bits_truncate`].
impl<'de> Deserialize<'de> for Flags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(Flags::from_bits_truncate)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Flags::EMPTY_STRING_TO_NULL) {
            names.push("EMPTY_STRING_TO_NULL");
        }
        if self.contains(Flags::ALL_OPTIONAL) {
            names.push("ALL_OPTIONAL");
        }
        write!(f, "Flags({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_and_tests_bits() {
        let flags = Flags::EMPTY_STRING_TO_NULL | Flags::ALL_OPTIONAL;
        assert!(flags.contains(Flags::EMPTY_STRING_TO_NULL));
        assert!(flags.contains(Flags::ALL_OPTIONAL));
        assert_eq!(flags.bits(), 3);
    }

    #[test]
    fn empty_contains_nothing() {
        assert!(Flags::empty().is_empty());
        assert!(!Flags::empty().contains(Flags::ALL_OPTIONAL));
    }

    #[test]
    fn truncates_unknown_bits() {
        assert_eq!(Flags::from_bits_truncate(0b1110).bits(), 2);
    }

    #[test]
    fn deserialize_truncates_unknown_bits() {
        let flags: Flags = serde_json::from_value(serde_json::json!(6)).unwrap();
        assert_eq!(flags, Flags::ALL_OPTIONAL);
        assert_eq!(serde_json::to_value(flags).unwrap(), serde_json::json!(2));
    }

    #[test]
    fn debug_lists_set_flags() {
        assert_eq!(format!("{:?}", Flags::ALL_OPTIONAL), "Flags(ALL_OPTIONAL)");
    }
}
