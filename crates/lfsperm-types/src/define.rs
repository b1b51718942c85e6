//! Stable define identities.
//!
//! Implicit defines occupy ids `0..IMPLICIT_DEFINE_COUNT` in a fixed order.
//! Suite-specific defines are numbered after them in the order the suite
//! declares their names.

use std::fmt;

/// Number of implicit defines every test case can read.
pub const IMPLICIT_DEFINE_COUNT: usize = 15;

/// Number of implicit defines a geometry preset sets (read, prog, block size).
pub const GEOMETRY_DEFINE_COUNT: usize = 3;

/// Names of the implicit defines, indexed by [`DefineId`].
pub const IMPLICIT_DEFINE_NAMES: [&str; IMPLICIT_DEFINE_COUNT] = [
    "READ_SIZE",
    "PROG_SIZE",
    "BLOCK_SIZE",
    "BLOCK_COUNT",
    "DISK_SIZE",
    "CACHE_SIZE",
    "INLINE_SIZE",
    "FRAGMENT_SIZE",
    "CRYSTALLIZE_SIZE",
    "LOOKAHEAD_SIZE",
    "BLOCK_CYCLES",
    "ERASE_VALUE",
    "ERASE_CYCLES",
    "BADBLOCK_BEHAVIOR",
    "POWERLOSS_BEHAVIOR",
];

/// Index of a define within a suite's define table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct DefineId(pub usize);

impl DefineId {
    pub const READ_SIZE: Self = Self(0);
    pub const PROG_SIZE: Self = Self(1);
    pub const BLOCK_SIZE: Self = Self(2);
    pub const BLOCK_COUNT: Self = Self(3);
    pub const DISK_SIZE: Self = Self(4);
    pub const CACHE_SIZE: Self = Self(5);
    pub const INLINE_SIZE: Self = Self(6);
    pub const FRAGMENT_SIZE: Self = Self(7);
    pub const CRYSTALLIZE_SIZE: Self = Self(8);
    pub const LOOKAHEAD_SIZE: Self = Self(9);
    pub const BLOCK_CYCLES: Self = Self(10);
    pub const ERASE_VALUE: Self = Self(11);
    pub const ERASE_CYCLES: Self = Self(12);
    pub const BADBLOCK_BEHAVIOR: Self = Self(13);
    pub const POWERLOSS_BEHAVIOR: Self = Self(14);

    /// The raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Whether this id names one of the implicit defines.
    #[inline]
    pub const fn is_implicit(self) -> bool {
        self.0 < IMPLICIT_DEFINE_COUNT
    }

    /// Whether a geometry preset supplies this define.
    #[inline]
    pub const fn is_geometry(self) -> bool {
        self.0 < GEOMETRY_DEFINE_COUNT
    }

    /// Look up an implicit define by name.
    pub fn implicit_by_name(name: &str) -> Option<Self> {
        IMPLICIT_DEFINE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(Self)
    }

    /// Name of an implicit define, `None` for suite-specific ids.
    pub fn implicit_name(self) -> Option<&'static str> {
        IMPLICIT_DEFINE_NAMES.get(self.0).copied()
    }
}

impl fmt::Display for DefineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.implicit_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "define#{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_ids_match_name_table() {
        assert_eq!(DefineId::implicit_by_name("READ_SIZE"), Some(DefineId::READ_SIZE));
        assert_eq!(
            DefineId::implicit_by_name("POWERLOSS_BEHAVIOR"),
            Some(DefineId::POWERLOSS_BEHAVIOR)
        );
        assert_eq!(DefineId::CACHE_SIZE.implicit_name(), Some("CACHE_SIZE"));
        assert_eq!(DefineId::implicit_by_name("N"), None);
    }

    #[test]
    fn geometry_ids_are_the_first_three() {
        assert!(DefineId::READ_SIZE.is_geometry());
        assert!(DefineId::PROG_SIZE.is_geometry());
        assert!(DefineId::BLOCK_SIZE.is_geometry());
        assert!(!DefineId::BLOCK_COUNT.is_geometry());
    }

    #[test]
    fn suite_ids_display_by_index() {
        let id = DefineId(IMPLICIT_DEFINE_COUNT + 2);
        assert!(!id.is_implicit());
        assert_eq!(id.to_string(), "define#17");
        assert_eq!(DefineId::ERASE_VALUE.to_string(), "ERASE_VALUE");
    }
}
