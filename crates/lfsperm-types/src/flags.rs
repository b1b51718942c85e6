//! Test flags and the policy enums handed to the device simulator.

use lfsperm_error::{PermError, Result};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Flags carried by suites and cases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TestFlags: u8 {
        /// Test reaches into engine internals; skipped unless explicitly requested.
        const INTERNAL = 0x1;
        /// Test survives power loss and is run under power-loss schedules.
        const REENTRANT = 0x2;
    }
}

/// What an emulated device does with a block that has worn out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadBlockBehavior {
    /// Programs to the bad block fail with a corruption error.
    ProgError,
    /// Erases of the bad block fail with a corruption error.
    EraseError,
    /// Reads of the bad block fail with a corruption error.
    ReadError,
    /// Programs to the bad block are silently dropped.
    ProgNoop,
    /// Erases of the bad block are silently dropped.
    EraseNoop,
}

impl BadBlockBehavior {
    pub const ALL: [Self; 5] = [
        Self::ProgError,
        Self::EraseError,
        Self::ReadError,
        Self::ProgNoop,
        Self::EraseNoop,
    ];

    /// Integer code used as the resolved define value.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ProgError => 0,
            Self::EraseError => 1,
            Self::ReadError => 2,
            Self::ProgNoop => 3,
            Self::EraseNoop => 4,
        }
    }

    /// Decode a resolved define value.
    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|behavior| behavior.code() == code)
            .ok_or_else(|| {
                PermError::callback("BADBLOCK_BEHAVIOR", format!("unknown behavior code {code}"))
            })
    }
}

/// What happens to an in-flight write when power is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerlossBehavior {
    /// Writes land in order; nothing is lost.
    Noop,
    /// Writes since the last sync may be lost out of order.
    Ooo,
}

impl PowerlossBehavior {
    pub const ALL: [Self; 2] = [Self::Noop, Self::Ooo];

    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Noop => 0,
            Self::Ooo => 1,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|behavior| behavior.code() == code)
            .ok_or_else(|| {
                PermError::callback("POWERLOSS_BEHAVIOR", format!("unknown behavior code {code}"))
            })
    }
}
