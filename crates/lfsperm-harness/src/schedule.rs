//! Power-loss schedules for reentrant cases.
//!
//! A schedule yields one countdown per attempt: the number of power cycles
//! (programs and erases) the device completes before power is cut. The
//! schedule is not part of the permutation index; the same case, index and
//! schedule always replay the same way.

use std::fmt;
use std::str::FromStr;

use lfsperm_error::{PermError, Result};
use serde::{Deserialize, Serialize};

use crate::overrides::parse_int;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerlossSchedule {
    /// Never cut power.
    #[default]
    None,
    /// Cut after 1, 2, 3, ... cycles.
    Linear,
    /// Cut after 1, 2, 4, 8, ... cycles.
    Log,
    /// Cut after each listed count in turn, then stop.
    Explicit(Vec<u64>),
}

impl PowerlossSchedule {
    /// Countdown for `attempt` (0-based), or `None` to run without power loss.
    #[must_use]
    pub fn countdown(&self, attempt: usize) -> Option<u64> {
        match self {
            Self::None => None,
            Self::Linear => u64::try_from(attempt).ok()?.checked_add(1),
            Self::Log => Some(
                u32::try_from(attempt)
                    .ok()
                    .and_then(|shift| 1_u64.checked_shl(shift))
                    .unwrap_or(u64::MAX),
            ),
            Self::Explicit(points) => points.get(attempt).copied(),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for PowerlossSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Linear => f.write_str("linear"),
            Self::Log => f.write_str("log"),
            Self::Explicit(points) => {
                f.write_str("explicit:")?;
                for (i, point) in points.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{point}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for PowerlossSchedule {
    type Err = PermError;

    /// `none`, `linear`, `log`, or `explicit:N[,N...]` (a bare `N,N` list is
    /// accepted too).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "none" | "off" => Ok(Self::None),
            "linear" => Ok(Self::Linear),
            "log" => Ok(Self::Log),
            other => {
                let list = other.strip_prefix("explicit:").unwrap_or(other);
                let points = list
                    .split(',')
                    .map(|item| {
                        parse_int(item.trim())
                            .and_then(|value| {
                                u64::try_from(value)
                                    .ok()
                                    .filter(|point| *point > 0)
                                    .ok_or_else(|| format!("{value} is not a positive count"))
                            })
                            .map_err(|detail| PermError::invalid_config("powerloss", detail))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Explicit(points))
            }
        }
    }
}
