//! Terminal failures raised by test bodies.

use lfsperm_bd::BdError;
use lfsperm_error::PermError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The code under test broke an expectation.
    Assertion,
    /// The device reported an error the body did not handle.
    Device,
    /// Injected power loss reached the body. Reentrant cases are re-run.
    PowerLoss,
    /// The body read a define that could not be resolved.
    Configuration,
}

/// Why a test body stopped early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TestFailure {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Assertion,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_power_loss(&self) -> bool {
        matches!(self.kind, FailureKind::PowerLoss)
    }
}

impl From<BdError> for TestFailure {
    fn from(err: BdError) -> Self {
        let kind = match err {
            BdError::PowerLoss { .. } => FailureKind::PowerLoss,
            _ => FailureKind::Device,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<PermError> for TestFailure {
    fn from(err: PermError) -> Self {
        Self {
            kind: FailureKind::Configuration,
            message: err.to_string(),
        }
    }
}

/// Fail the current test body with an assertion failure unless `cond` holds.
///
/// ```
/// use lfsperm_harness::{TestFailure, lfs_ensure};
///
/// fn body(n: i64) -> Result<(), TestFailure> {
///     lfs_ensure!(n < 10, "n={n} too large");
///     Ok(())
/// }
/// assert!(body(3).is_ok());
/// assert_eq!(body(12).unwrap_err().message, "n=12 too large");
/// ```
#[macro_export]
macro_rules! lfs_ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::TestFailure::assertion(format!($($arg)+)).into());
        }
    };
}
