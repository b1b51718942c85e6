//! Per-run power-loss counter.
//!
//! The counter is split into a read-only view for the test body and a write
//! handle for the device simulator. Both halves come from one
//! [`powerloss_counter`] call scoped to a single permutation, so a new
//! permutation always starts from zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read-only view of the power losses triggered during the current permutation.
#[derive(Debug, Clone)]
pub struct PowerlossCounter {
    count: Arc<AtomicU64>,
}

/// Write handle given to the device simulator.
#[derive(Debug, Clone)]
pub struct PowerlossRecorder {
    count: Arc<AtomicU64>,
}

/// Create a fresh counter pair starting at zero.
#[must_use]
pub fn powerloss_counter() -> (PowerlossCounter, PowerlossRecorder) {
    let count = Arc::new(AtomicU64::new(0));
    (
        PowerlossCounter {
            count: Arc::clone(&count),
        },
        PowerlossRecorder { count },
    )
}

impl PowerlossCounter {
    /// Power losses so far in this permutation.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

impl PowerlossRecorder {
    /// Record one power loss, returning the new total.
    pub fn record(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// A read-only view onto the same counter.
    #[must_use]
    pub fn counter(&self) -> PowerlossCounter {
        PowerlossCounter {
            count: Arc::clone(&self.count),
        }
    }
}
