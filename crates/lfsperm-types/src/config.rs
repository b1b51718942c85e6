//! Resolved configuration handles.
//!
//! [`TestConfig`] is what a test body and the storage engine read for one
//! permutation. [`BdConfig`] is the subset handed to the device simulator.

use lfsperm_error::{PermError, Result};
use serde::{Deserialize, Serialize};

use crate::define::{DefineId, IMPLICIT_DEFINE_COUNT};
use crate::flags::{BadBlockBehavior, PowerlossBehavior};

/// Largest device, in bytes, a permutation may ask the simulator for.
pub const MAX_DEVICE_BYTES: u64 = 1 << 30;
/// Largest block count, bounding per-block bookkeeping for tiny blocks.
pub const MAX_BLOCK_COUNT: u64 = 1 << 20;

/// Whether a simulated device of this shape stays within the limits above.
#[must_use]
pub fn device_fits(block_size: u64, block_count: u64) -> bool {
    block_count <= MAX_BLOCK_COUNT
        && block_size
            .checked_mul(block_count)
            .is_some_and(|bytes| bytes <= MAX_DEVICE_BYTES)
}

/// Every implicit define, resolved and typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub read_size: i64,
    pub prog_size: i64,
    pub block_size: i64,
    pub block_count: i64,
    pub disk_size: i64,
    pub cache_size: i64,
    pub inline_size: i64,
    pub fragment_size: i64,
    pub crystallize_size: i64,
    pub lookahead_size: i64,
    pub block_cycles: i64,
    pub erase_value: i64,
    pub erase_cycles: i64,
    pub badblock_behavior: BadBlockBehavior,
    pub powerloss_behavior: PowerlossBehavior,
}

/// Device-simulator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BdConfig {
    pub read_size: i64,
    pub prog_size: i64,
    pub block_size: i64,
    pub block_count: i64,
    /// Byte value erased blocks read back as; negative leaves data untouched.
    pub erase_value: i64,
    /// Erases a block survives before going bad; `0` disables wear.
    pub erase_cycles: i64,
    pub badblock_behavior: BadBlockBehavior,
    pub powerloss_behavior: PowerlossBehavior,
}

impl TestConfig {
    /// Build from the implicit define values, indexed by [`DefineId`].
    pub fn from_values(values: &[i64; IMPLICIT_DEFINE_COUNT]) -> Result<Self> {
        let at = |id: DefineId| values[id.index()];
        Ok(Self {
            read_size: at(DefineId::READ_SIZE),
            prog_size: at(DefineId::PROG_SIZE),
            block_size: at(DefineId::BLOCK_SIZE),
            block_count: at(DefineId::BLOCK_COUNT),
            disk_size: at(DefineId::DISK_SIZE),
            cache_size: at(DefineId::CACHE_SIZE),
            inline_size: at(DefineId::INLINE_SIZE),
            fragment_size: at(DefineId::FRAGMENT_SIZE),
            crystallize_size: at(DefineId::CRYSTALLIZE_SIZE),
            lookahead_size: at(DefineId::LOOKAHEAD_SIZE),
            block_cycles: at(DefineId::BLOCK_CYCLES),
            erase_value: at(DefineId::ERASE_VALUE),
            erase_cycles: at(DefineId::ERASE_CYCLES),
            badblock_behavior: BadBlockBehavior::from_code(at(DefineId::BADBLOCK_BEHAVIOR))?,
            powerloss_behavior: PowerlossBehavior::from_code(at(DefineId::POWERLOSS_BEHAVIOR))?,
        })
    }

    /// The subset the device simulator consumes, passed through unchanged.
    #[must_use]
    pub const fn bd_config(&self) -> BdConfig {
        BdConfig {
            read_size: self.read_size,
            prog_size: self.prog_size,
            block_size: self.block_size,
            block_count: self.block_count,
            erase_value: self.erase_value,
            erase_cycles: self.erase_cycles,
            badblock_behavior: self.badblock_behavior,
            powerloss_behavior: self.powerloss_behavior,
        }
    }

    /// `block_size * block_count`, or `None` when negative or overflowing.
    #[must_use]
    pub fn device_bytes(&self) -> Option<u64> {
        let bytes = self.block_size.checked_mul(self.block_count)?;
        u64::try_from(bytes).ok()
    }

    /// Check the constraints the storage engine asserts at mount time.
    pub fn validate(&self) -> Result<()> {
        positive("read_size", self.read_size)?;
        positive("prog_size", self.prog_size)?;
        positive("block_size", self.block_size)?;
        positive("block_count", self.block_count)?;
        let fits = u64::try_from(self.block_size)
            .ok()
            .zip(u64::try_from(self.block_count).ok())
            .is_some_and(|(size, count)| device_fits(size, count));
        if !fits {
            return Err(PermError::invalid_config(
                "block_count",
                format!(
                    "{} blocks of {} bytes exceed the simulator limits \
                     ({MAX_BLOCK_COUNT} blocks, {MAX_DEVICE_BYTES} bytes)",
                    self.block_count, self.block_size
                ),
            ));
        }
        positive("cache_size", self.cache_size)?;
        multiple_of("prog_size", self.prog_size, "read_size", self.read_size)?;
        multiple_of("block_size", self.block_size, "prog_size", self.prog_size)?;
        multiple_of("cache_size", self.cache_size, "read_size", self.read_size)?;
        multiple_of("cache_size", self.cache_size, "prog_size", self.prog_size)?;
        multiple_of("block_size", self.block_size, "cache_size", self.cache_size)?;
        positive("lookahead_size", self.lookahead_size)?;
        if self.lookahead_size % 8 != 0 {
            return Err(PermError::invalid_config(
                "lookahead_size",
                format!("{} is not a multiple of 8", self.lookahead_size),
            ));
        }
        Ok(())
    }
}

fn positive(field: &str, value: i64) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(PermError::invalid_config(
            field,
            format!("must be positive, got {value}"),
        ))
    }
}

fn multiple_of(field: &str, value: i64, of_field: &str, of: i64) -> Result<()> {
    if of != 0 && value % of == 0 {
        Ok(())
    } else {
        Err(PermError::invalid_config(
            field,
            format!("{value} is not a multiple of {of_field} ({of})"),
        ))
    }
}
