//! In-memory emulated block device.
//!
//! [`EmuBd`] models the parts of flash media the configuration engine
//! controls: erase value, wear-out after a configured number of erases, the
//! bad-block policy, and power loss injected after a countdown of power
//! cycles (programs and erases). Every operation is appended to an op log so
//! two runs of the same permutation can be compared operation by operation.

use lfsperm_types::{
    BadBlockBehavior, BdConfig, MAX_BLOCK_COUNT, MAX_DEVICE_BYTES, PowerlossBehavior, device_fits,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::powerloss::PowerlossRecorder;
use crate::traits::{BdError, BdResult, BlockDevice};

/// One recorded device operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BdOp {
    Read { block: u32, off: usize, len: usize },
    Prog { block: u32, off: usize, len: usize, crc: u32 },
    Erase { block: u32 },
    Sync,
    PowerLoss { cycles: u64 },
}

/// In-memory flash emulation configured from a [`BdConfig`].
#[derive(Debug)]
pub struct EmuBd {
    config: BdConfig,
    read_size: usize,
    prog_size: usize,
    block_size: usize,
    blocks: Vec<Vec<u8>>,
    wear: Vec<u64>,
    power_cycles: u64,
    countdown: Option<u64>,
    recorder: Option<PowerlossRecorder>,
    /// Pre-modification contents of the block most recently touched since
    /// the last sync. Restored on power loss under `PowerlossBehavior::Ooo`.
    unsynced: Option<(u32, Vec<u8>)>,
    ops: Vec<BdOp>,
}

fn positive_size(name: &str, value: i64) -> BdResult<usize> {
    usize::try_from(value)
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| BdError::Invalid {
            detail: format!("{name} must be positive, got {value}"),
        })
}

impl EmuBd {
    /// Create a device with every block in the erased state.
    pub fn new(config: BdConfig) -> BdResult<Self> {
        let read_size = positive_size("read_size", config.read_size)?;
        let prog_size = positive_size("prog_size", config.prog_size)?;
        let block_size = positive_size("block_size", config.block_size)?;
        let block_count = positive_size("block_count", config.block_count)?;
        let fits = u64::try_from(block_size)
            .ok()
            .zip(u64::try_from(block_count).ok())
            .is_some_and(|(size, count)| device_fits(size, count));
        if !fits {
            return Err(BdError::Invalid {
                detail: format!(
                    "{block_count} blocks of {block_size} bytes exceed the simulator limits \
                     ({MAX_BLOCK_COUNT} blocks, {MAX_DEVICE_BYTES} bytes)"
                ),
            });
        }
        let fill = erased_byte(config.erase_value).unwrap_or(0);
        debug!(
            read_size,
            prog_size,
            block_size,
            block_count,
            erase_value = config.erase_value,
            erase_cycles = config.erase_cycles,
            badblock_behavior = ?config.badblock_behavior,
            powerloss_behavior = ?config.powerloss_behavior,
            "EmuBd: device created"
        );
        Ok(Self {
            config,
            read_size,
            prog_size,
            block_size,
            blocks: vec![vec![fill; block_size]; block_count],
            wear: vec![0; block_count],
            power_cycles: 0,
            countdown: None,
            recorder: None,
            unsynced: None,
            ops: Vec::new(),
        })
    }

    /// Attach the per-run power-loss recorder.
    #[must_use]
    pub fn with_recorder(mut self, recorder: PowerlossRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The configuration this device was built from.
    #[must_use]
    pub const fn config(&self) -> &BdConfig {
        &self.config
    }

    /// Arm power loss on the `n`th following program or erase. `None` disarms.
    pub fn set_power_cycles(&mut self, n: Option<u64>) {
        self.countdown = n.filter(|cycles| *cycles > 0);
    }

    /// Total programs and erases performed, including ones that lost power.
    #[must_use]
    pub const fn power_cycles(&self) -> u64 {
        self.power_cycles
    }

    /// Erases seen by `block`.
    #[must_use]
    pub fn wear(&self, block: u32) -> Option<u64> {
        self.wear.get(block as usize).copied()
    }

    /// Raw contents of `block`.
    #[must_use]
    pub fn block(&self, block: u32) -> Option<&[u8]> {
        self.blocks.get(block as usize).map(Vec::as_slice)
    }

    /// Every operation performed so far, in order.
    #[must_use]
    pub fn ops(&self) -> &[BdOp] {
        &self.ops
    }

    /// CRC-32C over the whole device image.
    #[must_use]
    pub fn fingerprint(&self) -> u32 {
        self.blocks
            .iter()
            .fold(0, |crc, block| crc32c::crc32c_append(crc, block))
    }

    fn is_bad(&self, block: u32) -> bool {
        self.config.erase_cycles > 0
            && self.wear[block as usize] >= self.config.erase_cycles.unsigned_abs()
    }

    fn check_range(&self, block: u32, off: usize, len: usize, unit: usize) -> BdResult<()> {
        if block as usize >= self.blocks.len() {
            return Err(BdError::Invalid {
                detail: format!("block {block} >= block_count {}", self.blocks.len()),
            });
        }
        if off % unit != 0 || len % unit != 0 {
            return Err(BdError::Invalid {
                detail: format!("off {off} len {len} not aligned to {unit}"),
            });
        }
        if off.checked_add(len).is_none_or(|end| end > self.block_size) {
            return Err(BdError::Invalid {
                detail: format!("off {off} len {len} exceeds block_size {}", self.block_size),
            });
        }
        Ok(())
    }

    fn remember_unsynced(&mut self, block: u32) {
        if self
            .unsynced
            .as_ref()
            .is_none_or(|(remembered, _)| *remembered != block)
        {
            self.unsynced = Some((block, self.blocks[block as usize].clone()));
        }
    }

    /// Count one power cycle and trigger power loss when the countdown expires.
    fn tick(&mut self) -> BdResult<()> {
        self.power_cycles += 1;
        let Some(remaining) = self.countdown else {
            return Ok(());
        };
        if remaining > 1 {
            self.countdown = Some(remaining - 1);
            return Ok(());
        }
        self.countdown = None;
        if self.config.powerloss_behavior == PowerlossBehavior::Ooo {
            if let Some((block, contents)) = self.unsynced.take() {
                self.blocks[block as usize] = contents;
            }
        }
        self.unsynced = None;
        let total = self.recorder.as_ref().map_or(0, PowerlossRecorder::record);
        self.ops.push(BdOp::PowerLoss {
            cycles: self.power_cycles,
        });
        debug!(
            cycles = self.power_cycles,
            powerloss_total = total,
            behavior = ?self.config.powerloss_behavior,
            "EmuBd: power loss"
        );
        Err(BdError::PowerLoss {
            cycles: self.power_cycles,
        })
    }
}

/// Byte value of an erased cell, `None` when erases leave data untouched.
fn erased_byte(erase_value: i64) -> Option<u8> {
    u8::try_from(erase_value).ok()
}

impl BlockDevice for EmuBd {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn read(&mut self, block: u32, off: usize, buf: &mut [u8]) -> BdResult<()> {
        self.check_range(block, off, buf.len(), self.read_size)?;
        trace!(block, off, len = buf.len(), "EmuBd: read");
        self.ops.push(BdOp::Read {
            block,
            off,
            len: buf.len(),
        });
        if self.is_bad(block) && self.config.badblock_behavior == BadBlockBehavior::ReadError {
            return Err(BdError::Corrupt { block });
        }
        buf.copy_from_slice(&self.blocks[block as usize][off..off + buf.len()]);
        Ok(())
    }

    fn prog(&mut self, block: u32, off: usize, data: &[u8]) -> BdResult<()> {
        self.check_range(block, off, data.len(), self.prog_size)?;
        trace!(block, off, len = data.len(), "EmuBd: prog");
        self.ops.push(BdOp::Prog {
            block,
            off,
            len: data.len(),
            crc: crc32c::crc32c(data),
        });
        if self.is_bad(block) {
            match self.config.badblock_behavior {
                BadBlockBehavior::ProgError => return Err(BdError::Corrupt { block }),
                BadBlockBehavior::ProgNoop => return self.tick(),
                _ => {}
            }
        }
        self.remember_unsynced(block);
        self.blocks[block as usize][off..off + data.len()].copy_from_slice(data);
        self.tick()
    }

    fn erase(&mut self, block: u32) -> BdResult<()> {
        self.check_range(block, 0, 0, 1)?;
        trace!(block, "EmuBd: erase");
        self.ops.push(BdOp::Erase { block });
        if self.config.erase_cycles > 0 {
            if self.is_bad(block) {
                match self.config.badblock_behavior {
                    BadBlockBehavior::EraseError => return Err(BdError::Corrupt { block }),
                    BadBlockBehavior::EraseNoop => return self.tick(),
                    _ => {}
                }
            } else {
                self.wear[block as usize] += 1;
            }
        }
        self.remember_unsynced(block);
        if let Some(fill) = erased_byte(self.config.erase_value) {
            self.blocks[block as usize].fill(fill);
        }
        self.tick()
    }

    fn sync(&mut self) -> BdResult<()> {
        trace!("EmuBd: sync");
        self.ops.push(BdOp::Sync);
        self.unsynced = None;
        Ok(())
    }
}
