//! Per-permutation run context handed to test bodies.
//!
//! A [`RunContext`] owns everything one permutation may touch: its resolved
//! defines, a device built from the resolved configuration, a PRNG seeded
//! from the test id and the power-loss counter. Nothing in it outlives the
//! permutation, so contexts for different permutations never share state.

use std::sync::Arc;

use lfsperm_bd::{EmuBd, PowerlossCounter, powerloss_counter};
use lfsperm_error::{PermError, Result};
use lfsperm_types::{BdConfig, DefineId, Geometry, TestConfig};
use tracing::debug;

use crate::prng::{TestPrng, permutation_seed};
use crate::registry::TestId;
use crate::resolve::DefineSet;
use crate::trace::TraceSink;

pub struct RunContext {
    id: TestId,
    geometry: Geometry,
    defines: DefineSet,
    config: TestConfig,
    seed: u32,
    prng: TestPrng,
    bd: EmuBd,
    powerlosses: PowerlossCounter,
    trace: Arc<dyn TraceSink>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("id", &self.id)
            .field("geometry", &self.geometry.name)
            .field("config", &self.config)
            .field("seed", &self.seed)
            .field("powerlosses", &self.powerlosses.get())
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Resolve the configuration behind `defines` and build a fresh device.
    ///
    /// With `validate` set, configurations the storage engine would reject
    /// fail here with [`PermError::InvalidConfig`].
    pub fn new(
        case: &str,
        geometry: Geometry,
        mut defines: DefineSet,
        trace: Arc<dyn TraceSink>,
        validate: bool,
    ) -> Result<Self> {
        let permutation = defines.permutation();
        let config = defines.test_config()?;
        if validate {
            config.validate()?;
        }
        let (powerlosses, recorder) = powerloss_counter();
        let bd = EmuBd::new(config.bd_config())
            .map_err(|err| PermError::invalid_config("device", err.to_string()))?
            .with_recorder(recorder);
        let seed = permutation_seed(case, permutation);
        debug!(
            case,
            permutation,
            geometry = geometry.name,
            seed,
            block_size = config.block_size,
            block_count = config.block_count,
            "RunContext: created"
        );
        Ok(Self {
            id: TestId::permutation(case, permutation),
            geometry,
            defines,
            config,
            seed,
            prng: TestPrng::new(seed),
            bd,
            powerlosses,
            trace,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &TestId {
        &self.id
    }

    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Resolved value of `id`.
    pub fn define(&mut self, id: DefineId) -> Result<i64> {
        self.defines.get(id)
    }

    pub fn define_by_name(&mut self, name: &str) -> Result<i64> {
        self.defines.get_by_name(name)
    }

    pub fn defines(&mut self) -> &mut DefineSet {
        &mut self.defines
    }

    #[must_use]
    pub const fn config(&self) -> &TestConfig {
        &self.config
    }

    #[must_use]
    pub const fn bd_config(&self) -> BdConfig {
        self.config.bd_config()
    }

    /// Seed of this permutation's PRNG stream.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    pub fn prng(&mut self) -> &mut TestPrng {
        &mut self.prng
    }

    pub fn bd(&mut self) -> &mut EmuBd {
        &mut self.bd
    }

    #[must_use]
    pub const fn device(&self) -> &EmuBd {
        &self.bd
    }

    /// Power losses so far in this permutation.
    #[must_use]
    pub fn powerlosses(&self) -> u64 {
        self.powerlosses.get()
    }

    #[must_use]
    pub fn powerloss_counter(&self) -> PowerlossCounter {
        self.powerlosses.clone()
    }

    #[must_use]
    pub fn trace(&self) -> &dyn TraceSink {
        self.trace.as_ref()
    }

    /// Restart the body's random stream, as a rerun after power loss does.
    pub(crate) fn reseed(&mut self) {
        self.prng = TestPrng::new(self.seed);
    }
}
