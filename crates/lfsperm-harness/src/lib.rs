//! Deterministic test-configuration and permutation engine for flash
//! filesystem test suites.
//!
//! The crate maps integers to configurations and back: a permutation index
//! to one fully resolved set of defines, a factorial index to one array
//! ordering, and a `(case, permutation)` id to one PRNG stream. The runner
//! drives registered test cases over that space, one isolated
//! [`RunContext`] per permutation.

pub mod context;
pub mod define;
pub mod failure;
pub mod overrides;
pub mod permutation;
pub mod prng;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod runner;
pub mod schedule;
pub mod space;
pub mod trace;

pub use context::RunContext;
pub use define::{Define, DefineFn, DefineTable, define_fn, implicit_default};
pub use failure::{FailureKind, TestFailure};
pub use lfsperm_bd::{BdError, BdOp, BlockDevice, EmuBd, PowerlossCounter};
pub use lfsperm_error::{ErrorKind, PermError, Result};
pub use lfsperm_types::{
    BadBlockBehavior, BdConfig, DefineId, GEOMETRIES, Geometry, IMPLICIT_DEFINE_COUNT,
    IMPLICIT_DEFINE_NAMES, PowerlossBehavior, TestConfig, TestFlags,
};
pub use overrides::DefineOverride;
pub use permutation::{factorial, permutation, permutation_into};
pub use prng::{TestPrng, permutation_seed, prng_next};
pub use registry::{TestCase, TestId, TestRegistry, TestSuite, TestSuiteBuilder};
pub use report::{Outcome, PermutationResult, RunReport};
pub use resolve::{DefineSet, Source};
pub use runner::{Runner, RunnerConfig};
pub use schedule::PowerlossSchedule;
pub use space::{CasePlan, PermutationSpace};
pub use trace::{BufferSink, TraceSink, TracingSink};
