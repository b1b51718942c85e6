//! Batch execution of `(case, permutation)` pairs.
//!
//! Every permutation gets a fresh [`RunContext`]. An error or panic, in the
//! body or anywhere in setting it up, ends that permutation only; the batch
//! moves on to the next one. Parallel workers pull permutation indices from
//! a shared counter and results are reported in index order, so a parallel
//! run reports exactly what a serial run would.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lfsperm_bd::BdOp;
use lfsperm_error::{PermError, Result};
use lfsperm_types::{Geometry, TestFlags};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::failure::FailureKind;
use crate::overrides::DefineOverride;
use crate::prng::permutation_seed;
use crate::registry::{TestCase, TestId, TestRegistry, TestSuite};
use crate::report::{Outcome, PermutationResult, RunReport};
use crate::schedule::PowerlossSchedule;
use crate::space::CasePlan;
use crate::trace::{TraceSink, TracingSink};

/// Geometry list, comma-separated.
pub const ENV_GEOMETRY: &str = "LFSPERM_GEOMETRY";
/// Define overrides, `;`-separated.
pub const ENV_DEFINES: &str = "LFSPERM_DEFINES";
/// Worker thread count.
pub const ENV_WORKERS: &str = "LFSPERM_WORKERS";

/// Knobs for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[must_use]
pub struct RunnerConfig {
    /// Geometry preset names. Empty selects every preset.
    pub geometries: Vec<String>,
    pub overrides: Vec<DefineOverride>,
    /// Applied to reentrant cases only.
    pub powerloss: PowerlossSchedule,
    pub include_internal: bool,
    pub workers: usize,
    pub stop_on_failure: bool,
    /// Reject configurations the storage engine would refuse to mount.
    pub validate_configs: bool,
    /// Power losses a single permutation may take before it is failed.
    pub max_powerlosses: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            geometries: Vec::new(),
            overrides: Vec::new(),
            powerloss: PowerlossSchedule::None,
            include_internal: false,
            workers: 1,
            stop_on_failure: false,
            validate_configs: true,
            max_powerlosses: 1024,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(mut self, name: impl Into<String>) -> Self {
        self.geometries.push(name.into());
        self
    }

    pub fn define(mut self, define: DefineOverride) -> Self {
        self.overrides.push(define);
        self
    }

    pub fn powerloss(mut self, schedule: PowerlossSchedule) -> Self {
        self.powerloss = schedule;
        self
    }

    pub fn include_internal(mut self, include: bool) -> Self {
        self.include_internal = include;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    pub fn validate_configs(mut self, validate: bool) -> Self {
        self.validate_configs = validate;
        self
    }

    pub fn max_powerlosses(mut self, max: u64) -> Self {
        self.max_powerlosses = max;
        self
    }

    /// Layer environment variables over this config. `lookup` is
    /// `std::env::var` in production and a map in tests.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup(ENV_GEOMETRY) {
            self.geometries = Geometry::parse_list(&list)?
                .into_iter()
                .map(|geometry| geometry.name.to_owned())
                .collect();
        }
        if let Some(list) = lookup(ENV_DEFINES) {
            self.overrides.extend(DefineOverride::parse_many(&list)?);
        }
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.workers = workers.trim().parse().map_err(|_| {
                PermError::invalid_config(ENV_WORKERS, format!("'{workers}' is not a count"))
            })?;
        }
        Ok(self)
    }

    /// [`Self::apply_env`] against the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Resolve the geometry names.
    pub fn selected_geometries(&self) -> Result<Vec<Geometry>> {
        Geometry::parse_list(&self.geometries.join(","))
    }
}

/// Executes permutations according to a [`RunnerConfig`].
pub struct Runner {
    config: RunnerConfig,
    geometries: Vec<Geometry>,
    trace: Arc<dyn TraceSink>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let geometries = config.selected_geometries()?;
        Ok(Self {
            config,
            geometries,
            trace: Arc::new(TracingSink),
        })
    }

    /// Route trace lines from test bodies to `sink`.
    #[must_use]
    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = sink;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Permutation space of `case` under this runner's geometries and overrides.
    pub fn plan(&self, suite: &TestSuite, case: &TestCase) -> Result<CasePlan> {
        CasePlan::for_case(case, suite.table(), &self.geometries, &self.config.overrides)
    }

    /// Run every permutation of every case in `registry`.
    pub fn run_registry(&self, registry: &TestRegistry) -> RunReport {
        let mut results = Vec::new();
        for (suite, case) in registry.cases() {
            let case_results = self.run_case(suite, case);
            let failed = case_results.iter().any(|result| result.outcome.is_failure());
            results.extend(case_results);
            if failed && self.config.stop_on_failure {
                warn!(case = case.name(), "Runner: stopping after first failing case");
                break;
            }
        }
        let report = RunReport::from_results(results);
        info!(
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            config_errors = report.config_errors,
            "Runner: batch finished"
        );
        report
    }

    /// Run the case or single permutation named by `id`.
    pub fn run_id(&self, registry: &TestRegistry, id: &TestId) -> Result<RunReport> {
        let (suite, case) = registry.find_case(&id.case).ok_or_else(|| {
            PermError::invalid_config("test id", format!("no single case named {}", id.case))
        })?;
        let results = match id.permutation {
            None => self.run_case(suite, case),
            Some(p) => {
                let plan = self.plan(suite, case)?;
                if p >= plan.count() {
                    return Err(PermError::PermutationOutOfRange {
                        index: p,
                        count: plan.count(),
                    });
                }
                vec![self.run_permutation(suite, case, &plan, p)]
            }
        };
        Ok(RunReport::from_results(results))
    }

    /// Run every permutation of one case.
    pub fn run_case(&self, suite: &TestSuite, case: &TestCase) -> Vec<PermutationResult> {
        let name = suite.case_id(case);
        if case.test_flags().contains(TestFlags::INTERNAL) && !self.config.include_internal {
            debug!(case = %name, "Runner: internal case skipped");
            return vec![PermutationResult::new(
                TestId::case(name),
                0,
                Outcome::Skipped {
                    reason: "internal".to_owned(),
                },
            )];
        }
        let plan = match self.plan(suite, case) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(case = %name, error = %err, "Runner: case could not be laid out");
                return vec![PermutationResult::new(
                    TestId::case(name),
                    0,
                    Outcome::ConfigError {
                        message: err.to_string(),
                    },
                )];
            }
        };
        let count = plan.count();
        let workers = self.config.workers.clamp(1, count.max(1));
        debug!(case = %name, permutations = count, workers, "Runner: case started");
        if workers == 1 {
            let mut results = Vec::with_capacity(count);
            for p in 0..count {
                let result = self.run_permutation(suite, case, &plan, p);
                let failed = result.outcome.is_failure();
                results.push(result);
                if failed && self.config.stop_on_failure {
                    break;
                }
            }
            return results;
        }
        self.run_parallel(suite, case, &plan, workers)
    }

    fn run_parallel(
        &self,
        suite: &TestSuite,
        case: &TestCase,
        plan: &CasePlan,
        workers: usize,
    ) -> Vec<PermutationResult> {
        let count = plan.count();
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let slots: Mutex<Vec<Option<PermutationResult>>> =
            Mutex::new((0..count).map(|_| None).collect());
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        while !stop.load(Ordering::Acquire) {
                            let p = next.fetch_add(1, Ordering::AcqRel);
                            if p >= count {
                                break;
                            }
                            let result = self.run_permutation(suite, case, plan, p);
                            if result.outcome.is_failure() && self.config.stop_on_failure {
                                stop.store(true, Ordering::Release);
                            }
                            slots.lock()[p] = Some(result);
                        }
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    warn!(case = case.name(), "Runner: worker thread panicked");
                }
            }
        });
        // every index below the counter was handed to a worker
        let dispatched = next.into_inner().min(count);
        let name = suite.case_id(case);
        slots
            .into_inner()
            .into_iter()
            .take(dispatched)
            .enumerate()
            .map(|(p, slot)| {
                slot.unwrap_or_else(|| aborted(&name, p, "worker thread panicked".to_owned()))
            })
            .collect()
    }

    /// Run permutation `p` of `case` to completion.
    ///
    /// A panic while resolving defines, filtering or building the device is
    /// reported as a configuration error of this permutation. A panic in the
    /// body is a failure.
    pub fn run_permutation(
        &self,
        suite: &TestSuite,
        case: &TestCase,
        plan: &CasePlan,
        p: usize,
    ) -> PermutationResult {
        let name = suite.case_id(case);
        panic::catch_unwind(AssertUnwindSafe(|| self.execute(&name, case, plan, p)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(
                    case = %name,
                    permutation = p,
                    message = %message,
                    "Runner: permutation setup panicked"
                );
                aborted(&name, p, message)
            })
    }

    fn execute(&self, name: &str, case: &TestCase, plan: &CasePlan, p: usize) -> PermutationResult {
        let id = TestId::permutation(name, p);
        let seed = permutation_seed(name, p);
        let config_error = |err: PermError| {
            warn!(
                case = name,
                permutation = p,
                error = %err,
                "Runner: permutation aborted by configuration error"
            );
            aborted(name, p, err.to_string())
        };

        let resolved = plan
            .geometry(p)
            .and_then(|geometry| Ok((geometry, plan.define_set(p)?)));
        let (geometry, mut defines) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => return config_error(err),
        };
        match case.applies(&mut defines) {
            Ok(true) => {}
            Ok(false) => {
                debug!(case = name, permutation = p, "Runner: filtered out");
                let mut result = PermutationResult::new(
                    id,
                    seed,
                    Outcome::Skipped {
                        reason: "filter".to_owned(),
                    },
                );
                result.geometry = geometry.name.to_owned();
                return result;
            }
            Err(err) => return config_error(err),
        }
        let mut ctx = match RunContext::new(
            name,
            geometry,
            defines,
            Arc::clone(&self.trace),
            self.config.validate_configs,
        ) {
            Ok(ctx) => ctx,
            Err(err) => return config_error(err),
        };

        let reentrant = case.test_flags().contains(TestFlags::REENTRANT);
        let run = case.run_fn();
        let mut powerloss_cycles = Vec::new();
        let mut attempt = 0_usize;
        let outcome = loop {
            if reentrant {
                ctx.bd().set_power_cycles(self.config.powerloss.countdown(attempt));
            }
            let returned = panic::catch_unwind(AssertUnwindSafe(|| run(&mut ctx)));
            ctx.bd().set_power_cycles(None);
            match returned {
                Ok(Ok(())) => break Outcome::Passed,
                Ok(Err(failure)) if reentrant && failure.is_power_loss() => {
                    powerloss_cycles.push(ctx.device().power_cycles());
                    if ctx.powerlosses() >= self.config.max_powerlosses {
                        break Outcome::Failed {
                            kind: FailureKind::PowerLoss,
                            message: format!(
                                "no attempt completed within {} power losses",
                                self.config.max_powerlosses
                            ),
                        };
                    }
                    debug!(
                        case = name,
                        permutation = p,
                        attempt,
                        cycles = ctx.device().power_cycles(),
                        "Runner: power loss, rerunning body"
                    );
                    attempt += 1;
                    ctx.reseed();
                }
                Ok(Err(failure)) => {
                    break Outcome::Failed {
                        kind: failure.kind,
                        message: failure.message,
                    };
                }
                Err(payload) => {
                    break Outcome::Failed {
                        kind: FailureKind::Assertion,
                        message: panic_message(payload.as_ref()),
                    };
                }
            }
        };

        if let Outcome::Failed { message, .. } = &outcome {
            warn!(
                case = name,
                permutation = p,
                message = %message,
                "Runner: permutation failed"
            );
        }
        let mut result = PermutationResult::new(id, seed, outcome);
        result.geometry = geometry.name.to_owned();
        result.powerlosses = ctx.powerlosses();
        result.powerloss_cycles = powerloss_cycles;
        result.fingerprint = Some(ctx.device().fingerprint());
        result.device_ops = ctx.device().ops().len();
        result.ops_digest = Some(ops_digest(ctx.device().ops()));
        debug!(
            case = name,
            permutation = p,
            outcome = ?result.outcome,
            powerlosses = result.powerlosses,
            "Runner: permutation finished"
        );
        result
    }
}

/// CRC-32C over the JSON encoding of an operation log.
#[must_use]
pub fn ops_digest(ops: &[BdOp]) -> u32 {
    ops.iter().fold(0, |crc, op| {
        crc32c::crc32c_append(crc, &serde_json::to_vec(op).unwrap_or_default())
    })
}

/// Result for a permutation that never reached its body.
fn aborted(name: &str, p: usize, message: String) -> PermutationResult {
    PermutationResult::new(
        TestId::permutation(name, p),
        permutation_seed(name, p),
        Outcome::ConfigError { message },
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_owned()
    }
}
