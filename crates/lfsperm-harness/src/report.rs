//! Per-permutation results and the JSON run report.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use lfsperm_error::{PermError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::failure::FailureKind;
use crate::registry::TestId;

/// Version of the run report schema.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Terminal state of one permutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Skipped { reason: String },
    Failed { kind: FailureKind, message: String },
    /// The permutation could not be configured; the body never ran.
    ConfigError { message: String },
}

impl Outcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::ConfigError { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationResult {
    pub id: TestId,
    /// Geometry preset name; empty when the permutation never resolved one.
    pub geometry: String,
    pub outcome: Outcome,
    pub seed: u32,
    pub powerlosses: u64,
    /// Device power-cycle count at each injected power loss.
    pub powerloss_cycles: Vec<u64>,
    /// CRC-32C of the final device image.
    pub fingerprint: Option<u32>,
    pub device_ops: usize,
    /// CRC-32C over the serialized operation log.
    pub ops_digest: Option<u32>,
}

impl PermutationResult {
    #[must_use]
    pub fn new(id: TestId, seed: u32, outcome: Outcome) -> Self {
        Self {
            id,
            geometry: String::new(),
            outcome,
            seed,
            powerlosses: 0,
            powerloss_cycles: Vec::new(),
            fingerprint: None,
            device_ops: 0,
            ops_digest: None,
        }
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub config_errors: usize,
    pub results: Vec<PermutationResult>,
}

impl RunReport {
    #[must_use]
    pub fn from_results(results: Vec<PermutationResult>) -> Self {
        let mut report = Self {
            schema_version: REPORT_SCHEMA_VERSION,
            passed: 0,
            failed: 0,
            skipped: 0,
            config_errors: 0,
            results,
        };
        for result in &report.results {
            match result.outcome {
                Outcome::Passed => report.passed += 1,
                Outcome::Skipped { .. } => report.skipped += 1,
                Outcome::Failed { .. } => report.failed += 1,
                Outcome::ConfigError { .. } => report.config_errors += 1,
            }
        }
        report
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.config_errors == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &PermutationResult> {
        self.results
            .iter()
            .filter(|result| result.outcome.is_failure())
    }

    /// Ids to pass back to the runner to reproduce each failure.
    #[must_use]
    pub fn rerun_ids(&self) -> Vec<String> {
        self.failures().map(|result| result.id.to_string()).collect()
    }

    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = format!(
            "passed {}, failed {}, skipped {}, config errors {}\n",
            self.passed, self.failed, self.skipped, self.config_errors
        );
        for result in self.failures() {
            let message = match &result.outcome {
                Outcome::Failed { message, .. } | Outcome::ConfigError { message } => message,
                _ => continue,
            };
            let _ = writeln!(out, "  rerun {}: {message}", result.id);
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| PermError::internal(format!("serialize run report: {err}")))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json)?;
        info!(
            path = %path.display(),
            results = self.results.len(),
            "RunReport: written"
        );
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let report: Self = serde_json::from_slice(&bytes)
            .map_err(|err| PermError::invalid_config("report", err.to_string()))?;
        if report.schema_version != REPORT_SCHEMA_VERSION {
            warn!(
                expected = REPORT_SCHEMA_VERSION,
                found = report.schema_version,
                "RunReport: schema version mismatch"
            );
            return Err(PermError::invalid_config(
                "schema_version",
                format!(
                    "expected {REPORT_SCHEMA_VERSION}, got {}",
                    report.schema_version
                ),
            ));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        RunReport::from_results(vec![
            PermutationResult::new(TestId::permutation("a", 0), 1, Outcome::Passed),
            PermutationResult::new(
                TestId::permutation("a", 1),
                2,
                Outcome::Failed {
                    kind: FailureKind::Assertion,
                    message: "boom".to_owned(),
                },
            ),
            PermutationResult::new(
                TestId::case("b"),
                0,
                Outcome::Skipped {
                    reason: "internal".to_owned(),
                },
            ),
            PermutationResult::new(
                TestId::permutation("c", 7),
                3,
                Outcome::ConfigError {
                    message: "cyclic define dependency: A -> B -> A".to_owned(),
                },
            ),
        ])
    }

    #[test]
    fn counts_outcomes() {
        let report = sample();
        assert_eq!(
            (report.passed, report.failed, report.skipped, report.config_errors),
            (1, 1, 1, 1)
        );
        assert!(!report.is_success());
        assert_eq!(report.rerun_ids(), vec!["a:1".to_owned(), "c:7".to_owned()]);
    }

    #[test]
    fn summary_lists_rerun_ids() {
        let summary = sample().render_summary();
        assert!(summary.starts_with("passed 1, failed 1, skipped 1, config errors 1"));
        assert!(summary.contains("rerun a:1: boom"));
        assert!(summary.contains("rerun c:7: cyclic"));
    }

    #[test]
    fn outcome_json_is_tagged() {
        let json = serde_json::to_string(&Outcome::Skipped {
            reason: "filter".to_owned(),
        })
        .expect("serialize");
        assert_eq!(json, r#"{"status":"skipped","reason":"filter"}"#);
    }
}
