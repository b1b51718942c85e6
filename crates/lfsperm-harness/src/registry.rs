//! Test suites and cases, registered once at startup and never mutated.
//!
//! ```
//! use lfsperm_harness::{Define, TestCase, TestRegistry, TestSuite};
//!
//! let suite = TestSuite::builder("dirs")
//!     .path("tests/test_dirs.toml")
//!     .case(
//!         TestCase::new("test_dirs_many", |ctx| {
//!             let _n = ctx.define_by_name("N")?;
//!             Ok(())
//!         })
//!         .define(Define::list("N", vec![1, 2, 5, 10])),
//!     )
//!     .build()
//!     .expect("valid suite");
//! let registry = TestRegistry::new().suite(suite);
//! assert!(registry.find_case("dirs::test_dirs_many").is_some());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lfsperm_error::{PermError, Result};
use lfsperm_types::{DefineId, TestFlags};
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::define::{Define, DefineTable};
use crate::failure::TestFailure;
use crate::resolve::DefineSet;

/// Test body entry point.
pub type RunFn = Arc<dyn Fn(&mut RunContext) -> std::result::Result<(), TestFailure> + Send + Sync>;

/// Applicability predicate, evaluated against the permutation's defines.
pub type FilterFn = Arc<dyn Fn(&mut DefineSet) -> Result<bool> + Send + Sync>;

/// One test case: a body plus the defines it sweeps.
#[derive(Clone)]
pub struct TestCase {
    name: String,
    path: String,
    flags: TestFlags,
    defines: Vec<Define>,
    filter: Option<FilterFn>,
    run: RunFn,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("defines", &self.defines)
            .field("filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl TestCase {
    #[must_use]
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut RunContext) -> std::result::Result<(), TestFailure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            path: String::new(),
            flags: TestFlags::empty(),
            defines: Vec::new(),
            filter: None,
            run: Arc::new(run),
        }
    }

    /// Declaring file, for reports.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: TestFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Append a define. Declaration order is the permutation digit order.
    #[must_use]
    pub fn define(mut self, define: Define) -> Self {
        self.defines.push(define);
        self
    }

    /// Skip permutations for which `filter` returns false.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut DefineSet) -> Result<bool> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn test_flags(&self) -> TestFlags {
        self.flags
    }

    #[must_use]
    pub fn defines(&self) -> &[Define] {
        &self.defines
    }

    /// Product of this case's define cardinalities.
    ///
    /// Geometry and overrides widen the space further; see
    /// [`CasePlan::count`](crate::CasePlan::count).
    pub fn permutations(&self) -> Result<usize> {
        self.defines
            .iter()
            .try_fold(1_usize, |acc, define| acc.checked_mul(define.permutations()))
            .ok_or_else(|| PermError::PermutationSpaceOverflow {
                case: self.name.clone(),
            })
    }

    /// Whether the case applies to the permutation behind `defines`.
    pub fn applies(&self, defines: &mut DefineSet) -> Result<bool> {
        self.filter.as_ref().map_or(Ok(true), |filter| filter(defines))
    }

    #[must_use]
    pub fn run_fn(&self) -> RunFn {
        Arc::clone(&self.run)
    }
}

/// A named group of cases sharing one define table.
#[derive(Debug, Clone)]
pub struct TestSuite {
    name: String,
    path: String,
    flags: TestFlags,
    table: Arc<DefineTable>,
    cases: Vec<TestCase>,
}

/// Builder for [`TestSuite`].
#[derive(Debug)]
#[must_use]
pub struct TestSuiteBuilder {
    name: String,
    path: String,
    flags: TestFlags,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn builder(name: impl Into<String>) -> TestSuiteBuilder {
        TestSuiteBuilder {
            name: name.into(),
            path: String::new(),
            flags: TestFlags::empty(),
            cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn flags(&self) -> TestFlags {
        self.flags
    }

    /// Suite-specific define names in id order, for reporting.
    #[must_use]
    pub fn define_names(&self) -> &[String] {
        self.table.suite_names()
    }

    #[must_use]
    pub fn table(&self) -> Arc<DefineTable> {
        Arc::clone(&self.table)
    }

    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    #[must_use]
    pub fn case(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|case| case.name == name)
    }

    /// `suite::case`, the name results are reported and seeded under.
    #[must_use]
    pub fn case_id(&self, case: &TestCase) -> String {
        format!("{}::{}", self.name, case.name)
    }
}

impl TestSuiteBuilder {
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Flags applied to every case in the suite.
    pub fn flags(mut self, flags: TestFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Number suite defines by first appearance and check for duplicates.
    pub fn build(self) -> Result<TestSuite> {
        let mut suite_names: Vec<String> = Vec::new();
        let mut cases = Vec::with_capacity(self.cases.len());
        for mut case in self.cases {
            if cases.iter().any(|seen: &TestCase| seen.name == case.name) {
                return Err(PermError::invalid_config(
                    "case",
                    format!("{} declared twice in suite {}", case.name, self.name),
                ));
            }
            for (i, define) in case.defines.iter().enumerate() {
                if case.defines[..i]
                    .iter()
                    .any(|earlier| earlier.name() == define.name())
                {
                    return Err(PermError::DuplicateDefine {
                        name: define.name().to_owned(),
                    });
                }
                if DefineId::implicit_by_name(define.name()).is_none()
                    && !suite_names.iter().any(|name| name == define.name())
                {
                    suite_names.push(define.name().to_owned());
                }
            }
            case.flags |= self.flags;
            if case.path.is_empty() {
                case.path.clone_from(&self.path);
            }
            cases.push(case);
        }

        Ok(TestSuite {
            table: Arc::new(DefineTable::with_suite_names(suite_names)?),
            name: self.name,
            path: self.path,
            flags: self.flags,
            cases,
        })
    }
}

/// Every registered suite, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    suites: Vec<TestSuite>,
}

impl TestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn suite(mut self, suite: TestSuite) -> Self {
        self.suites.push(suite);
        self
    }

    #[must_use]
    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// Every `(suite, case)` pair in order.
    pub fn cases(&self) -> impl Iterator<Item = (&TestSuite, &TestCase)> {
        self.suites
            .iter()
            .flat_map(|suite| suite.cases.iter().map(move |case| (suite, case)))
    }

    /// Look up `suite::case`, or a bare case name registered in exactly one
    /// suite.
    #[must_use]
    pub fn find_case(&self, name: &str) -> Option<(&TestSuite, &TestCase)> {
        if let Some((suite_name, case_name)) = name.split_once("::") {
            let suite = self.suites.iter().find(|suite| suite.name == suite_name)?;
            return suite.case(case_name).map(|case| (suite, case));
        }
        let mut matches = self.cases().filter(|(_, case)| case.name == name);
        let found = matches.next()?;
        matches.next().is_none().then_some(found)
    }
}

/// Stable identity of a run: a case, optionally pinned to one permutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestId {
    pub case: String,
    pub permutation: Option<usize>,
}

impl TestId {
    #[must_use]
    pub fn case(case: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            permutation: None,
        }
    }

    #[must_use]
    pub fn permutation(case: impl Into<String>, permutation: usize) -> Self {
        Self {
            case: case.into(),
            permutation: Some(permutation),
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.permutation {
            Some(permutation) => write!(f, "{}:{permutation}", self.case),
            None => f.write_str(&self.case),
        }
    }
}

impl FromStr for TestId {
    type Err = PermError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid =
            |detail: &str| PermError::invalid_config("test id", format!("'{s}': {detail}"));
        // `suite::case:perm`, so split on the last single colon
        let (case, permutation) = match s.rsplit_once(':') {
            Some((case, perm)) if !case.ends_with(':') => {
                let permutation = perm
                    .parse::<usize>()
                    .map_err(|_| invalid("permutation is not an index"))?;
                (case, Some(permutation))
            }
            _ => (s, None),
        };
        if case.is_empty() {
            return Err(invalid("empty case name"));
        }
        Ok(Self {
            case: case.to_owned(),
            permutation,
        })
    }
}
