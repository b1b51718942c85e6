//! The combined permutation space of one test case.
//!
//! # Layout
//!
//! A permutation index `p` is a mixed-radix number, least significant digit
//! first, over these dimensions in this order:
//!
//! 1. the selected geometry presets,
//! 2. the case's defines in declaration order, except those an override
//!    shadows,
//! 3. the overrides in the order given.
//!
//! Decoding peels one digit at a time (`digit = p % radix; p /= radix`), so
//! a single-valued define contributes a radix of 1 and never changes the
//! index. Enumeration and resolution both go through [`PermutationSpace`],
//! which keeps the two in agreement.

use std::sync::Arc;

use lfsperm_error::{PermError, Result};
use lfsperm_types::{DefineId, GEOMETRY_DEFINE_COUNT, Geometry};
use tracing::debug;

use crate::define::{Define, DefineFn, DefineTable};
use crate::overrides::DefineOverride;
use crate::registry::TestCase;
use crate::resolve::{DefineSet, Source};

/// Split `p` into one digit per radix, least significant first.
///
/// Digits are only meaningful for `p` below the product of `radices`; a zero
/// radix yields a zero digit.
#[must_use]
pub fn decode_mixed_radix(mut p: usize, radices: &[usize]) -> Vec<usize> {
    radices
        .iter()
        .map(|&radix| {
            if radix == 0 {
                return 0;
            }
            let digit = p % radix;
            p /= radix;
            digit
        })
        .collect()
}

/// Inverse of [`decode_mixed_radix`]. `None` when a digit is not below its
/// radix or the result overflows.
#[must_use]
pub fn encode_mixed_radix(digits: &[usize], radices: &[usize]) -> Option<usize> {
    if digits.len() != radices.len() {
        return None;
    }
    digits
        .iter()
        .zip(radices)
        .rev()
        .try_fold(0_usize, |acc, (&digit, &radix)| {
            if digit >= radix {
                return None;
            }
            acc.checked_mul(radix)?.checked_add(digit)
        })
}

/// A checked cartesian product of dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationSpace {
    radices: Vec<usize>,
    count: usize,
}

impl PermutationSpace {
    /// Space over `radices`, failing when the product overflows `usize`.
    pub fn new(owner: &str, radices: Vec<usize>) -> Result<Self> {
        let count = radices
            .iter()
            .try_fold(1_usize, |acc, &radix| acc.checked_mul(radix))
            .ok_or_else(|| PermError::PermutationSpaceOverflow {
                case: owner.to_owned(),
            })?;
        Ok(Self { radices, count })
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn radices(&self) -> &[usize] {
        &self.radices
    }

    /// Digits of `p`, or [`PermError::PermutationOutOfRange`].
    pub fn decode(&self, p: usize) -> Result<Vec<usize>> {
        if p >= self.count {
            return Err(PermError::PermutationOutOfRange {
                index: p,
                count: self.count,
            });
        }
        Ok(decode_mixed_radix(p, &self.radices))
    }

    /// Index of `digits`, or [`PermError::PermutationOutOfRange`] when a digit
    /// is not below its radix.
    pub fn encode(&self, digits: &[usize]) -> Result<usize> {
        encode_mixed_radix(digits, &self.radices).ok_or(PermError::PermutationOutOfRange {
            index: usize::MAX,
            count: self.count,
        })
    }
}

#[derive(Clone)]
struct CaseDimension {
    id: DefineId,
    name: String,
    value: DefineFn,
}

#[derive(Debug, Clone)]
struct OverrideDimension {
    id: DefineId,
    values: Vec<i64>,
}

/// Everything needed to turn a permutation index of one case into a
/// [`DefineSet`].
#[derive(Clone)]
pub struct CasePlan {
    case: String,
    table: Arc<DefineTable>,
    geometries: Vec<Geometry>,
    defines: Vec<CaseDimension>,
    overrides: Vec<OverrideDimension>,
    space: PermutationSpace,
}

impl std::fmt::Debug for CasePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasePlan")
            .field("case", &self.case)
            .field(
                "geometries",
                &self.geometries.iter().map(|g| g.name).collect::<Vec<_>>(),
            )
            .field(
                "defines",
                &self.defines.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            )
            .field("overrides", &self.overrides)
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

impl CasePlan {
    /// Lay out the space of `case_name`.
    ///
    /// Overrides that name a define missing from `table` are ignored.
    pub fn new(
        case_name: &str,
        table: Arc<DefineTable>,
        defines: &[Define],
        geometries: &[Geometry],
        overrides: &[DefineOverride],
    ) -> Result<Self> {
        if geometries.is_empty() {
            return Err(PermError::invalid_config("geometry", "no geometry selected"));
        }

        let mut override_dims: Vec<OverrideDimension> = Vec::with_capacity(overrides.len());
        for ov in overrides {
            let Some(id) = table.id(&ov.name) else {
                debug!(
                    case = case_name,
                    define = %ov.name,
                    "CasePlan: override not declared, ignored"
                );
                continue;
            };
            if override_dims.iter().any(|dim| dim.id == id) {
                return Err(PermError::DuplicateDefine {
                    name: ov.name.clone(),
                });
            }
            if ov.values.is_empty() {
                return Err(PermError::invalid_override(ov.to_string(), "no values"));
            }
            override_dims.push(OverrideDimension {
                id,
                values: ov.values.clone(),
            });
        }

        let mut define_dims: Vec<CaseDimension> = Vec::with_capacity(defines.len());
        let mut define_radices = Vec::with_capacity(defines.len());
        for define in defines {
            let id = table.require(define.name())?;
            if define_dims.iter().any(|dim| dim.id == id) {
                return Err(PermError::DuplicateDefine {
                    name: define.name().to_owned(),
                });
            }
            if define.permutations() == 0 {
                return Err(PermError::invalid_config(
                    define.name(),
                    format!("{case_name} gives it no candidate values"),
                ));
            }
            if override_dims.iter().any(|dim| dim.id == id) {
                continue;
            }
            define_dims.push(CaseDimension {
                id,
                name: define.name().to_owned(),
                value: define.value_fn(),
            });
            define_radices.push(define.permutations());
        }

        let radices = std::iter::once(geometries.len())
            .chain(define_radices)
            .chain(override_dims.iter().map(|dim| dim.values.len()))
            .collect();
        let space = PermutationSpace::new(case_name, radices)?;
        debug!(
            case = case_name,
            geometries = geometries.len(),
            defines = define_dims.len(),
            overrides = override_dims.len(),
            permutations = space.count(),
            "CasePlan: space laid out"
        );

        Ok(Self {
            case: case_name.to_owned(),
            table,
            geometries: geometries.to_vec(),
            defines: define_dims,
            overrides: override_dims,
            space,
        })
    }

    /// Plan for a registered case.
    pub fn for_case(
        case: &TestCase,
        table: Arc<DefineTable>,
        geometries: &[Geometry],
        overrides: &[DefineOverride],
    ) -> Result<Self> {
        Self::new(case.name(), table, case.defines(), geometries, overrides)
    }

    #[must_use]
    pub fn case(&self) -> &str {
        &self.case
    }

    /// Number of permutations: the product of every dimension's radix.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.space.count()
    }

    #[must_use]
    pub const fn space(&self) -> &PermutationSpace {
        &self.space
    }

    /// Geometry preset permutation `p` runs against.
    pub fn geometry(&self, p: usize) -> Result<Geometry> {
        let digits = self.space.decode(p)?;
        Ok(self.geometries[digits[0]])
    }

    /// Fresh, unresolved define set for permutation `p`.
    pub fn define_set(&self, p: usize) -> Result<DefineSet> {
        let digits = self.space.decode(p)?;
        let mut set = DefineSet::new(Arc::clone(&self.table), p);

        let geometry = self.geometries[digits[0]];
        for slot in 0..GEOMETRY_DEFINE_COUNT {
            let value = geometry
                .value_at(slot)
                .ok_or_else(|| PermError::internal(format!("geometry slot {slot}")))?;
            set.provide_value(DefineId(slot), value, Source::Geometry)?;
        }

        let define_digits = &digits[1..=self.defines.len()];
        for (dim, &sub_index) in self.defines.iter().zip(define_digits) {
            set.provide_callback(dim.id, Arc::clone(&dim.value), sub_index, Source::Case)?;
        }

        let override_digits = &digits[1 + self.defines.len()..];
        for (dim, &sub_index) in self.overrides.iter().zip(override_digits) {
            set.provide_value(dim.id, dim.values[sub_index], Source::Override)?;
        }

        debug!(
            case = %self.case,
            permutation = p,
            geometry = geometry.name,
            "CasePlan: define set built"
        );
        Ok(set)
    }
}
