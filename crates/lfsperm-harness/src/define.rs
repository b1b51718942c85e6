//! Define declarations: names, value providers and the implicit default table.
//!
//! A define is a named integer with one or more candidate values. Its value
//! comes from a provider called with a sub-index in `[0, permutations)` and
//! the [`DefineSet`] of the permutation being resolved, so a provider may
//! read other defines.

use std::fmt;
use std::sync::Arc;

use lfsperm_error::{PermError, Result};
use lfsperm_types::{
    BadBlockBehavior, DefineId, IMPLICIT_DEFINE_COUNT, IMPLICIT_DEFINE_NAMES, PowerlossBehavior,
};

use crate::resolve::DefineSet;

/// Value callback: `(defines, sub_index) -> value`.
pub type DefineFn = Arc<dyn Fn(&mut DefineSet, usize) -> Result<i64> + Send + Sync>;

/// Box a closure as a [`DefineFn`].
pub fn define_fn<F>(f: F) -> DefineFn
where
    F: Fn(&mut DefineSet, usize) -> Result<i64> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A declared define with its candidate count and value callback.
#[derive(Clone)]
pub struct Define {
    name: String,
    permutations: usize,
    value: DefineFn,
}

impl fmt::Debug for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Define")
            .field("name", &self.name)
            .field("permutations", &self.permutations)
            .finish_non_exhaustive()
    }
}

impl Define {
    /// A define with one fixed value.
    #[must_use]
    pub fn fixed(name: impl Into<String>, value: i64) -> Self {
        Self::with(name, 1, move |_, _| Ok(value))
    }

    /// A define swept over `values`, one permutation per entry.
    #[must_use]
    pub fn list(name: impl Into<String>, values: impl Into<Vec<i64>>) -> Self {
        let values: Arc<[i64]> = values.into().into();
        let count = values.len();
        Self::with(name, count, move |_, i| {
            values
                .get(i)
                .copied()
                .ok_or_else(|| PermError::internal(format!("sub-index {i} beyond {count} values")))
        })
    }

    /// A single-valued define computed from other defines.
    #[must_use]
    pub fn expr<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut DefineSet) -> Result<i64> + Send + Sync + 'static,
    {
        Self::with(name, 1, move |defines, _| f(defines))
    }

    /// A define with `permutations` candidates produced by `f`.
    #[must_use]
    pub fn with<F>(name: impl Into<String>, permutations: usize, f: F) -> Self
    where
        F: Fn(&mut DefineSet, usize) -> Result<i64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            permutations,
            value: define_fn(f),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of candidate values; `1` for fixed defines.
    #[must_use]
    pub const fn permutations(&self) -> usize {
        self.permutations
    }

    #[must_use]
    pub fn value_fn(&self) -> DefineFn {
        Arc::clone(&self.value)
    }
}

/// Names of every define a suite can address, implicit ones first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineTable {
    names: Vec<String>,
}

impl DefineTable {
    /// Table with only the implicit defines.
    #[must_use]
    pub fn implicit() -> Self {
        Self {
            names: IMPLICIT_DEFINE_NAMES.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    /// Implicit defines followed by `suite_names` in order.
    pub fn with_suite_names<I, S>(suite_names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::implicit();
        for name in suite_names {
            let name = name.into();
            if table.id(&name).is_some() {
                return Err(PermError::DuplicateDefine { name });
            }
            table.names.push(name);
        }
        Ok(table)
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<DefineId> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(DefineId)
    }

    /// Like [`Self::id`], failing with [`PermError::UnknownDefine`].
    pub fn require(&self, name: &str) -> Result<DefineId> {
        self.id(name).ok_or_else(|| PermError::UnknownDefine {
            name: name.to_owned(),
        })
    }

    #[must_use]
    pub fn name(&self, id: DefineId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// Names declared by the suite, without the implicit ones.
    #[must_use]
    pub fn suite_names(&self) -> &[String] {
        &self.names[IMPLICIT_DEFINE_COUNT..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn checked_div(name: &str, dividend: i64, divisor: i64) -> Result<i64> {
    dividend
        .checked_div(divisor)
        .ok_or_else(|| PermError::callback(name, format!("{dividend}/{divisor}")))
}

/// Default expression for an implicit define.
///
/// | define             | default                                  |
/// |--------------------|------------------------------------------|
/// | READ_SIZE          | PROG_SIZE                                |
/// | PROG_SIZE          | BLOCK_SIZE                               |
/// | BLOCK_SIZE         | 0                                        |
/// | BLOCK_COUNT        | DISK_SIZE/BLOCK_SIZE                     |
/// | DISK_SIZE          | 1024*1024                                |
/// | CACHE_SIZE         | max(16, max(READ_SIZE, PROG_SIZE))       |
/// | INLINE_SIZE        | BLOCK_SIZE/8                             |
/// | FRAGMENT_SIZE      | CACHE_SIZE                               |
/// | CRYSTALLIZE_SIZE   | BLOCK_SIZE/4                             |
/// | LOOKAHEAD_SIZE     | 16                                       |
/// | BLOCK_CYCLES       | -1                                       |
/// | ERASE_VALUE        | 0xff                                     |
/// | ERASE_CYCLES       | 0                                        |
/// | BADBLOCK_BEHAVIOR  | prog error                               |
/// | POWERLOSS_BEHAVIOR | noop                                     |
#[must_use]
pub fn implicit_default(id: DefineId) -> Option<DefineFn> {
    let f: DefineFn = match id {
        DefineId::READ_SIZE => define_fn(|d, _| d.get(DefineId::PROG_SIZE)),
        DefineId::PROG_SIZE => define_fn(|d, _| d.get(DefineId::BLOCK_SIZE)),
        DefineId::BLOCK_SIZE => define_fn(|_, _| Ok(0)),
        DefineId::BLOCK_COUNT => define_fn(|d, _| {
            let disk_size = d.get(DefineId::DISK_SIZE)?;
            let block_size = d.get(DefineId::BLOCK_SIZE)?;
            checked_div("BLOCK_COUNT", disk_size, block_size)
        }),
        DefineId::DISK_SIZE => define_fn(|_, _| Ok(1024 * 1024)),
        DefineId::CACHE_SIZE => define_fn(|d, _| {
            let read_size = d.get(DefineId::READ_SIZE)?;
            let prog_size = d.get(DefineId::PROG_SIZE)?;
            Ok(read_size.max(prog_size).max(16))
        }),
        DefineId::INLINE_SIZE => define_fn(|d, _| {
            checked_div("INLINE_SIZE", d.get(DefineId::BLOCK_SIZE)?, 8)
        }),
        DefineId::FRAGMENT_SIZE => define_fn(|d, _| d.get(DefineId::CACHE_SIZE)),
        DefineId::CRYSTALLIZE_SIZE => define_fn(|d, _| {
            checked_div("CRYSTALLIZE_SIZE", d.get(DefineId::BLOCK_SIZE)?, 4)
        }),
        DefineId::LOOKAHEAD_SIZE => define_fn(|_, _| Ok(16)),
        DefineId::BLOCK_CYCLES => define_fn(|_, _| Ok(-1)),
        DefineId::ERASE_VALUE => define_fn(|_, _| Ok(0xff)),
        DefineId::ERASE_CYCLES => define_fn(|_, _| Ok(0)),
        DefineId::BADBLOCK_BEHAVIOR => {
            define_fn(|_, _| Ok(BadBlockBehavior::ProgError.code()))
        }
        DefineId::POWERLOSS_BEHAVIOR => {
            define_fn(|_, _| Ok(PowerlossBehavior::Noop.code()))
        }
        _ => return None,
    };
    Some(f)
}
