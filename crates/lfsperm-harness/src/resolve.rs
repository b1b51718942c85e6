//! Lazy, cached define resolution for one permutation.
//!
//! Every define starts `Unresolved`. The first [`DefineSet::get`] marks it
//! `Resolving`, runs its provider (which may read other defines through the
//! same set) and caches the result as `Resolved`. Reading a define that is
//! still `Resolving` means its provider depends on itself; that aborts the
//! permutation with [`PermError::CyclicDefine`] naming the whole chain.
//! Once a cycle is seen the set stays poisoned: providers that catch the
//! error still fail, and so does every define not yet resolved.
//!
//! A provider that fails is not retried. Later reads of the same define
//! return the same error without calling it again.
//!
//! A `DefineSet` is owned by exactly one permutation. Nothing in it is
//! shared with other permutations, so sets can be built and resolved on
//! different threads freely.

use std::sync::Arc;

use lfsperm_error::{PermError, Result};
use lfsperm_types::{DefineId, IMPLICIT_DEFINE_COUNT, TestConfig};
use serde::Serialize;
use tracing::debug;

use crate::define::{DefineFn, DefineTable, implicit_default};

/// Which layer supplied a define's provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Implicit,
    Geometry,
    Case,
    Override,
}

#[derive(Clone)]
enum Provider {
    Value(i64),
    Callback { f: DefineFn, sub_index: usize },
}

#[derive(Debug)]
enum Slot {
    Unresolved,
    Resolving,
    Resolved(i64),
    Failed(PermError),
}

/// Resolved and pending define values for one permutation.
pub struct DefineSet {
    table: Arc<DefineTable>,
    providers: Vec<Option<(Provider, Source)>>,
    slots: Vec<Slot>,
    resolving: Vec<DefineId>,
    cycle: Option<String>,
    permutation: usize,
}

impl std::fmt::Debug for DefineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefineSet")
            .field("permutation", &self.permutation)
            .field("defines", &self.table.len())
            .field("resolving", &self.resolving)
            .finish_non_exhaustive()
    }
}

impl DefineSet {
    /// A set with every implicit default installed and nothing resolved.
    #[must_use]
    pub fn new(table: Arc<DefineTable>, permutation: usize) -> Self {
        let len = table.len();
        let mut providers: Vec<Option<(Provider, Source)>> = vec![None; len];
        for (index, provider) in providers.iter_mut().enumerate().take(IMPLICIT_DEFINE_COUNT) {
            *provider = implicit_default(DefineId(index)).map(|f| {
                (
                    Provider::Callback { f, sub_index: 0 },
                    Source::Implicit,
                )
            });
        }
        Self {
            table,
            providers,
            slots: std::iter::repeat_with(|| Slot::Unresolved).take(len).collect(),
            resolving: Vec::new(),
            cycle: None,
            permutation,
        }
    }

    /// Install a fixed value for `id`, replacing any lower layer.
    pub fn provide_value(&mut self, id: DefineId, value: i64, source: Source) -> Result<()> {
        self.install(id, Provider::Value(value), source)
    }

    /// Install a callback evaluated with `sub_index` on first read.
    pub fn provide_callback(
        &mut self,
        id: DefineId,
        f: DefineFn,
        sub_index: usize,
        source: Source,
    ) -> Result<()> {
        self.install(id, Provider::Callback { f, sub_index }, source)
    }

    fn install(&mut self, id: DefineId, provider: Provider, source: Source) -> Result<()> {
        let slot = self
            .providers
            .get_mut(id.index())
            .ok_or_else(|| PermError::internal(format!("{id} outside define table")))?;
        *slot = Some((provider, source));
        self.slots[id.index()] = Slot::Unresolved;
        Ok(())
    }

    /// The combined permutation index this set was built for.
    #[must_use]
    pub const fn permutation(&self) -> usize {
        self.permutation
    }

    #[must_use]
    pub fn table(&self) -> &DefineTable {
        &self.table
    }

    /// Layer that provides `id`, if any.
    #[must_use]
    pub fn source(&self, id: DefineId) -> Option<Source> {
        self.providers
            .get(id.index())
            .and_then(|provider| provider.as_ref().map(|(_, source)| *source))
    }

    /// Whether `id` has already been computed in this permutation.
    #[must_use]
    pub fn is_resolved(&self, id: DefineId) -> bool {
        matches!(self.slots.get(id.index()), Some(Slot::Resolved(_)))
    }

    /// Resolve `id`, evaluating its provider at most once.
    pub fn get(&mut self, id: DefineId) -> Result<i64> {
        match self.slots.get(id.index()) {
            None => {
                return Err(PermError::UnknownDefine {
                    name: id.to_string(),
                });
            }
            Some(Slot::Resolved(value)) => return Ok(*value),
            Some(Slot::Failed(err)) => return Err(self.replay(id, err)),
            Some(Slot::Resolving) => {
                let chain = self.cycle_chain(id);
                self.cycle.get_or_insert_with(|| chain.clone());
                return Err(PermError::CyclicDefine { chain });
            }
            Some(Slot::Unresolved) => {}
        }
        if let Some(chain) = &self.cycle {
            return Err(PermError::CyclicDefine {
                chain: chain.clone(),
            });
        }

        let (provider, source) = self.providers[id.index()]
            .clone()
            .ok_or_else(|| PermError::UndefinedDefine {
                name: self.name_of(id),
            })?;

        let value = match provider {
            Provider::Value(value) => value,
            Provider::Callback { f, sub_index } => {
                self.slots[id.index()] = Slot::Resolving;
                self.resolving.push(id);
                let mut result = f(self, sub_index);
                self.resolving.pop();
                if let Some(chain) = &self.cycle {
                    result = Err(PermError::CyclicDefine {
                        chain: chain.clone(),
                    });
                }
                match result {
                    Ok(value) => value,
                    Err(err) => {
                        debug!(
                            define = %self.name_of(id),
                            error = %err,
                            permutation = self.permutation,
                            "DefineSet: provider failed"
                        );
                        let kept = self.replay(id, &err);
                        self.slots[id.index()] = Slot::Failed(kept);
                        return Err(err);
                    }
                }
            }
        };

        self.slots[id.index()] = Slot::Resolved(value);
        debug!(
            define = %self.name_of(id),
            value,
            source = ?source,
            permutation = self.permutation,
            "DefineSet: resolved"
        );
        Ok(value)
    }

    fn name_of(&self, id: DefineId) -> String {
        self.table
            .name(id)
            .map_or_else(|| id.to_string(), str::to_owned)
    }

    /// Resolve a define by name.
    pub fn get_by_name(&mut self, name: &str) -> Result<i64> {
        let id = self.table.require(name)?;
        self.get(id)
    }

    /// A copy of a provider failure, kept for repeated reads.
    fn replay(&self, id: DefineId, err: &PermError) -> PermError {
        match err {
            PermError::CyclicDefine { chain } => PermError::CyclicDefine {
                chain: chain.clone(),
            },
            PermError::UndefinedDefine { name } => {
                PermError::UndefinedDefine { name: name.clone() }
            }
            PermError::UnknownDefine { name } => PermError::UnknownDefine { name: name.clone() },
            PermError::DefineCallback { name, detail } => {
                PermError::callback(name.clone(), detail.clone())
            }
            other => PermError::callback(self.name_of(id), other.to_string()),
        }
    }

    fn cycle_chain(&self, id: DefineId) -> String {
        let start = self
            .resolving
            .iter()
            .position(|pending| *pending == id)
            .unwrap_or(0);
        let chain = self.resolving[start..]
            .iter()
            .chain(std::iter::once(&id))
            .map(|pending| self.table.name(*pending).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(" -> ");
        chain
    }

    /// Resolve all implicit defines, indexed by [`DefineId`].
    pub fn implicit_values(&mut self) -> Result<[i64; IMPLICIT_DEFINE_COUNT]> {
        let mut values = [0_i64; IMPLICIT_DEFINE_COUNT];
        for (index, value) in values.iter_mut().enumerate() {
            *value = self.get(DefineId(index))?;
        }
        Ok(values)
    }

    /// The configuration handle for this permutation.
    pub fn test_config(&mut self) -> Result<TestConfig> {
        TestConfig::from_values(&self.implicit_values()?)
    }

    /// Resolve every define that has a provider, in id order.
    ///
    /// Suite defines with no provider in this case are left out.
    pub fn resolved_values(&mut self) -> Result<Vec<(String, i64)>> {
        let mut values = Vec::with_capacity(self.table.len());
        for index in 0..self.table.len() {
            let id = DefineId(index);
            if self.providers[index].is_none() {
                continue;
            }
            let value = self.get(id)?;
            values.push((self.table.name(id).unwrap_or("?").to_owned(), value));
        }
        Ok(values)
    }
}
