//! Per-type cloning strategies.

use crate::cloner::Cloner;
use crate::error::{CloneError, CloneResult};
use crate::session::IdentityMap;
use dashmap::DashMap;
use mimic_heap::{Class, ObjRef, Value};
use parking_lot::RwLock;
use std::sync::Arc;

/// A type-specific cloning algorithm.
///
/// Implementations create the new instance and clone children through
/// [`Cloner::clone_value`]. The engine records the returned value in `map`
/// when the strategy did not; a strategy whose children can lead back to the
/// source must record the new instance itself before filling it.
pub trait TypeCloner: Send + Sync {
    /// Clone `source`, whose class this strategy was registered for
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value>;
}

impl<F> TypeCloner for F
where
    F: Fn(&Cloner, &ObjRef, Option<&mut IdentityMap>, bool) -> CloneResult<Value> + Send + Sync,
{
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        self(cloner, source, map, deep)
    }
}

#[derive(Clone)]
struct ExactEntry {
    strategy: Arc<dyn TypeCloner>,
    /// Copied from the is-a table by a lookup rather than registered
    memoized: bool,
}

/// Exact-class and is-a strategy tables
#[derive(Default)]
pub struct StrategyRegistry {
    exact: DashMap<Class, ExactEntry>,
    is_a: RwLock<Vec<(Class, Arc<dyn TypeCloner>)>>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy` for exactly `class`.
    ///
    /// Fails if a strategy was already registered for the class. Entries
    /// cached from the is-a table are replaced.
    pub fn register(&self, class: &Class, strategy: Arc<dyn TypeCloner>) -> CloneResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.exact.entry(class.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().memoized {
                    return Err(CloneError::DuplicateStrategy {
                        class: class.name().to_string(),
                    });
                }
                occupied.insert(ExactEntry {
                    strategy,
                    memoized: false,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ExactEntry {
                    strategy,
                    memoized: false,
                });
            }
        }
        tracing::debug!(class = class.name(), "registered type cloner");
        Ok(())
    }

    /// Register `strategy` for `class` and every subtype without an exact entry.
    ///
    /// Is-a entries are consulted in registration order. Cached lookups are
    /// dropped so the new entry is seen.
    pub fn register_is_a(&self, class: &Class, strategy: Arc<dyn TypeCloner>) {
        self.is_a.write().push((class.clone(), strategy));
        self.exact.retain(|_, entry| !entry.memoized);
        tracing::debug!(class = class.name(), "registered is-a type cloner");
    }

    /// Remove the exact strategy for `class`, returning whether one existed
    pub fn unregister(&self, class: &Class) -> bool {
        let removed = self.exact.remove(class).is_some();
        if removed {
            tracing::debug!(class = class.name(), "unregistered type cloner");
        }
        removed
    }

    /// Strategy for `class`: exact entry first, then the first is-a entry
    /// assignable from it, which is cached under `class`
    pub fn lookup(&self, class: &Class) -> Option<Arc<dyn TypeCloner>> {
        if let Some(entry) = self.exact.get(class) {
            return Some(entry.strategy.clone());
        }
        let strategy = self
            .is_a
            .read()
            .iter()
            .find(|(supertype, _)| supertype.is_assignable_from(class))
            .map(|(_, strategy)| strategy.clone())?;
        tracing::trace!(class = class.name(), "cached is-a type cloner");
        self.exact.entry(class.clone()).or_insert(ExactEntry {
            strategy: strategy.clone(),
            memoized: true,
        });
        Some(strategy)
    }

    /// Whether an exact (registered, not cached) strategy exists for `class`
    pub fn has_exact(&self, class: &Class) -> bool {
        self.exact.get(class).is_some_and(|entry| !entry.memoized)
    }
}
