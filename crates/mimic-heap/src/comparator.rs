//! Ordering functions for sorted containers

use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type CompareFn = dyn Fn(&Value, &Value) -> Ordering + Send + Sync;

/// A shared ordering function.
///
/// Comparators are stateless, so copies of a sorted container share the
/// original's comparator. Two comparators are equal when they are the same
/// function instance.
#[derive(Clone)]
pub struct Comparator {
    name: Arc<str>,
    compare: Arc<CompareFn>,
}

impl Comparator {
    /// Wrap an ordering function
    pub fn new<F>(name: impl Into<Arc<str>>, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compare: Arc::new(compare),
        }
    }

    /// Reverse of natural ordering
    pub fn reverse_natural() -> Self {
        Self::new("reverse-natural", |a, b| b.natural_cmp(a))
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compare two values
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        (self.compare)(a, b)
    }
}

/// Compare with `comparator`, or natural ordering when absent
pub fn compare_with(comparator: Option<&Comparator>, a: &Value, b: &Value) -> Ordering {
    match comparator {
        Some(cmp) => cmp.compare(a, b),
        None => a.natural_cmp(b),
    }
}

impl PartialEq for Comparator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.compare, &other.compare)
    }
}

impl Eq for Comparator {}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comparator({})", self.name)
    }
}
