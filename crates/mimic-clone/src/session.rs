//! Identity map for one clone session.

use mimic_heap::{ObjRef, Value};
use rustc_hash::FxHashMap;

/// Map from source object to the clone produced for it.
///
/// Keyed by object address. Each entry also holds the source reference so the
/// address cannot be reused while the session is alive. A map may be reused
/// across calls to share one reference space; after a failed clone call its
/// contents are unspecified and it should be dropped.
#[derive(Default)]
pub struct IdentityMap {
    entries: FxHashMap<usize, (ObjRef, Value)>,
}

impl IdentityMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with every object in `instances` mapped to itself
    pub fn excluding<'a>(instances: impl IntoIterator<Item = &'a ObjRef>) -> Self {
        let mut map = Self::new();
        for obj in instances {
            map.exclude(obj);
        }
        map
    }

    /// Clone previously produced for `source`
    pub fn get(&self, source: &ObjRef) -> Option<Value> {
        self.entries.get(&source.addr()).map(|(_, clone)| clone.clone())
    }

    /// Whether `source` has been seen
    pub fn contains(&self, source: &ObjRef) -> bool {
        self.entries.contains_key(&source.addr())
    }

    /// Record the clone of `source`
    pub fn insert(&mut self, source: &ObjRef, clone: Value) {
        self.entries.insert(source.addr(), (source.clone(), clone));
    }

    /// Map `obj` to itself so it is shared instead of copied
    pub fn exclude(&mut self, obj: &ObjRef) {
        self.insert(obj, Value::Object(obj.clone()));
    }

    /// Number of recorded objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Empty check
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMap")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Record `clone` for `source` when a map is being tracked
pub(crate) fn record(map: &mut Option<&mut IdentityMap>, source: &ObjRef, clone: &Value) {
    if let Some(map) = map.as_deref_mut() {
        map.insert(source, clone.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_heap::ClassBuilder;

    #[test]
    fn test_excluded_instances_map_to_themselves() {
        let class = ClassBuilder::new("Cache").build();
        let cache = ObjRef::allocate(&class).unwrap();
        let map = IdentityMap::excluding([&cache]);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&cache), Some(Value::Object(cache.clone())));
    }

    #[test]
    fn test_lookup_is_by_identity() {
        let class = ClassBuilder::new("Item").build();
        let a = ObjRef::allocate(&class).unwrap();
        let b = ObjRef::allocate(&class).unwrap();
        let mut map = IdentityMap::new();
        map.insert(&a, Value::Int(1));

        assert!(map.contains(&a));
        assert!(!map.contains(&b));
        assert!(map.get(&b).is_none());
    }
}
