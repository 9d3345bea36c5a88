//! Type classification.
//!
//! Decides, in a fixed priority order, whether a value is returned as null,
//! returned unchanged, or structurally cloned. The immutability tables are
//! append-only; lazily discovered immutable classes are memoized with an
//! idempotent insert, so racing threads may both record the same class.

use dashmap::{DashMap, DashSet};
use mimic_heap::{Class, Introspector, Marker, ObjRef, Value};
use parking_lot::RwLock;

/// Outcome of classifying a value, in priority order
#[derive(Debug, Clone)]
pub enum Classification {
    /// Null input
    Null,
    /// The cloning engine's own handle; cloned as null
    ClonerHandle,
    /// Class carries the do-not-clone marker
    DoNotClone,
    /// Instance registered as immutable
    RegisteredInstance,
    /// Primitive, string or enum constant
    Primitive,
    /// Class registered to be replaced by null
    Nullified,
    /// Class known or discovered to be immutable
    Immutable,
    /// Needs a structural copy
    Structural(ObjRef),
}

impl Classification {
    /// Result for outcomes that need no copy, `None` for [`Classification::Structural`]
    pub fn short_circuit(&self, value: &Value) -> Option<Value> {
        match self {
            Classification::Null | Classification::ClonerHandle | Classification::Nullified => {
                Some(Value::Null)
            }
            Classification::DoNotClone
            | Classification::RegisteredInstance
            | Classification::Primitive
            | Classification::Immutable => Some(value.clone()),
            Classification::Structural(_) => None,
        }
    }
}

/// Known immutable classes and instances
#[derive(Default)]
pub struct ImmutableRegistry {
    /// Exact classes, including memoized discoveries
    classes: DashSet<Class>,
    /// Supertypes whose every subtype is immutable, in registration order
    is_a: RwLock<Vec<Class>>,
    /// Individual instances, keyed by address
    instances: DashMap<usize, ObjRef>,
    /// Classes whose instances clone to null
    nullified: DashSet<Class>,
}

impl ImmutableRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat instances of exactly `class` as immutable
    pub fn register_class(&self, class: &Class) {
        if self.classes.insert(class.clone()) {
            tracing::debug!(class = class.name(), "registered immutable class");
        }
    }

    /// Treat instances of `class` and every subtype as immutable
    pub fn register_instance_of(&self, class: &Class) {
        let mut is_a = self.is_a.write();
        if !is_a.contains(class) {
            tracing::debug!(class = class.name(), "registered immutable supertype");
            is_a.push(class.clone());
        }
    }

    /// Treat one instance as immutable
    pub fn register_instance(&self, obj: &ObjRef) {
        self.instances.insert(obj.addr(), obj.clone());
    }

    /// Whether the instance was registered as immutable
    pub fn is_registered_instance(&self, obj: &ObjRef) -> bool {
        self.instances.contains_key(&obj.addr())
    }

    /// Clone instances of exactly `class` as null
    pub fn register_nullified(&self, class: &Class) {
        self.nullified.insert(class.clone());
    }

    /// Whether instances of `class` are immutable.
    ///
    /// Checks the exact table, then the `Immutable` marker on the class and its
    /// ancestors (the universal base excluded), then the is-a table. A positive
    /// answer is memoized against `class` itself, even when the marker sits on
    /// an ancestor whose declaration excludes subclasses.
    pub fn is_immutable_class(&self, class: &Class, introspector: &dyn Introspector) -> bool {
        if self.classes.contains(class) {
            return true;
        }
        let discovered = has_immutable_marker(class, introspector)
            || self.is_a.read().iter().any(|t| t.is_assignable_from(class));
        if discovered {
            tracing::trace!(class = class.name(), "memoized immutable class");
            self.classes.insert(class.clone());
        }
        discovered
    }

    /// Classify `value`. `handle` is the engine's own handle object.
    pub fn classify(
        &self,
        value: &Value,
        handle: &ObjRef,
        introspector: &dyn Introspector,
    ) -> Classification {
        let obj = match value {
            Value::Null => return Classification::Null,
            Value::Object(obj) => obj,
            Value::Enum(_)
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Char(_)
            | Value::Str(_) => return Classification::Primitive,
        };
        if obj.ptr_eq(handle) {
            return Classification::ClonerHandle;
        }
        let class = obj.class();
        if has_do_not_clone_marker(class, introspector) {
            return Classification::DoNotClone;
        }
        if self.is_registered_instance(obj) {
            return Classification::RegisteredInstance;
        }
        if class.is_enum() {
            return Classification::Primitive;
        }
        if self.nullified.contains(class) {
            return Classification::Nullified;
        }
        if self.is_immutable_class(class, introspector) {
            return Classification::Immutable;
        }
        Classification::Structural(obj.clone())
    }
}

fn has_immutable_marker(class: &Class, introspector: &dyn Introspector) -> bool {
    std::iter::once(class)
        .chain(class.ancestors())
        .take_while(|c| !c.is_universal_base())
        .any(|c| {
            introspector
                .declared_markers(c)
                .iter()
                .any(|m| matches!(m, Marker::Immutable { .. }))
        })
}

/// The do-not-clone marker is a capability: it is inherited through both
/// superclasses and interfaces.
fn has_do_not_clone_marker(class: &Class, introspector: &dyn Introspector) -> bool {
    if introspector.declared_markers(class).contains(&Marker::DoNotClone) {
        return true;
    }
    class
        .superclass()
        .into_iter()
        .chain(class.interfaces())
        .any(|parent| has_do_not_clone_marker(parent, introspector))
}
