//! The cloning engine.
//!
//! A [`Cloner`] walks an object graph and produces a copy that preserves its
//! sharing topology: every source object reachable in one session is copied at
//! most once, and a clone is recorded in the [`IdentityMap`] before any of its
//! children are visited so cycles resolve to the copy under construction.

use crate::builtin;
use crate::classify::{Classification, ImmutableRegistry};
use crate::config::ClonerConfig;
use crate::error::{CloneError, CloneResult};
use crate::session::{IdentityMap, record};
use crate::strategy::{StrategyRegistry, TypeCloner};
use mimic_heap::{
    Class, ClassBuilder, ClassRegistry, FieldType, HeapIntrospector, Introspector, ObjRef, Value,
    names,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Classes whose instances never change once built
const DEFAULT_IMMUTABLES: [&str; 7] = [
    names::CLASS,
    names::PATTERN,
    names::URI,
    names::UUID,
    names::DECIMAL,
    names::INSTANT,
    names::DURATION,
];

/// Deep and shallow object graph cloner.
///
/// Registration methods take `&self`, so one engine can be configured and
/// used from several threads at once. Each clone call carries its own
/// identity map.
pub struct Cloner {
    introspector: Arc<dyn Introspector>,
    immutables: ImmutableRegistry,
    strategies: StrategyRegistry,
    /// Instance standing for the engine inside object graphs
    handle: ObjRef,
    enabled: AtomicBool,
    null_transient: AtomicBool,
    allow_bypass: AtomicBool,
    dump_cloned_classes: AtomicBool,
}

impl Cloner {
    /// Engine over `classes` with the default configuration
    pub fn new(classes: &ClassRegistry) -> CloneResult<Self> {
        Self::from_config(classes, &ClonerConfig::default())
    }

    /// Engine reading objects through a custom introspector
    pub fn with_introspector(
        classes: &ClassRegistry,
        introspector: Arc<dyn Introspector>,
    ) -> CloneResult<Self> {
        Self::build(classes, introspector, &ClonerConfig::default())
    }

    /// Engine configured from `config`.
    ///
    /// Class names listed in the configuration must be registered in
    /// `classes`.
    pub fn from_config(classes: &ClassRegistry, config: &ClonerConfig) -> CloneResult<Self> {
        Self::build(classes, Arc::new(HeapIntrospector::new()), config)
    }

    fn build(
        classes: &ClassRegistry,
        introspector: Arc<dyn Introspector>,
        config: &ClonerConfig,
    ) -> CloneResult<Self> {
        let handle_class = classes.get(names::CLONER).unwrap_or_else(|| {
            ClassBuilder::new(names::CLONER)
                .without_default_constructor()
                .build()
        });
        let handle = ObjRef::allocate(&handle_class)
            .map_err(|e| CloneError::from_instantiation(names::CLONER, e))?;

        let cloner = Self {
            introspector,
            immutables: ImmutableRegistry::new(),
            strategies: StrategyRegistry::new(),
            handle,
            enabled: AtomicBool::new(config.enabled),
            null_transient: AtomicBool::new(config.null_transient),
            allow_bypass: AtomicBool::new(config.allow_bypass_construction),
            dump_cloned_classes: AtomicBool::new(config.dump_cloned_classes),
        };

        for class in DEFAULT_IMMUTABLES.iter().filter_map(|name| classes.get(name)) {
            cloner.immutables.register_class(&class);
        }
        builtin::install(&cloner.strategies, classes, config.builtin_strategies)?;

        let resolve = |name: &String| {
            classes
                .get(name)
                .ok_or_else(|| CloneError::UnknownClass(name.clone()))
        };
        for name in &config.immutable_classes {
            cloner.immutables.register_class(&resolve(name)?);
        }
        for name in &config.immutable_instance_of {
            cloner.immutables.register_instance_of(&resolve(name)?);
        }
        for name in &config.null_instead_of_clone {
            cloner.immutables.register_nullified(&resolve(name)?);
        }

        tracing::debug!(
            enabled = config.enabled,
            builtin_strategies = config.builtin_strategies,
            "cloner ready"
        );
        Ok(cloner)
    }

    // ---- settings ----

    /// The engine's own handle. Cloning it always yields null.
    pub fn handle(&self) -> Value {
        Value::Object(self.handle.clone())
    }

    /// Introspector used for every field and array access
    pub fn introspector(&self) -> &dyn Introspector {
        self.introspector.as_ref()
    }

    /// When disabled, every clone operation returns its input unchanged
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether cloning is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Reset transient fields to their default value instead of copying them
    pub fn set_null_transient(&self, null_transient: bool) {
        self.null_transient.store(null_transient, Ordering::Relaxed);
    }

    /// Allow instantiating classes without a no-argument constructor
    pub fn set_allow_bypass_construction(&self, allow: bool) {
        self.allow_bypass.store(allow, Ordering::Relaxed);
    }

    /// Log the class of every object copied structurally
    pub fn set_dump_cloned_classes(&self, dump: bool) {
        self.dump_cloned_classes.store(dump, Ordering::Relaxed);
    }

    // ---- registration ----

    /// Share instances of exactly `class` instead of copying them
    pub fn register_immutable_class(&self, class: &Class) {
        self.immutables.register_class(class);
    }

    /// Share instances of `class` and all of its subtypes
    pub fn register_immutable_instance_of(&self, class: &Class) {
        self.immutables.register_instance_of(class);
    }

    /// Share one value. Non-object values are always shared already.
    pub fn register_immutable_value(&self, value: &Value) {
        if let Value::Object(obj) = value {
            self.immutables.register_instance(obj);
        }
    }

    /// Share the current values of the named static fields of `class`.
    ///
    /// Commonly used for singletons and constant tables held in statics.
    pub fn register_static_fields(&self, class: &Class, fields: &[&str]) -> CloneResult<()> {
        for &name in fields {
            let field = self
                .introspector
                .static_field(class, name)
                .ok_or_else(|| CloneError::NoSuchStaticField {
                    class: class.name().to_string(),
                    field: name.to_string(),
                })?;
            let value = self
                .introspector
                .read_static(class, &field)
                .map_err(|e| CloneError::FieldAccess {
                    object: class.name().to_string(),
                    field: name.to_string(),
                    source: e,
                })?;
            self.register_immutable_value(&value);
        }
        Ok(())
    }

    /// Clone instances of exactly `class` with `strategy`
    pub fn register_type_cloner(
        &self,
        class: &Class,
        strategy: impl TypeCloner + 'static,
    ) -> CloneResult<()> {
        self.strategies.register(class, Arc::new(strategy))
    }

    /// Clone instances of `class` and its subtypes with `strategy`, unless a
    /// more specific exact strategy exists
    pub fn register_is_a_cloner(&self, class: &Class, strategy: impl TypeCloner + 'static) {
        self.strategies.register_is_a(class, Arc::new(strategy));
    }

    /// Drop the exact strategy for `class`, returning whether one existed
    pub fn unregister_type_cloner(&self, class: &Class) -> bool {
        self.strategies.unregister(class)
    }

    /// Replace instances of exactly `class` with null in every clone
    pub fn null_instead_of_clone(&self, class: &Class) {
        self.immutables.register_nullified(class);
    }

    /// Whether instances of `class` are shared instead of copied
    pub fn is_immutable(&self, class: &Class) -> bool {
        self.immutables.is_immutable_class(class, self.introspector.as_ref())
    }

    /// How `value` would be treated by a clone call
    pub fn classify(&self, value: &Value) -> Classification {
        self.immutables.classify(value, &self.handle, self.introspector.as_ref())
    }

    // ---- cloning ----

    /// Deep copy of `value` in a fresh session
    pub fn deep_clone(&self, value: &Value) -> CloneResult<Value> {
        let mut map = IdentityMap::new();
        self.clone_value(value, Some(&mut map), true)
    }

    /// Deep copy of `value` sharing `map` with earlier calls, so objects
    /// already cloned through the map are reused
    pub fn deep_clone_with(&self, value: &Value, map: &mut IdentityMap) -> CloneResult<Value> {
        self.clone_value(value, Some(map), true)
    }

    /// Deep copy of `value` that shares every object in `instances`
    pub fn deep_clone_excluding(&self, value: &Value, instances: &[ObjRef]) -> CloneResult<Value> {
        let mut map = IdentityMap::excluding(instances);
        self.clone_value(value, Some(&mut map), true)
    }

    /// One-level copy of `value`: a new top-level object whose fields refer
    /// to the same children as the source
    pub fn shallow_clone(&self, value: &Value) -> CloneResult<Value> {
        self.clone_value(value, None, false)
    }

    /// Copy every instance field declared by `source`'s class and its
    /// ancestors into `target`, which must be an instance of that class
    pub fn shallow_clone_into(&self, source: &ObjRef, target: &ObjRef) -> CloneResult<()> {
        if !source.class().is_assignable_from(target.class()) {
            return Err(CloneError::IncompatibleTarget {
                from: source.class().name().to_string(),
                into: target.class().name().to_string(),
            });
        }
        self.copy_fields(source, target, None, false)
    }

    /// Clone one value.
    ///
    /// With a map, every object is recorded and previously seen objects are
    /// reused. Without one nothing is tracked, which is only safe for
    /// acyclic graphs or shallow copies.
    pub fn clone_value(
        &self,
        value: &Value,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        if !self.is_enabled() {
            return Ok(value.clone());
        }
        let obj = match self.classify(value) {
            Classification::Structural(obj) => obj,
            other => return Ok(other.short_circuit(value).unwrap_or(Value::Null)),
        };
        if let Some(seen) = map.as_deref()
            && let Some(clone) = seen.get(&obj)
        {
            return Ok(clone);
        }
        if self.dump_cloned_classes.load(Ordering::Relaxed) {
            tracing::debug!(class = obj.class().name(), deep, "cloning");
        }

        if !deep && let Some(copy) = self.introspector.native_clone(&obj) {
            let copy = copy.map_err(|e| CloneError::from_instantiation(obj.class().name(), e))?;
            let copy = Value::Object(copy);
            record(&mut map, &obj, &copy);
            return Ok(copy);
        }
        if let Some(strategy) = self.strategies.lookup(obj.class()) {
            let result = strategy.clone_object(self, &obj, map.as_deref_mut(), deep)?;
            if !map.as_deref().is_some_and(|seen| seen.contains(&obj)) {
                record(&mut map, &obj, &result);
            }
            return Ok(result);
        }
        if obj.class().is_array() {
            return self.clone_array(&obj, map, deep);
        }
        self.clone_fields(&obj, map, deep)
    }

    /// Clone a child when `deep`, otherwise share it
    pub fn clone_child(
        &self,
        value: &Value,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        if deep {
            self.clone_value(value, map, deep)
        } else {
            Ok(value.clone())
        }
    }

    /// New instance of `class`: through its no-argument constructor when it
    /// has one, otherwise by bypassing construction if allowed
    pub fn new_instance(&self, class: &Class) -> CloneResult<ObjRef> {
        let created = if self.introspector.has_no_arg_constructor(class) {
            self.introspector.instantiate(class)
        } else if self.allow_bypass.load(Ordering::Relaxed) {
            self.introspector.allocate(class)
        } else {
            return Err(CloneError::construction(
                class.name(),
                "no accessible no-argument constructor and constructor bypass is disabled",
            ));
        };
        created.map_err(|e| CloneError::from_instantiation(class.name(), e))
    }

    /// Copy the instance fields of `source` into `target`.
    ///
    /// Static fields are skipped. Synthetic fields are always copied by
    /// reference. Transient fields are reset when transient nulling is on.
    pub fn copy_fields(
        &self,
        source: &ObjRef,
        target: &ObjRef,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<()> {
        let null_transient = self.null_transient.load(Ordering::Relaxed);
        let fields = self.introspector.instance_fields(source.class());
        for field in fields.iter().filter(|f| !f.is_static()) {
            let value = if null_transient && field.is_transient() {
                field.field_type().default_value()
            } else {
                let value = self
                    .introspector
                    .read_field(source, field)
                    .map_err(|e| CloneError::field_access(source, field, e))?;
                if field.is_synthetic() {
                    value
                } else {
                    self.clone_child(&value, map.as_deref_mut(), deep)?
                }
            };
            self.introspector
                .write_field(target, field, value)
                .map_err(|e| CloneError::field_access(source, field, e))?;
        }
        Ok(())
    }

    /// Field-by-field copy of a plain object
    pub fn clone_fields(
        &self,
        source: &ObjRef,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        let target = self.new_instance(source.class())?;
        let result = Value::Object(target.clone());
        record(&mut map, source, &result);
        self.copy_fields(source, &target, map, deep)?;
        Ok(result)
    }

    fn clone_array(
        &self,
        source: &ObjRef,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        let class = source.class();
        let len = self
            .introspector
            .array_len(source)
            .map_err(|e| CloneError::element_access(source, "length", e))?;
        let target = self
            .introspector
            .new_array(class, len)
            .map_err(|e| CloneError::from_instantiation(class.name(), e))?;
        let result = Value::Object(target.clone());
        record(&mut map, source, &result);

        let primitive = matches!(class.component_type(), Some(FieldType::Primitive(_)));
        for index in 0..len {
            let cell = self
                .introspector
                .array_get(source, index)
                .map_err(|e| CloneError::element_access(source, format!("[{index}]"), e))?;
            let cell = if primitive {
                cell
            } else {
                self.clone_child(&cell, map.as_deref_mut(), deep)?
            };
            self.introspector
                .array_set(&target, index, cell)
                .map_err(|e| CloneError::element_access(source, format!("[{index}]"), e))?;
        }
        Ok(result)
    }
}

impl std::fmt::Debug for Cloner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloner")
            .field("enabled", &self.is_enabled())
            .field("null_transient", &self.null_transient.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_heap::{FieldFlags, Marker};

    fn setup() -> (ClassRegistry, Cloner) {
        let classes = ClassRegistry::standard();
        let cloner = Cloner::new(&classes).unwrap();
        (classes, cloner)
    }

    #[test]
    fn test_cloner_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Cloner>();
    }

    #[test]
    fn test_primitives_and_null_are_returned_as_is() {
        let (_, cloner) = setup();
        assert_eq!(cloner.deep_clone(&Value::Null).unwrap(), Value::Null);
        assert_eq!(cloner.deep_clone(&Value::Int(7)).unwrap(), Value::Int(7));
        let s = Value::str("text");
        assert!(cloner.deep_clone(&s).unwrap().same(&s));
    }

    #[test]
    fn test_handle_clones_to_null() {
        let (_, cloner) = setup();
        assert_eq!(cloner.deep_clone(&cloner.handle()).unwrap(), Value::Null);
    }

    #[test]
    fn test_plain_object_is_copied() {
        let (classes, cloner) = setup();
        let point = classes.define(
            ClassBuilder::new("Point")
                .field("x", FieldType::int())
                .field("y", FieldType::int()),
        );
        let p = ObjRef::construct(&point).unwrap();
        p.set("x", 3).unwrap();
        p.set("y", 4).unwrap();

        let copy = cloner.deep_clone(&Value::Object(p.clone())).unwrap();
        let copy = copy.as_object().unwrap();
        assert!(!copy.ptr_eq(&p));
        assert_eq!(copy.get("x").unwrap(), Value::Int(3));
        assert_eq!(copy.get("y").unwrap(), Value::Int(4));
    }

    #[test]
    fn test_disabled_returns_input() {
        let (classes, cloner) = setup();
        let class = classes.define(ClassBuilder::new("Box"));
        let obj = Value::Object(ObjRef::construct(&class).unwrap());

        cloner.set_enabled(false);
        assert!(cloner.deep_clone(&obj).unwrap().same(&obj));
        cloner.set_enabled(true);
        assert!(!cloner.deep_clone(&obj).unwrap().same(&obj));
    }

    #[test]
    fn test_missing_constructor_without_bypass_fails() {
        let classes = ClassRegistry::standard();
        let config = ClonerConfig::default().with_allow_bypass_construction(false);
        let cloner = Cloner::from_config(&classes, &config).unwrap();
        let class = classes.define(ClassBuilder::new("Sealed").without_default_constructor());
        let obj = ObjRef::allocate(&class).unwrap();

        let err = cloner.deep_clone(&Value::Object(obj)).unwrap_err();
        assert!(matches!(err, CloneError::Construction { .. }));
    }

    #[test]
    fn test_transient_fields_reset_when_enabled() {
        let (classes, cloner) = setup();
        let class = classes.define(
            ClassBuilder::new("Session")
                .field("id", FieldType::int())
                .field_with("cache", FieldType::int(), FieldFlags::TRANSIENT),
        );
        let obj = ObjRef::construct(&class).unwrap();
        obj.set("id", 1).unwrap();
        obj.set("cache", 99).unwrap();

        let copy = cloner.deep_clone(&Value::Object(obj.clone())).unwrap();
        assert_eq!(copy.as_object().unwrap().get("cache").unwrap(), Value::Int(99));

        cloner.set_null_transient(true);
        let copy = cloner.deep_clone(&Value::Object(obj)).unwrap();
        let copy = copy.as_object().unwrap();
        assert_eq!(copy.get("id").unwrap(), Value::Int(1));
        assert_eq!(copy.get("cache").unwrap(), Value::Int(0));
    }

    #[test]
    fn test_immutable_marker_shares_instance() {
        let (classes, cloner) = setup();
        let class = classes.define(
            ClassBuilder::new("Token").marker(Marker::Immutable { subclasses: true }),
        );
        let obj = Value::Object(ObjRef::construct(&class).unwrap());
        assert!(cloner.deep_clone(&obj).unwrap().same(&obj));
    }

    #[test]
    fn test_static_field_registration() {
        let (classes, cloner) = setup();
        let item = classes.define(ClassBuilder::new("Item"));
        let shared = ObjRef::construct(&item).unwrap();
        let holder = classes.define(
            ClassBuilder::new("Defaults")
                .static_field("EMPTY", FieldType::reference("Item"), Value::Object(shared.clone())),
        );

        cloner.register_static_fields(&holder, &["EMPTY"]).unwrap();
        let copy = cloner.deep_clone(&Value::Object(shared.clone())).unwrap();
        assert!(copy.as_object().unwrap().ptr_eq(&shared));

        assert!(matches!(
            cloner.register_static_fields(&holder, &["MISSING"]),
            Err(CloneError::NoSuchStaticField { .. })
        ));
    }
}
