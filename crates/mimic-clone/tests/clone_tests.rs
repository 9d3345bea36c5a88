//! Cloning engine tests
//!
//! Cover sharing and cycle preservation, immutability short-circuits, arrays,
//! shallow copies and error reporting.

use mimic_clone::{CloneError, Cloner, ClonerConfig, IdentityMap};
use mimic_heap::{
    Class, ClassBuilder, ClassRegistry, FieldFlags, FieldType, HeapError, Marker, ObjRef, Value,
    names,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (ClassRegistry, Cloner) {
    init_tracing();
    let classes = ClassRegistry::standard();
    let cloner = Cloner::new(&classes).unwrap();
    (classes, cloner)
}

fn node_class(classes: &ClassRegistry) -> Class {
    classes.define(
        ClassBuilder::new("Node")
            .field("value", FieldType::int())
            .field("next", FieldType::reference("Node")),
    )
}

fn node(class: &Class, value: i64, next: Option<&ObjRef>) -> ObjRef {
    let obj = ObjRef::construct(class).unwrap();
    obj.set("value", value).unwrap();
    if let Some(next) = next {
        obj.set("next", next).unwrap();
    }
    obj
}

fn object(value: &Value) -> &ObjRef {
    value.as_object().expect("expected an object")
}

fn field(obj: &ObjRef, name: &str) -> Value {
    obj.get(name).unwrap()
}

// ============================================================================
// Graph shape
// ============================================================================

#[test]
fn test_plain_object_graph() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let second = node(&class, 2, None);
    let first = node(&class, 1, Some(&second));

    let copy = cloner.deep_clone(&Value::Object(first.clone())).unwrap();
    let copy = object(&copy);
    assert!(!copy.ptr_eq(&first));
    assert_eq!(field(copy, "value"), Value::Int(1));

    let copy_next = field(copy, "next");
    let copy_next = object(&copy_next);
    assert!(!copy_next.ptr_eq(&second));
    assert_eq!(field(copy_next, "value"), Value::Int(2));
    assert_eq!(field(copy_next, "next"), Value::Null);
}

#[test]
fn test_shared_references_stay_shared() {
    let (classes, cloner) = setup();
    let leaf = classes.define(ClassBuilder::new("Leaf").field("n", FieldType::int()));
    let pair = classes.define(
        ClassBuilder::new("Pair")
            .field("left", FieldType::reference("Leaf"))
            .field("right", FieldType::reference("Leaf")),
    );
    let shared = ObjRef::construct(&leaf).unwrap();
    let root = ObjRef::construct(&pair).unwrap();
    root.set("left", &shared).unwrap();
    root.set("right", &shared).unwrap();

    let copy = cloner.deep_clone(&Value::Object(root)).unwrap();
    let left = field(object(&copy), "left");
    let right = field(object(&copy), "right");
    assert!(left.same(&right));
    assert!(!object(&left).ptr_eq(&shared));
}

#[test]
fn test_cycle_terminates_and_is_preserved() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let a = node(&class, 1, None);
    let b = node(&class, 2, Some(&a));
    a.set("next", &b).unwrap();

    let copy = cloner.deep_clone(&Value::Object(a.clone())).unwrap();
    let copy_b = field(object(&copy), "next");
    let back = field(object(&copy_b), "next");
    assert!(back.same(&copy));
    assert!(!object(&copy).ptr_eq(&a));
    assert!(!object(&copy_b).ptr_eq(&b));
}

#[test]
fn test_self_reference() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let a = node(&class, 7, None);
    a.set("next", &a).unwrap();

    let copy = cloner.deep_clone(&Value::Object(a)).unwrap();
    assert!(field(object(&copy), "next").same(&copy));
}

#[test]
fn test_deep_copy_is_independent() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let original = node(&class, 1, None);

    let copy = cloner.deep_clone(&Value::Object(original.clone())).unwrap();
    object(&copy).set("value", 42).unwrap();
    assert_eq!(field(&original, "value"), Value::Int(1));
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_boxed_integer_array() {
    let (classes, cloner) = setup();
    let integers = classes.array_of(FieldType::reference("Integer"));
    let cells = (0..5).map(Value::Int).collect();
    let array = ObjRef::array_from(&integers, cells).unwrap();

    let copy = cloner.deep_clone(&Value::Object(array.clone())).unwrap();
    let copy = object(&copy);
    assert!(!copy.ptr_eq(&array));
    assert_eq!(copy.class(), array.class());
    assert_eq!(copy.elements().unwrap(), array.elements().unwrap());
}

#[test]
fn test_array_containing_itself() {
    let (classes, cloner) = setup();
    let objects = classes.array_of(FieldType::reference(names::OBJECT));
    let array = ObjRef::new_array(&objects, 3).unwrap();
    array.set_index(0, "first").unwrap();
    array.set_index(1, &array).unwrap();

    let copy = cloner.deep_clone(&Value::Object(array.clone())).unwrap();
    let cell = object(&copy).index(1).unwrap();
    assert!(cell.same(&copy));
    assert_eq!(object(&copy).index(0).unwrap(), Value::str("first"));
    assert_eq!(object(&copy).index(2).unwrap(), Value::Null);
}

#[test]
fn test_object_array_elements_are_copied() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let nodes = class.array_of();
    let shared = node(&class, 1, None);
    let array = ObjRef::array_from(
        &nodes,
        vec![Value::Object(shared.clone()), Value::Object(shared.clone())],
    )
    .unwrap();

    let copy = cloner.deep_clone(&Value::Object(array)).unwrap();
    assert_eq!(object(&copy).class(), &nodes);
    let first = object(&copy).index(0).unwrap();
    let second = object(&copy).index(1).unwrap();
    assert!(first.same(&second));
    assert!(!object(&first).ptr_eq(&shared));
}

#[test]
fn test_primitive_array() {
    let (classes, cloner) = setup();
    let ints = classes.array_of(FieldType::int());
    let array = ObjRef::array_from(&ints, vec![Value::Int(3), Value::Int(4)]).unwrap();

    let copy = cloner.deep_clone(&Value::Object(array.clone())).unwrap();
    object(&copy).set_index(0, 9).unwrap();
    assert_eq!(array.index(0).unwrap(), Value::Int(3));
}

// ============================================================================
// Immutables
// ============================================================================

#[test]
fn test_registered_immutable_class_is_shared() {
    let (classes, cloner) = setup();
    let money = classes.define(ClassBuilder::new("Money").field("cents", FieldType::int()));
    let value = Value::Object(ObjRef::construct(&money).unwrap());

    assert!(!cloner.deep_clone(&value).unwrap().same(&value));
    cloner.register_immutable_class(&money);
    assert!(cloner.deep_clone(&value).unwrap().same(&value));
}

#[test]
fn test_immutable_instance_of_covers_subtypes() {
    let (classes, cloner) = setup();
    let value_type = classes.define(ClassBuilder::interface("ValueType"));
    let point = classes.define(ClassBuilder::new("Point").implements(&value_type));
    let value = Value::Object(ObjRef::construct(&point).unwrap());

    cloner.register_immutable_instance_of(&value_type);
    assert!(cloner.is_immutable(&point));
    assert!(cloner.deep_clone(&value).unwrap().same(&value));
}

#[test]
fn test_registered_immutable_value_is_shared() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let frozen = node(&class, 1, None);
    let other = node(&class, 2, None);
    cloner.register_immutable_value(&Value::Object(frozen.clone()));

    let holder = node(&class, 0, Some(&frozen));
    let copy = cloner.deep_clone(&Value::Object(holder)).unwrap();
    assert!(object(&field(object(&copy), "next")).ptr_eq(&frozen));

    let copy = cloner.deep_clone(&Value::Object(other.clone())).unwrap();
    assert!(!object(&copy).ptr_eq(&other));
}

#[test]
fn test_standard_value_types_are_shared() {
    let (classes, cloner) = setup();
    let uuid = ObjRef::construct(&classes.require(names::UUID).unwrap()).unwrap();
    let value = Value::Object(uuid);
    assert!(cloner.deep_clone(&value).unwrap().same(&value));
}

#[test]
fn test_immutable_marker_on_superclass() {
    let (classes, cloner) = setup();
    let base = classes.define(
        ClassBuilder::new("Amount").marker(Marker::Immutable { subclasses: false }),
    );
    let derived = classes.define(ClassBuilder::new("Euros").extends(&base));
    let value = Value::Object(ObjRef::construct(&derived).unwrap());

    assert!(cloner.deep_clone(&value).unwrap().same(&value));
}

#[test]
fn test_do_not_clone_marker_shares_instance() {
    let (classes, cloner) = setup();
    let service = classes.define(ClassBuilder::new("Service").marker(Marker::DoNotClone));
    let holder = classes.define(
        ClassBuilder::new("Holder").field("service", FieldType::reference("Service")),
    );
    let svc = ObjRef::construct(&service).unwrap();
    let root = ObjRef::construct(&holder).unwrap();
    root.set("service", &svc).unwrap();

    let copy = cloner.deep_clone(&Value::Object(root)).unwrap();
    assert!(object(&field(object(&copy), "service")).ptr_eq(&svc));
}

#[test]
fn test_enum_constants_are_shared() {
    let (classes, cloner) = setup();
    let color = classes.define(ClassBuilder::enumeration("Color", &["Red", "Blue"]));
    let blue = color.enum_constant("Blue").unwrap();
    assert_eq!(cloner.deep_clone(&blue).unwrap(), blue);
}

#[test]
fn test_null_instead_of_clone() {
    let (classes, cloner) = setup();
    let connection = classes.define(ClassBuilder::new("Connection"));
    let holder = classes.define(
        ClassBuilder::new("Repo").field("conn", FieldType::reference("Connection")),
    );
    let root = ObjRef::construct(&holder).unwrap();
    root.set("conn", &ObjRef::construct(&connection).unwrap()).unwrap();

    cloner.null_instead_of_clone(&connection);
    let copy = cloner.deep_clone(&Value::Object(root)).unwrap();
    assert_eq!(field(object(&copy), "conn"), Value::Null);
}

#[test]
fn test_registered_value_wins_over_null_instead_of_clone() {
    let (classes, cloner) = setup();
    let connection = classes.define(ClassBuilder::new("Connection"));
    let pool = classes.define(
        ClassBuilder::new("Pool")
            .field("shared", FieldType::reference("Connection"))
            .field("own", FieldType::reference("Connection")),
    );
    let shared = ObjRef::construct(&connection).unwrap();
    let root = ObjRef::construct(&pool).unwrap();
    root.set("shared", &shared).unwrap();
    root.set("own", &ObjRef::construct(&connection).unwrap()).unwrap();

    cloner.null_instead_of_clone(&connection);
    cloner.register_immutable_value(&Value::Object(shared.clone()));
    let copy = cloner.deep_clone(&Value::Object(root)).unwrap();
    assert!(object(&field(object(&copy), "shared")).ptr_eq(&shared));
    assert_eq!(field(object(&copy), "own"), Value::Null);
}

#[test]
fn test_cloner_handle_in_graph_becomes_null() {
    let (classes, cloner) = setup();
    let holder = classes.define(
        ClassBuilder::new("Owner").field("cloner", FieldType::reference(names::CLONER)),
    );
    let root = ObjRef::construct(&holder).unwrap();
    root.set("cloner", cloner.handle()).unwrap();

    let copy = cloner.deep_clone(&Value::Object(root)).unwrap();
    assert_eq!(field(object(&copy), "cloner"), Value::Null);
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_excluded_instance_is_shared() {
    let (classes, cloner) = setup();
    let cache = classes.define(ClassBuilder::new("Cache"));
    let owner = classes.define(
        ClassBuilder::new("Owner").field("cache", FieldType::reference("Cache")),
    );
    let c = ObjRef::construct(&cache).unwrap();
    let first = ObjRef::construct(&owner).unwrap();
    let second = ObjRef::construct(&owner).unwrap();
    first.set("cache", &c).unwrap();
    second.set("cache", &c).unwrap();

    for root in [first, second] {
        let copy = cloner
            .deep_clone_excluding(&Value::Object(root.clone()), std::slice::from_ref(&c))
            .unwrap();
        assert!(!object(&copy).ptr_eq(&root));
        assert!(object(&field(object(&copy), "cache")).ptr_eq(&c));
    }
    assert!(!cloner.is_immutable(&cache));
}

#[test]
fn test_shared_identity_map_across_calls() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let shared = node(&class, 0, None);
    let a = node(&class, 1, Some(&shared));
    let b = node(&class, 2, Some(&shared));

    let mut map = IdentityMap::new();
    let copy_a = cloner.deep_clone_with(&Value::Object(a), &mut map).unwrap();
    let copy_b = cloner.deep_clone_with(&Value::Object(b), &mut map).unwrap();
    assert!(field(object(&copy_a), "next").same(&field(object(&copy_b), "next")));
    assert_eq!(map.len(), 3);
}

#[test]
fn test_clone_value_without_map_copies_tree() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let root = node(&class, 1, Some(&node(&class, 2, None)));

    let copy = cloner
        .clone_value(&Value::Object(root.clone()), None, true)
        .unwrap();
    assert!(!object(&copy).ptr_eq(&root));
    assert_eq!(
        field(object(&field(object(&copy), "next")), "value"),
        Value::Int(2)
    );
}

// ============================================================================
// Shallow copies
// ============================================================================

#[test]
fn test_shallow_clone_shares_children() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let child = node(&class, 2, None);
    let root = node(&class, 1, Some(&child));

    let copy = cloner.shallow_clone(&Value::Object(root.clone())).unwrap();
    assert!(!object(&copy).ptr_eq(&root));
    assert!(object(&field(object(&copy), "next")).ptr_eq(&child));
}

#[test]
fn test_native_clone_used_only_for_shallow_copies() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    let buffer = classes.define(
        ClassBuilder::new("Buffer")
            .field("head", FieldType::reference("Node"))
            .constructor(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .native_clone(),
    );
    let head = node(&class, 1, None);
    let source = ObjRef::construct(&buffer).unwrap();
    source.set("head", &head).unwrap();
    assert_eq!(constructed.load(Ordering::SeqCst), 1);

    let shallow = cloner.shallow_clone(&Value::Object(source.clone())).unwrap();
    assert!(!object(&shallow).ptr_eq(&source));
    assert!(object(&field(object(&shallow), "head")).ptr_eq(&head));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);

    let deep = cloner.deep_clone(&Value::Object(source.clone())).unwrap();
    let copied_head = field(object(&deep), "head");
    assert!(!object(&copied_head).ptr_eq(&head));
    assert_eq!(field(object(&copied_head), "value"), Value::Int(1));
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_shallow_clone_into_existing_target() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let child = node(&class, 2, None);
    let source = node(&class, 1, Some(&child));
    let tagged = classes.define(
        ClassBuilder::new("TaggedNode")
            .extends(&class)
            .field("tag", FieldType::reference("String")),
    );
    let target = ObjRef::construct(&tagged).unwrap();
    target.set("tag", "kept").unwrap();

    cloner.shallow_clone_into(&source, &target).unwrap();
    assert_eq!(field(&target, "value"), Value::Int(1));
    assert!(object(&field(&target, "next")).ptr_eq(&child));
    assert_eq!(field(&target, "tag"), Value::str("kept"));

    let unrelated = ObjRef::construct(&classes.define(ClassBuilder::new("Other"))).unwrap();
    assert!(matches!(
        cloner.shallow_clone_into(&source, &unrelated),
        Err(CloneError::IncompatibleTarget { .. })
    ));
}

// ============================================================================
// Field flags
// ============================================================================

#[test]
fn test_synthetic_fields_are_copied_by_reference() {
    let (classes, cloner) = setup();
    let outer = classes.define(ClassBuilder::new("Outer"));
    let inner = classes.define(
        ClassBuilder::new("Inner")
            .field_with("this_outer", FieldType::reference("Outer"), FieldFlags::SYNTHETIC),
    );
    let o = ObjRef::construct(&outer).unwrap();
    let i = ObjRef::construct(&inner).unwrap();
    i.set("this_outer", &o).unwrap();

    let copy = cloner.deep_clone(&Value::Object(i)).unwrap();
    assert!(object(&field(object(&copy), "this_outer")).ptr_eq(&o));
}

#[test]
fn test_transient_reference_nulled_by_config() {
    init_tracing();
    let classes = ClassRegistry::standard();
    let config = ClonerConfig::default().with_null_transient(true);
    let cloner = Cloner::from_config(&classes, &config).unwrap();
    let class = classes.define(
        ClassBuilder::new("Cached")
            .field_with("memo", FieldType::reference("Node"), FieldFlags::TRANSIENT),
    );
    let root = ObjRef::construct(&class).unwrap();
    root.set("memo", &ObjRef::construct(&class).unwrap()).unwrap();

    let copy = cloner.deep_clone(&Value::Object(root)).unwrap();
    assert_eq!(field(object(&copy), "memo"), Value::Null);
}

#[test]
fn test_static_fields_are_not_touched() {
    let (classes, cloner) = setup();
    let class = classes.define(
        ClassBuilder::new("Counter")
            .field("n", FieldType::int())
            .static_field("TOTAL", FieldType::int(), Value::Int(5)),
    );
    let obj = ObjRef::construct(&class).unwrap();
    let copy = cloner.deep_clone(&Value::Object(obj)).unwrap();

    let total = class.static_field("TOTAL").unwrap();
    assert_eq!(class.static_value(total), Some(Value::Int(5)));
    assert_eq!(object(&copy).class().instance_fields().len(), 1);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_restricted_field_reports_field_access() {
    let (classes, cloner) = setup();
    let class = classes.define(
        ClassBuilder::new("Vault").field_with("key", FieldType::int(), FieldFlags::RESTRICTED),
    );
    let obj = ObjRef::construct(&class).unwrap();

    let err = cloner.deep_clone(&Value::Object(obj)).unwrap_err();
    match err {
        CloneError::FieldAccess { object, field, source } => {
            assert!(object.starts_with("Vault@"));
            assert_eq!(field, "key");
            assert!(matches!(source, HeapError::InaccessibleField { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_construction_failure_without_bypass() {
    init_tracing();
    let classes = ClassRegistry::standard();
    let config = ClonerConfig::default().with_allow_bypass_construction(false);
    let cloner = Cloner::from_config(&classes, &config).unwrap();
    let class = classes.define(ClassBuilder::new("Handle").without_default_constructor());
    let obj = ObjRef::allocate(&class).unwrap();

    let err = cloner.deep_clone(&Value::Object(obj)).unwrap_err();
    assert!(matches!(err, CloneError::Construction { ref class, .. } if class == "Handle"));
}

#[test]
fn test_bypass_construction_skips_constructor() {
    let (classes, cloner) = setup();
    let class = classes.define(
        ClassBuilder::new("Handle")
            .field("fd", FieldType::int())
            .without_default_constructor(),
    );
    let obj = ObjRef::allocate(&class).unwrap();
    obj.set("fd", 3).unwrap();

    let copy = cloner.deep_clone(&Value::Object(obj)).unwrap();
    assert_eq!(field(object(&copy), "fd"), Value::Int(3));
}

#[test]
fn test_unknown_class_in_config() {
    let classes = ClassRegistry::standard();
    let config = ClonerConfig::default().immutable_class("NoSuchClass");
    assert!(matches!(
        Cloner::from_config(&classes, &config),
        Err(CloneError::UnknownClass(name)) if name == "NoSuchClass"
    ));
}

#[test]
fn test_config_from_toml() {
    let classes = ClassRegistry::standard();
    let money = classes.define(ClassBuilder::new("Money"));
    let config = ClonerConfig::from_toml_str(r#"immutable_classes = ["Money"]"#).unwrap();
    let cloner = Cloner::from_config(&classes, &config).unwrap();

    let value = Value::Object(ObjRef::construct(&money).unwrap());
    assert!(cloner.deep_clone(&value).unwrap().same(&value));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_clones_and_registrations() {
    let (classes, cloner) = setup();
    let class = node_class(&classes);
    let tail = node(&class, 2, None);
    let root = node(&class, 1, Some(&tail));
    let root = Value::Object(root);

    std::thread::scope(|scope| {
        for i in 0..4 {
            let cloner = &cloner;
            let classes = &classes;
            let root = &root;
            scope.spawn(move || {
                let marker = classes.define(ClassBuilder::new(format!("Frozen{i}")));
                cloner.register_immutable_class(&marker);
                for _ in 0..50 {
                    let copy = cloner.deep_clone(root).unwrap();
                    assert!(!copy.same(root));
                    assert_eq!(field(object(&copy), "value"), Value::Int(1));
                }
            });
        }
    });
}
