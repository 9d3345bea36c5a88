//! Structural introspection.
//!
//! [`Introspector`] is the narrow reflective surface the cloning engine walks
//! an object graph through: field enumeration and access, the two ways of
//! creating a bare instance, array cell access and the native one-level copy.

use crate::class::{Class, FieldDescriptor, Marker};
use crate::error::{HeapError, HeapResult};
use crate::object::ObjRef;
use crate::value::Value;
use std::sync::Arc;

/// Reflective access to classes and instances
pub trait Introspector: Send + Sync {
    /// Non-static fields along the superclass chain, in slot order
    fn instance_fields(&self, class: &Class) -> Arc<[FieldDescriptor]>;

    /// Static field declared by `class`
    fn static_field(&self, class: &Class, name: &str) -> Option<FieldDescriptor>;

    /// Current value of a static field
    fn read_static(&self, class: &Class, field: &FieldDescriptor) -> HeapResult<Value>;

    /// Markers declared by `class` itself (not inherited)
    fn declared_markers(&self, class: &Class) -> Vec<Marker>;

    /// Whether `class` has an accessible no-argument constructor
    fn has_no_arg_constructor(&self, class: &Class) -> bool;

    /// Create an instance through the no-argument constructor
    fn instantiate(&self, class: &Class) -> HeapResult<ObjRef>;

    /// Create a bare instance without running any constructor
    fn allocate(&self, class: &Class) -> HeapResult<ObjRef>;

    /// Read an instance field
    fn read_field(&self, obj: &ObjRef, field: &FieldDescriptor) -> HeapResult<Value>;

    /// Write an instance field
    fn write_field(&self, obj: &ObjRef, field: &FieldDescriptor, value: Value) -> HeapResult<()>;

    /// New array of `class` with `len` default cells
    fn new_array(&self, class: &Class, len: usize) -> HeapResult<ObjRef>;

    /// Array length
    fn array_len(&self, array: &ObjRef) -> HeapResult<usize>;

    /// Array cell
    fn array_get(&self, array: &ObjRef, index: usize) -> HeapResult<Value>;

    /// Overwrite an array cell
    fn array_set(&self, array: &ObjRef, index: usize, value: Value) -> HeapResult<()>;

    /// Native one-level copy, `None` when the class does not support one
    fn native_clone(&self, obj: &ObjRef) -> Option<HeapResult<ObjRef>>;
}

/// [`Introspector`] over the in-process heap
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapIntrospector;

impl HeapIntrospector {
    /// Create the introspector
    pub fn new() -> Self {
        Self
    }

    fn check_access(field: &FieldDescriptor) -> HeapResult<()> {
        if field.is_restricted() {
            return Err(HeapError::InaccessibleField {
                class: field.declaring_class().to_string(),
                field: field.name().to_string(),
            });
        }
        Ok(())
    }

    fn check_instance(field: &FieldDescriptor) -> HeapResult<()> {
        if field.is_static() {
            return Err(HeapError::WrongFieldKind {
                class: field.declaring_class().to_string(),
                field: field.name().to_string(),
                expected: "static",
            });
        }
        Ok(())
    }
}

impl Introspector for HeapIntrospector {
    fn instance_fields(&self, class: &Class) -> Arc<[FieldDescriptor]> {
        class.instance_fields()
    }

    fn static_field(&self, class: &Class, name: &str) -> Option<FieldDescriptor> {
        class.static_field(name).cloned()
    }

    fn read_static(&self, class: &Class, field: &FieldDescriptor) -> HeapResult<Value> {
        if !field.is_static() {
            return Err(HeapError::WrongFieldKind {
                class: field.declaring_class().to_string(),
                field: field.name().to_string(),
                expected: "not static",
            });
        }
        Self::check_access(field)?;
        class.static_value(field).ok_or_else(|| HeapError::MissingSlot {
            class: class.name().to_string(),
            field: field.name().to_string(),
        })
    }

    fn declared_markers(&self, class: &Class) -> Vec<Marker> {
        class.markers().to_vec()
    }

    fn has_no_arg_constructor(&self, class: &Class) -> bool {
        class.has_no_arg_constructor()
    }

    fn instantiate(&self, class: &Class) -> HeapResult<ObjRef> {
        ObjRef::construct(class)
    }

    fn allocate(&self, class: &Class) -> HeapResult<ObjRef> {
        ObjRef::allocate(class)
    }

    fn read_field(&self, obj: &ObjRef, field: &FieldDescriptor) -> HeapResult<Value> {
        Self::check_instance(field)?;
        Self::check_access(field)?;
        obj.slot(field)
    }

    fn write_field(&self, obj: &ObjRef, field: &FieldDescriptor, value: Value) -> HeapResult<()> {
        Self::check_instance(field)?;
        Self::check_access(field)?;
        obj.set_slot(field, value)
    }

    fn new_array(&self, class: &Class, len: usize) -> HeapResult<ObjRef> {
        ObjRef::new_array(class, len)
    }

    fn array_len(&self, array: &ObjRef) -> HeapResult<usize> {
        if !array.class().is_array() {
            return Err(HeapError::wrong_kind(array.class().name(), "an array"));
        }
        array.len()
    }

    fn array_get(&self, array: &ObjRef, index: usize) -> HeapResult<Value> {
        array.index(index)
    }

    fn array_set(&self, array: &ObjRef, index: usize, value: Value) -> HeapResult<()> {
        array.set_index(index, value)
    }

    fn native_clone(&self, obj: &ObjRef) -> Option<HeapResult<ObjRef>> {
        obj.class()
            .supports_native_clone()
            .then(|| Ok(obj.shallow_copy()))
    }
}
