//! # Mimic Heap
//!
//! A small reflective object heap: classes with superclass and interface
//! chains, marker annotations, declared fields, arrays, the standard container
//! family and a few value types.
//!
//! ## Design
//!
//! - **Identity**: objects are `Arc`-backed and compared by address
//! - **Thread-safe**: every object guards its state with a `parking_lot::RwLock`
//! - **Introspection**: [`Introspector`] is the only surface a graph walker needs

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod class;
pub mod comparator;
pub mod error;
pub mod introspect;
pub mod object;
pub mod registry;
pub mod value;

pub use class::{
    Class, ClassBuilder, ClassKind, Constructor, ContainerKind, FieldDescriptor, FieldFlags,
    FieldType, Marker, PrimitiveKind,
};
pub use comparator::Comparator;
pub use error::{HeapError, HeapResult};
pub use introspect::{HeapIntrospector, Introspector};
pub use object::{MapStore, ObjRef, ObjectData, Payload, SetStore};
pub use registry::{ClassRegistry, names};
pub use value::{EnumConstant, Value};
