//! Class descriptors.
//!
//! A [`Class`] describes the layout and behaviour of heap objects: declared
//! fields with their storage slots, the superclass/interface chain used for
//! is-a checks, marker annotations, and how bare instances are created.
//! Classes are immutable once built and compared by identity.

use crate::error::HeapResult;
use crate::object::ObjRef;
use crate::value::{EnumConstant, Value};
use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

bitflags! {
    /// Modifiers of a declared field
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u8 {
        /// Class-level storage, never part of an instance
        const STATIC = 1;
        /// Generated by the toolchain (outer-instance links and similar)
        const SYNTHETIC = 1 << 1;
        /// Excluded from persistent state
        const TRANSIENT = 1 << 2;
        /// Reflective access is denied
        const RESTRICTED = 1 << 3;
    }
}

/// Primitive slot types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `bool`
    Bool,
    /// 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// Unicode scalar
    Char,
}

impl PrimitiveKind {
    /// Zero value stored in freshly allocated slots
    pub fn default_value(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Int => Value::Int(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Char => Value::Char('\0'),
        }
    }

    /// Source-level name
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Char => "char",
        }
    }

    /// Whether `value` may be stored in a slot of this kind
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PrimitiveKind::Bool, Value::Bool(_))
                | (PrimitiveKind::Int, Value::Int(_))
                | (PrimitiveKind::Float, Value::Float(_))
                | (PrimitiveKind::Char, Value::Char(_))
        )
    }
}

/// Declared type of a field or array component.
///
/// Reference types are named rather than linked so that self-referential
/// classes (`Node { next: Node }`) never form `Arc` cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Primitive slot, never null
    Primitive(PrimitiveKind),
    /// Reference to instances of the named type
    Reference(Arc<str>),
}

impl FieldType {
    /// Reference type by name
    pub fn reference(name: impl Into<Arc<str>>) -> Self {
        FieldType::Reference(name.into())
    }

    /// `int`
    pub fn int() -> Self {
        FieldType::Primitive(PrimitiveKind::Int)
    }

    /// `bool`
    pub fn bool() -> Self {
        FieldType::Primitive(PrimitiveKind::Bool)
    }

    /// `float`
    pub fn float() -> Self {
        FieldType::Primitive(PrimitiveKind::Float)
    }

    /// `char`
    pub fn char() -> Self {
        FieldType::Primitive(PrimitiveKind::Char)
    }

    /// Value held by a freshly allocated slot
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::Primitive(kind) => kind.default_value(),
            FieldType::Reference(_) => Value::Null,
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        match self {
            FieldType::Primitive(kind) => kind.name(),
            FieldType::Reference(name) => name,
        }
    }

    /// Whether `value` may be stored in a slot of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Primitive(kind) => kind.accepts(value),
            FieldType::Reference(_) => true,
        }
    }
}

/// A declared field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: Arc<str>,
    declaring_class: Arc<str>,
    field_type: FieldType,
    flags: FieldFlags,
    /// Instance slot for instance fields, index into the class statics otherwise
    slot: usize,
}

impl FieldDescriptor {
    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the class that declares the field
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    /// Declared type
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Modifiers
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Storage slot
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// `static` modifier
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }

    /// Toolchain-generated field
    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(FieldFlags::SYNTHETIC)
    }

    /// `transient` modifier
    pub fn is_transient(&self) -> bool {
        self.flags.contains(FieldFlags::TRANSIENT)
    }

    /// Reflective access denied
    pub fn is_restricted(&self) -> bool {
        self.flags.contains(FieldFlags::RESTRICTED)
    }
}

/// Marker annotations a class may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Instances never change after construction.
    ///
    /// `subclasses` records whether the declaration was meant to cover
    /// subclasses as well. Lookups currently ignore it.
    Immutable {
        /// Declared reach of the annotation
        subclasses: bool,
    },
    /// Instances must be shared, never copied
    DoNotClone,
}

/// Built-in container families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Array-backed list
    ArrayList,
    /// Linked list
    LinkedList,
    /// Copy-on-write list
    CopyOnWriteList,
    /// Hash set
    HashSet,
    /// Insertion-ordered hash set
    LinkedHashSet,
    /// Comparator-ordered set
    TreeSet,
    /// Copy-on-write, insertion-ordered set
    CopyOnWriteSet,
    /// Hash map
    HashMap,
    /// Insertion-ordered hash map
    LinkedHashMap,
    /// Comparator-ordered map
    TreeMap,
    /// Concurrent hash map
    ConcurrentMap,
}

impl ContainerKind {
    /// List family
    pub fn is_list(self) -> bool {
        matches!(
            self,
            ContainerKind::ArrayList | ContainerKind::LinkedList | ContainerKind::CopyOnWriteList
        )
    }

    /// Set family
    pub fn is_set(self) -> bool {
        matches!(
            self,
            ContainerKind::HashSet
                | ContainerKind::LinkedHashSet
                | ContainerKind::TreeSet
                | ContainerKind::CopyOnWriteSet
        )
    }

    /// Map family
    pub fn is_map(self) -> bool {
        matches!(
            self,
            ContainerKind::HashMap
                | ContainerKind::LinkedHashMap
                | ContainerKind::TreeMap
                | ContainerKind::ConcurrentMap
        )
    }

    /// Comparator-ordered
    pub fn is_sorted(self) -> bool {
        matches!(self, ContainerKind::TreeSet | ContainerKind::TreeMap)
    }
}

/// What kind of storage instances of a class carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassKind {
    /// Declared fields only
    Plain,
    /// Interface, never instantiated
    Interface,
    /// Enumeration with a fixed set of constants
    Enum(Vec<Arc<str>>),
    /// Fixed-length array
    Array(FieldType),
    /// Built-in container
    Container(ContainerKind),
    /// Point in time (epoch milliseconds)
    Date,
    /// Zoned calendar
    Calendar,
    /// Growable text buffer
    Text,
}

/// How the no-argument constructor initialises a bare instance
pub type Initializer = Arc<dyn Fn(&ObjRef) -> HeapResult<()> + Send + Sync>;

/// No-argument constructor availability
#[derive(Clone)]
pub enum Constructor {
    /// Accessible constructor that keeps default slot values
    Default,
    /// Accessible constructor running an initializer
    Custom(Initializer),
    /// No accessible no-argument constructor
    Unavailable,
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Default => write!(f, "Default"),
            Constructor::Custom(_) => write!(f, "Custom(..)"),
            Constructor::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// Class metadata. Access it through [`Class`].
pub struct ClassInfo {
    name: Arc<str>,
    kind: ClassKind,
    superclass: Option<Class>,
    interfaces: Vec<Class>,
    declared_fields: Vec<FieldDescriptor>,
    instance_fields: Arc<[FieldDescriptor]>,
    statics: RwLock<Vec<Value>>,
    markers: Vec<Marker>,
    constructor: Constructor,
    native_clone: bool,
    is_abstract: bool,
    universal: bool,
    /// Cached array-of-this class. Weak so the component never owns its array
    /// class and no cycle forms.
    array_class: Mutex<Weak<ClassInfo>>,
}

/// Shared handle to a class, compared by identity
#[derive(Clone)]
pub struct Class(Arc<ClassInfo>);

impl Class {
    /// Class name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Shared class name
    pub fn name_arc(&self) -> Arc<str> {
        self.0.name.clone()
    }

    /// Storage kind
    pub fn kind(&self) -> &ClassKind {
        &self.0.kind
    }

    /// Direct superclass
    pub fn superclass(&self) -> Option<&Class> {
        self.0.superclass.as_ref()
    }

    /// Directly implemented interfaces
    pub fn interfaces(&self) -> &[Class] {
        &self.0.interfaces
    }

    /// Fields declared by this class only (instance and static)
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.0.declared_fields
    }

    /// Non-static fields along the whole superclass chain, slot ordered
    pub fn instance_fields(&self) -> Arc<[FieldDescriptor]> {
        self.0.instance_fields.clone()
    }

    /// Static field declared by this class
    pub fn static_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0
            .declared_fields
            .iter()
            .find(|f| f.is_static() && f.name() == name)
    }

    /// Instance field by name, searching the chain from the most derived class
    pub fn instance_field(&self, name: &str) -> Option<FieldDescriptor> {
        self.0
            .instance_fields
            .iter()
            .rev()
            .find(|f| f.name() == name)
            .cloned()
    }

    /// Current value of a static field
    pub fn static_value(&self, field: &FieldDescriptor) -> Option<Value> {
        self.0.statics.read().get(field.slot()).cloned()
    }

    /// Overwrite a static field
    pub fn set_static_value(&self, field: &FieldDescriptor, value: Value) -> bool {
        let mut statics = self.0.statics.write();
        match statics.get_mut(field.slot()) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Declared markers (this class only)
    pub fn markers(&self) -> &[Marker] {
        &self.0.markers
    }

    /// No-argument constructor availability
    pub fn constructor(&self) -> &Constructor {
        &self.0.constructor
    }

    /// Whether an accessible no-argument constructor exists
    pub fn has_no_arg_constructor(&self) -> bool {
        !matches!(self.0.constructor, Constructor::Unavailable)
    }

    /// Whether instances support a native one-level copy
    pub fn supports_native_clone(&self) -> bool {
        self.0.native_clone
    }

    /// Interfaces and abstract classes cannot be instantiated
    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract
    }

    /// The universal root class every other class ultimately extends
    pub fn is_universal_base(&self) -> bool {
        self.0.universal
    }

    /// Array class
    pub fn is_array(&self) -> bool {
        matches!(self.0.kind, ClassKind::Array(_))
    }

    /// Enum class
    pub fn is_enum(&self) -> bool {
        matches!(self.0.kind, ClassKind::Enum(_))
    }

    /// Component type of an array class
    pub fn component_type(&self) -> Option<&FieldType> {
        match &self.0.kind {
            ClassKind::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Container family, if any
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self.0.kind {
            ClassKind::Container(kind) => Some(kind),
            _ => None,
        }
    }

    /// Enum constant by name
    pub fn enum_constant(&self, name: &str) -> Option<Value> {
        let ClassKind::Enum(constants) = &self.0.kind else {
            return None;
        };
        constants
            .iter()
            .position(|c| &**c == name)
            .map(|ordinal| {
                Value::Enum(EnumConstant::new(
                    self.name_arc(),
                    ordinal as u32,
                    constants[ordinal].clone(),
                ))
            })
    }

    /// Superclass chain starting at the direct superclass
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.superclass(),
        }
    }

    /// Whether instances of `other` are instances of `self`
    pub fn is_assignable_from(&self, other: &Class) -> bool {
        if self == other {
            return true;
        }
        if let Some(parent) = other.superclass()
            && self.is_assignable_from(parent)
        {
            return true;
        }
        other.interfaces().iter().any(|i| self.is_assignable_from(i))
    }

    /// Array class whose components are instances of this class.
    ///
    /// Repeated calls return the same class while any array of it is alive.
    pub fn array_of(&self) -> Class {
        let mut cached = self.0.array_class.lock();
        if let Some(class) = cached.upgrade() {
            return Class(class);
        }
        let class = ClassBuilder::array(FieldType::Reference(self.name_arc())).build();
        *cached = Arc::downgrade(&class.0);
        class
    }

    /// Raw pointer used for identity
    pub fn as_ptr(&self) -> *const ClassInfo {
        Arc::as_ptr(&self.0)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.name())
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Iterator over a superclass chain
pub struct Ancestors<'a> {
    next: Option<&'a Class>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Class;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.superclass();
        Some(current)
    }
}

struct PendingField {
    name: Arc<str>,
    field_type: FieldType,
    flags: FieldFlags,
    initial: Value,
}

/// Builder for [`Class`]
pub struct ClassBuilder {
    name: Arc<str>,
    kind: ClassKind,
    superclass: Option<Class>,
    interfaces: Vec<Class>,
    fields: Vec<PendingField>,
    markers: Vec<Marker>,
    constructor: Constructor,
    native_clone: bool,
    is_abstract: bool,
    universal: bool,
}

impl ClassBuilder {
    /// Plain class with an accessible default constructor
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Plain,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            markers: Vec::new(),
            constructor: Constructor::Default,
            native_clone: false,
            is_abstract: false,
            universal: false,
        }
    }

    /// Interface
    pub fn interface(name: impl Into<Arc<str>>) -> Self {
        let mut builder = Self::new(name);
        builder.kind = ClassKind::Interface;
        builder.constructor = Constructor::Unavailable;
        builder.is_abstract = true;
        builder
    }

    /// Enumeration with the given constants
    pub fn enumeration(name: impl Into<Arc<str>>, constants: &[&str]) -> Self {
        let mut builder = Self::new(name);
        builder.kind = ClassKind::Enum(constants.iter().map(|c| Arc::from(*c)).collect());
        builder.constructor = Constructor::Unavailable;
        builder
    }

    /// Array class with the given component type
    pub fn array(component: FieldType) -> Self {
        let mut builder = Self::new(format!("{}[]", component.name()));
        builder.kind = ClassKind::Array(component);
        builder.native_clone = true;
        builder
    }

    /// Storage kind
    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    /// Direct superclass
    pub fn extends(mut self, superclass: &Class) -> Self {
        self.superclass = Some(superclass.clone());
        self
    }

    /// Implemented interface
    pub fn implements(mut self, interface: &Class) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Instance field without modifiers
    pub fn field(self, name: impl Into<Arc<str>>, field_type: FieldType) -> Self {
        self.field_with(name, field_type, FieldFlags::empty())
    }

    /// Instance field with modifiers
    pub fn field_with(
        mut self,
        name: impl Into<Arc<str>>,
        field_type: FieldType,
        flags: FieldFlags,
    ) -> Self {
        let initial = field_type.default_value();
        self.fields.push(PendingField {
            name: name.into(),
            field_type,
            flags: flags - FieldFlags::STATIC,
            initial,
        });
        self
    }

    /// Static field with its initial value
    pub fn static_field(
        mut self,
        name: impl Into<Arc<str>>,
        field_type: FieldType,
        initial: Value,
    ) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            field_type,
            flags: FieldFlags::STATIC,
            initial,
        });
        self
    }

    /// Declare a marker annotation
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// No-argument constructor running `init` on the bare instance
    pub fn constructor<F>(mut self, init: F) -> Self
    where
        F: Fn(&ObjRef) -> HeapResult<()> + Send + Sync + 'static,
    {
        self.constructor = Constructor::Custom(Arc::new(init));
        self
    }

    /// Remove the accessible no-argument constructor
    pub fn without_default_constructor(mut self) -> Self {
        self.constructor = Constructor::Unavailable;
        self
    }

    /// Instances support a native one-level copy
    pub fn native_clone(mut self) -> Self {
        self.native_clone = true;
        self
    }

    /// Abstract class
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark as the universal root class
    pub fn universal_base(mut self) -> Self {
        self.universal = true;
        self
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the class still needs the universal base as its superclass
    pub(crate) fn is_rootless(&self) -> bool {
        self.superclass.is_none() && !self.universal && self.kind != ClassKind::Interface
    }

    /// Finish the class
    pub fn build(self) -> Class {
        let mut kind = self.kind;
        if kind == ClassKind::Plain
            && let Some(parent) = &self.superclass
            && !matches!(parent.kind(), ClassKind::Plain | ClassKind::Interface)
        {
            kind = parent.kind().clone();
        }
        let native_clone = self.native_clone
            || self
                .superclass
                .as_ref()
                .is_some_and(|parent| parent.supports_native_clone());

        let mut instance_fields: Vec<FieldDescriptor> = self
            .superclass
            .as_ref()
            .map(|parent| parent.instance_fields().to_vec())
            .unwrap_or_default();
        let mut declared_fields = Vec::with_capacity(self.fields.len());
        let mut statics = Vec::new();

        for pending in self.fields {
            let is_static = pending.flags.contains(FieldFlags::STATIC);
            let slot = if is_static {
                statics.push(pending.initial);
                statics.len() - 1
            } else {
                instance_fields.len()
            };
            let descriptor = FieldDescriptor {
                name: pending.name,
                declaring_class: self.name.clone(),
                field_type: pending.field_type,
                flags: pending.flags,
                slot,
            };
            if !is_static {
                instance_fields.push(descriptor.clone());
            }
            declared_fields.push(descriptor);
        }

        Class(Arc::new(ClassInfo {
            name: self.name,
            kind,
            superclass: self.superclass,
            interfaces: self.interfaces,
            declared_fields,
            instance_fields: instance_fields.into(),
            statics: RwLock::new(statics),
            markers: self.markers,
            constructor: self.constructor,
            native_clone,
            is_abstract: self.is_abstract,
            universal: self.universal,
            array_class: Mutex::new(Weak::new()),
        }))
    }
}
