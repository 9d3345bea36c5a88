//! Heap objects.
//!
//! Every object carries its [`Class`], one slot per instance field along the
//! class chain, and an optional payload determined by the class kind (array
//! cells, container storage, a timestamp or a text buffer).

use crate::class::{Class, ClassKind, Constructor, ContainerKind, FieldDescriptor};
use crate::comparator::{Comparator, compare_with};
use crate::error::{HeapError, HeapResult};
use crate::value::Value;
use chrono::{DateTime, FixedOffset, Utc};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::sync::Arc;

/// Set storage
#[derive(Clone)]
pub enum SetStore {
    /// Hash set; iteration follows insertion order
    Hashed(IndexSet<Value, FxBuildHasher>),
    /// Sorted by comparator (natural ordering when `None`)
    Sorted {
        /// Elements in comparator order
        items: Vec<Value>,
        /// Ordering
        comparator: Option<Comparator>,
    },
}

impl SetStore {
    /// Insert, returning `false` if an equal element was already present
    pub fn insert(&mut self, value: Value) -> bool {
        match self {
            SetStore::Hashed(set) => set.insert(value),
            SetStore::Sorted { items, comparator } => {
                match items
                    .binary_search_by(|probe| compare_with(comparator.as_ref(), probe, &value))
                {
                    Ok(_) => false,
                    Err(pos) => {
                        items.insert(pos, value);
                        true
                    }
                }
            }
        }
    }

    /// Insert `values`, taken in the iteration order of another set.
    ///
    /// An empty sorted set adopts that order as is, so a copy iterates like
    /// its source even when the ordering depends on object identity.
    pub fn extend_ordered(&mut self, values: Vec<Value>) {
        match self {
            SetStore::Sorted { items, .. } if items.is_empty() => *items = values,
            _ => {
                for value in values {
                    self.insert(value);
                }
            }
        }
    }

    /// Membership test
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            SetStore::Hashed(set) => set.contains(value),
            SetStore::Sorted { items, comparator } => items
                .binary_search_by(|probe| compare_with(comparator.as_ref(), probe, value))
                .is_ok(),
        }
    }

    /// Element count
    pub fn len(&self) -> usize {
        match self {
            SetStore::Hashed(set) => set.len(),
            SetStore::Sorted { items, .. } => items.len(),
        }
    }

    /// Empty check
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in iteration order
    pub fn to_vec(&self) -> Vec<Value> {
        match self {
            SetStore::Hashed(set) => set.iter().cloned().collect(),
            SetStore::Sorted { items, .. } => items.clone(),
        }
    }
}

/// Map storage
#[derive(Clone)]
pub enum MapStore {
    /// Hash map; iteration follows insertion order
    Hashed(IndexMap<Value, Value, FxBuildHasher>),
    /// Sorted by key comparator (natural ordering when `None`)
    Sorted {
        /// Entries in key order
        entries: Vec<(Value, Value)>,
        /// Key ordering
        comparator: Option<Comparator>,
    },
}

impl MapStore {
    /// Insert or replace, returning the previous value
    pub fn put(&mut self, key: Value, value: Value) -> Option<Value> {
        match self {
            MapStore::Hashed(map) => map.insert(key, value),
            MapStore::Sorted {
                entries,
                comparator,
            } => {
                match entries
                    .binary_search_by(|(probe, _)| compare_with(comparator.as_ref(), probe, &key))
                {
                    Ok(pos) => Some(std::mem::replace(&mut entries[pos].1, value)),
                    Err(pos) => {
                        entries.insert(pos, (key, value));
                        None
                    }
                }
            }
        }
    }

    /// Insert `entries`, taken in the iteration order of another map.
    ///
    /// An empty sorted map adopts that order as is.
    pub fn extend_ordered(&mut self, entries: Vec<(Value, Value)>) {
        match self {
            MapStore::Sorted { entries: own, .. } if own.is_empty() => *own = entries,
            _ => {
                for (key, value) in entries {
                    self.put(key, value);
                }
            }
        }
    }

    /// Lookup
    pub fn get(&self, key: &Value) -> Option<Value> {
        match self {
            MapStore::Hashed(map) => map.get(key).cloned(),
            MapStore::Sorted {
                entries,
                comparator,
            } => entries
                .binary_search_by(|(probe, _)| compare_with(comparator.as_ref(), probe, key))
                .ok()
                .map(|pos| entries[pos].1.clone()),
        }
    }

    /// Entry count
    pub fn len(&self) -> usize {
        match self {
            MapStore::Hashed(map) => map.len(),
            MapStore::Sorted { entries, .. } => entries.len(),
        }
    }

    /// Empty check
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in iteration order
    pub fn to_vec(&self) -> Vec<(Value, Value)> {
        match self {
            MapStore::Hashed(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            MapStore::Sorted { entries, .. } => entries.clone(),
        }
    }
}

/// Kind-specific storage
#[derive(Clone)]
pub enum Payload {
    /// Declared fields only
    None,
    /// Array cells
    Array(Vec<Value>),
    /// List elements
    List(Vec<Value>),
    /// Set elements
    Set(SetStore),
    /// Map entries
    Map(MapStore),
    /// Epoch milliseconds
    Date(i64),
    /// Zoned timestamp
    Calendar(DateTime<FixedOffset>),
    /// Text buffer
    Text(String),
}

impl Payload {
    fn empty_for(kind: &ClassKind) -> Payload {
        match kind {
            ClassKind::Array(_) => Payload::Array(Vec::new()),
            ClassKind::Container(kind) if kind.is_list() => Payload::List(Vec::new()),
            ClassKind::Container(kind) if kind.is_set() => Payload::Set(if kind.is_sorted() {
                SetStore::Sorted {
                    items: Vec::new(),
                    comparator: None,
                }
            } else {
                SetStore::Hashed(IndexSet::default())
            }),
            ClassKind::Container(kind) => Payload::Map(if *kind == ContainerKind::TreeMap {
                MapStore::Sorted {
                    entries: Vec::new(),
                    comparator: None,
                }
            } else {
                MapStore::Hashed(IndexMap::default())
            }),
            ClassKind::Date => Payload::Date(0),
            ClassKind::Calendar => Payload::Calendar(DateTime::<Utc>::default().fixed_offset()),
            ClassKind::Text => Payload::Text(String::new()),
            ClassKind::Plain | ClassKind::Interface | ClassKind::Enum(_) => Payload::None,
        }
    }
}

/// Object state guarded by the object's lock
#[derive(Clone)]
pub struct ObjectData {
    /// One slot per instance field, in class-chain order
    pub fields: Vec<Value>,
    /// Kind-specific storage
    pub payload: Payload,
}

/// A heap object
pub struct HeapObject {
    class: Class,
    data: RwLock<ObjectData>,
}

/// Shared reference to a heap object, compared by identity
#[derive(Clone)]
pub struct ObjRef(Arc<HeapObject>);

impl ObjRef {
    fn from_data(class: &Class, data: ObjectData) -> ObjRef {
        ObjRef(Arc::new(HeapObject {
            class: class.clone(),
            data: RwLock::new(data),
        }))
    }

    /// Allocate a bare instance without running any constructor.
    ///
    /// Every field holds its type's default value.
    pub fn allocate(class: &Class) -> HeapResult<ObjRef> {
        if class.is_abstract() {
            return Err(HeapError::construction(class.name(), "class is abstract"));
        }
        if class.is_enum() {
            return Err(HeapError::construction(
                class.name(),
                "enum constants cannot be allocated",
            ));
        }
        let fields = class
            .instance_fields()
            .iter()
            .map(|f| f.field_type().default_value())
            .collect();
        Ok(Self::from_data(
            class,
            ObjectData {
                fields,
                payload: Payload::empty_for(class.kind()),
            },
        ))
    }

    /// Create an instance through the accessible no-argument constructor
    pub fn construct(class: &Class) -> HeapResult<ObjRef> {
        match class.constructor() {
            Constructor::Unavailable => Err(HeapError::construction(
                class.name(),
                "no accessible no-argument constructor",
            )),
            Constructor::Default => Self::allocate(class),
            Constructor::Custom(init) => {
                let obj = Self::allocate(class)?;
                init(&obj)?;
                Ok(obj)
            }
        }
    }

    /// Array of `len` default cells
    pub fn new_array(class: &Class, len: usize) -> HeapResult<ObjRef> {
        let Some(component) = class.component_type() else {
            return Err(HeapError::wrong_kind(class.name(), "an array class"));
        };
        let cells = vec![component.default_value(); len];
        Self::array_from(class, cells)
    }

    /// Array holding `cells`
    pub fn array_from(class: &Class, cells: Vec<Value>) -> HeapResult<ObjRef> {
        let Some(component) = class.component_type() else {
            return Err(HeapError::wrong_kind(class.name(), "an array class"));
        };
        if let Some(bad) = cells.iter().find(|v| !component.accepts(v)) {
            return Err(HeapError::TypeMismatch {
                value: bad.to_string(),
                target: class.name().to_string(),
            });
        }
        Ok(Self::from_data(
            class,
            ObjectData {
                fields: Vec::new(),
                payload: Payload::Array(cells),
            },
        ))
    }

    /// Runtime class
    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Address used as identity key
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Shared access to the object state
    pub fn read(&self) -> RwLockReadGuard<'_, ObjectData> {
        self.0.data.read()
    }

    /// Exclusive access to the object state
    pub fn write(&self) -> RwLockWriteGuard<'_, ObjectData> {
        self.0.data.write()
    }

    /// One-level copy: same class, same slot values, copied payload
    pub fn shallow_copy(&self) -> ObjRef {
        let data = self.read().clone();
        Self::from_data(self.class(), data)
    }

    fn missing(&self, field: &str) -> HeapError {
        HeapError::MissingSlot {
            class: self.class().name().to_string(),
            field: field.to_string(),
        }
    }

    /// Slot value for an instance field descriptor
    pub fn slot(&self, field: &FieldDescriptor) -> HeapResult<Value> {
        self.read()
            .fields
            .get(field.slot())
            .cloned()
            .ok_or_else(|| self.missing(field.name()))
    }

    /// Overwrite the slot of an instance field descriptor
    pub fn set_slot(&self, field: &FieldDescriptor, value: Value) -> HeapResult<()> {
        if !field.field_type().accepts(&value) {
            return Err(HeapError::TypeMismatch {
                value: value.to_string(),
                target: format!("{}.{}", field.declaring_class(), field.name()),
            });
        }
        let mut data = self.write();
        match data.fields.get_mut(field.slot()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.missing(field.name())),
        }
    }

    /// Read a field by name
    pub fn get(&self, name: &str) -> HeapResult<Value> {
        let field = self
            .class()
            .instance_field(name)
            .ok_or_else(|| self.missing(name))?;
        self.slot(&field)
    }

    /// Write a field by name
    pub fn set(&self, name: &str, value: impl Into<Value>) -> HeapResult<()> {
        let field = self
            .class()
            .instance_field(name)
            .ok_or_else(|| self.missing(name))?;
        self.set_slot(&field, value.into())
    }

    fn wrong_kind(&self, expected: &'static str) -> HeapError {
        HeapError::wrong_kind(self.class().name(), expected)
    }

    /// Element count of an array or container
    pub fn len(&self) -> HeapResult<usize> {
        match &self.read().payload {
            Payload::Array(cells) | Payload::List(cells) => Ok(cells.len()),
            Payload::Set(set) => Ok(set.len()),
            Payload::Map(map) => Ok(map.len()),
            _ => Err(self.wrong_kind("an array or container")),
        }
    }

    /// Array cell
    pub fn index(&self, index: usize) -> HeapResult<Value> {
        match &self.read().payload {
            Payload::Array(cells) => cells.get(index).cloned().ok_or(HeapError::IndexOutOfBounds {
                index,
                len: cells.len(),
            }),
            _ => Err(self.wrong_kind("an array")),
        }
    }

    /// Overwrite an array cell
    pub fn set_index(&self, index: usize, value: impl Into<Value>) -> HeapResult<()> {
        let value = value.into();
        if let Some(component) = self.class().component_type()
            && !component.accepts(&value)
        {
            return Err(HeapError::TypeMismatch {
                value: value.to_string(),
                target: self.class().name().to_string(),
            });
        }
        let mut data = self.write();
        match &mut data.payload {
            Payload::Array(cells) => {
                let len = cells.len();
                let cell = cells
                    .get_mut(index)
                    .ok_or(HeapError::IndexOutOfBounds { index, len })?;
                *cell = value;
                Ok(())
            }
            _ => Err(self.wrong_kind("an array")),
        }
    }

    /// Add to a list or set. Returns `false` when a set already held the value.
    pub fn add(&self, value: impl Into<Value>) -> HeapResult<bool> {
        let value = value.into();
        let mut data = self.write();
        match &mut data.payload {
            Payload::List(items) => {
                items.push(value);
                Ok(true)
            }
            Payload::Set(set) => Ok(set.insert(value)),
            _ => Err(self.wrong_kind("a collection")),
        }
    }

    /// Append every element of another collection, keeping their order.
    ///
    /// Lists append. Sets skip values already present; an empty sorted set
    /// takes `values` in the given order without re-sorting them.
    pub fn add_all_ordered(&self, values: Vec<Value>) -> HeapResult<()> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::List(items) => {
                items.extend(values);
                Ok(())
            }
            Payload::Set(set) => {
                set.extend_ordered(values);
                Ok(())
            }
            _ => Err(self.wrong_kind("a collection")),
        }
    }

    /// Membership test for lists and sets
    pub fn contains(&self, value: &Value) -> HeapResult<bool> {
        match &self.read().payload {
            Payload::List(items) => Ok(items.contains(value)),
            Payload::Set(set) => Ok(set.contains(value)),
            _ => Err(self.wrong_kind("a collection")),
        }
    }

    /// Snapshot of array cells or collection elements in iteration order
    pub fn elements(&self) -> HeapResult<Vec<Value>> {
        match &self.read().payload {
            Payload::Array(cells) | Payload::List(cells) => Ok(cells.clone()),
            Payload::Set(set) => Ok(set.to_vec()),
            _ => Err(self.wrong_kind("an array or collection")),
        }
    }

    /// Insert or replace a map entry
    pub fn put(&self, key: impl Into<Value>, value: impl Into<Value>) -> HeapResult<Option<Value>> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::Map(map) => Ok(map.put(key.into(), value.into())),
            _ => Err(self.wrong_kind("a map")),
        }
    }

    /// Insert every entry of another map, keeping their order.
    ///
    /// An empty sorted map takes `entries` in the given order without
    /// re-sorting them.
    pub fn put_all_ordered(&self, entries: Vec<(Value, Value)>) -> HeapResult<()> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::Map(map) => {
                map.extend_ordered(entries);
                Ok(())
            }
            _ => Err(self.wrong_kind("a map")),
        }
    }

    /// Map lookup
    pub fn lookup(&self, key: &Value) -> HeapResult<Option<Value>> {
        match &self.read().payload {
            Payload::Map(map) => Ok(map.get(key)),
            _ => Err(self.wrong_kind("a map")),
        }
    }

    /// Snapshot of map entries in iteration order
    pub fn entries(&self) -> HeapResult<Vec<(Value, Value)>> {
        match &self.read().payload {
            Payload::Map(map) => Ok(map.to_vec()),
            _ => Err(self.wrong_kind("a map")),
        }
    }

    /// Whether the payload is a collection (list or set)
    pub fn is_collection(&self) -> bool {
        matches!(self.read().payload, Payload::List(_) | Payload::Set(_))
    }

    /// Whether the payload is a map
    pub fn is_map(&self) -> bool {
        matches!(self.read().payload, Payload::Map(_))
    }

    /// Comparator of a sorted set or map
    pub fn comparator(&self) -> Option<Comparator> {
        match &self.read().payload {
            Payload::Set(SetStore::Sorted { comparator, .. })
            | Payload::Map(MapStore::Sorted { comparator, .. }) => comparator.clone(),
            _ => None,
        }
    }

    /// Replace the ordering of a sorted set or map, re-sorting its contents
    pub fn set_comparator(&self, ordering: Option<Comparator>) -> HeapResult<()> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::Set(SetStore::Sorted { items, comparator }) => {
                items.sort_by(|a, b| compare_with(ordering.as_ref(), a, b));
                items.dedup_by(|a, b| compare_with(ordering.as_ref(), a, b).is_eq());
                *comparator = ordering;
                Ok(())
            }
            Payload::Map(MapStore::Sorted {
                entries,
                comparator,
            }) => {
                entries.sort_by(|a, b| compare_with(ordering.as_ref(), &a.0, &b.0));
                *comparator = ordering;
                Ok(())
            }
            _ => Err(self.wrong_kind("a sorted container")),
        }
    }

    /// Epoch milliseconds of a date
    pub fn millis(&self) -> HeapResult<i64> {
        match &self.read().payload {
            Payload::Date(millis) => Ok(*millis),
            Payload::Calendar(at) => Ok(at.timestamp_millis()),
            _ => Err(self.wrong_kind("a date")),
        }
    }

    /// Move a date to `millis`
    pub fn set_millis(&self, millis: i64) -> HeapResult<()> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::Date(current) => {
                *current = millis;
                Ok(())
            }
            _ => Err(self.wrong_kind("a date")),
        }
    }

    /// Zoned timestamp of a calendar
    pub fn calendar(&self) -> HeapResult<DateTime<FixedOffset>> {
        match &self.read().payload {
            Payload::Calendar(at) => Ok(*at),
            _ => Err(self.wrong_kind("a calendar")),
        }
    }

    /// Move a calendar to `at`
    pub fn set_calendar(&self, at: DateTime<FixedOffset>) -> HeapResult<()> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::Calendar(current) => {
                *current = at;
                Ok(())
            }
            _ => Err(self.wrong_kind("a calendar")),
        }
    }

    /// Current contents of a text buffer
    pub fn text(&self) -> HeapResult<String> {
        match &self.read().payload {
            Payload::Text(text) => Ok(text.clone()),
            _ => Err(self.wrong_kind("a text buffer")),
        }
    }

    /// Append to a text buffer
    pub fn append(&self, s: &str) -> HeapResult<()> {
        let mut data = self.write();
        match &mut data.payload {
            Payload::Text(text) => {
                text.push_str(s);
                Ok(())
            }
            _ => Err(self.wrong_kind("a text buffer")),
        }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.class().name(), self.addr())
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({self})")
    }
}
