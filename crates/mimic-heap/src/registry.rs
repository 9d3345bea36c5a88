//! Class registry and the standard class library.

use crate::class::{Class, ClassBuilder, ClassKind, ContainerKind, FieldType};
use crate::error::{HeapError, HeapResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Names of the standard classes
pub mod names {
    /// Universal root class
    pub const OBJECT: &str = "Object";
    /// Class mirrors
    pub const CLASS: &str = "Class";
    /// Handle to a cloning engine
    pub const CLONER: &str = "Cloner";

    /// Collection interface
    pub const COLLECTION: &str = "Collection";
    /// List interface
    pub const LIST: &str = "List";
    /// Set interface
    pub const SET: &str = "Set";
    /// Sorted set interface
    pub const SORTED_SET: &str = "SortedSet";
    /// Map interface
    pub const MAP: &str = "Map";
    /// Sorted map interface
    pub const SORTED_MAP: &str = "SortedMap";
    /// Character sequence interface
    pub const CHAR_SEQUENCE: &str = "CharSequence";

    /// Array-backed list
    pub const ARRAY_LIST: &str = "ArrayList";
    /// Linked list
    pub const LINKED_LIST: &str = "LinkedList";
    /// Copy-on-write list
    pub const COPY_ON_WRITE_LIST: &str = "CopyOnWriteList";
    /// Hash set
    pub const HASH_SET: &str = "HashSet";
    /// Insertion-ordered hash set
    pub const LINKED_HASH_SET: &str = "LinkedHashSet";
    /// Sorted set
    pub const TREE_SET: &str = "TreeSet";
    /// Copy-on-write set
    pub const COPY_ON_WRITE_SET: &str = "CopyOnWriteSet";
    /// Hash map
    pub const HASH_MAP: &str = "HashMap";
    /// Insertion-ordered hash map
    pub const LINKED_HASH_MAP: &str = "LinkedHashMap";
    /// Sorted map
    pub const TREE_MAP: &str = "TreeMap";
    /// Concurrent hash map
    pub const CONCURRENT_MAP: &str = "ConcurrentMap";

    /// Mutable point in time
    pub const DATE: &str = "Date";
    /// Abstract calendar
    pub const CALENDAR: &str = "Calendar";
    /// Gregorian calendar
    pub const GREGORIAN_CALENDAR: &str = "GregorianCalendar";
    /// Unsynchronized text buffer
    pub const TEXT_BUFFER: &str = "TextBuffer";
    /// Synchronized text buffer
    pub const SYNC_TEXT_BUFFER: &str = "SyncTextBuffer";

    /// Compiled regular expression
    pub const PATTERN: &str = "Pattern";
    /// Resource identifier
    pub const URI: &str = "Uri";
    /// 128-bit identifier
    pub const UUID: &str = "Uuid";
    /// Arbitrary precision decimal
    pub const DECIMAL: &str = "Decimal";
    /// Immutable instant
    pub const INSTANT: &str = "Instant";
    /// Immutable duration
    pub const DURATION: &str = "Duration";
}

/// Name to class lookup
pub struct ClassRegistry {
    classes: RwLock<FxHashMap<Arc<str>, Class>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
        }
    }

    /// Registry preloaded with the standard classes
    pub fn standard() -> Self {
        let registry = Self::new();
        registry.install_standard();
        registry
    }

    /// Build and register a class.
    ///
    /// Classes without a superclass extend the universal base when one is
    /// registered. Redefining a name replaces the previous class.
    pub fn define(&self, mut builder: ClassBuilder) -> Class {
        if builder.is_rootless()
            && let Some(root) = self.get(names::OBJECT)
        {
            builder = builder.extends(&root);
        }
        self.register(builder.build())
    }

    /// Register an already built class under its own name
    pub fn register(&self, class: Class) -> Class {
        let previous = self
            .classes
            .write()
            .insert(class.name_arc(), class.clone());
        if previous.is_some() {
            tracing::warn!(class = class.name(), "class redefined");
        }
        class
    }

    /// Lookup by name
    pub fn get(&self, name: &str) -> Option<Class> {
        self.classes.read().get(name).cloned()
    }

    /// Lookup by name, failing when absent
    pub fn require(&self, name: &str) -> HeapResult<Class> {
        self.get(name)
            .ok_or_else(|| HeapError::UnknownClass(name.to_string()))
    }

    /// Array class for `component`, created on first use
    pub fn array_of(&self, component: FieldType) -> Class {
        let name = format!("{}[]", component.name());
        if let Some(class) = self.get(&name) {
            return class;
        }
        let mut classes = self.classes.write();
        classes
            .entry(Arc::from(name))
            .or_insert_with(|| ClassBuilder::array(component).build())
            .clone()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Empty check
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    fn install_standard(&self) {
        use names::*;

        self.define(ClassBuilder::new(OBJECT).universal_base());
        self.define(
            ClassBuilder::new(CLASS)
                .field("name", FieldType::reference("String"))
                .without_default_constructor(),
        );
        self.define(ClassBuilder::new(CLONER).without_default_constructor());

        let collection = self.define(ClassBuilder::interface(COLLECTION));
        let list = self.define(ClassBuilder::interface(LIST).implements(&collection));
        let set = self.define(ClassBuilder::interface(SET).implements(&collection));
        let sorted_set = self.define(ClassBuilder::interface(SORTED_SET).implements(&set));
        let map = self.define(ClassBuilder::interface(MAP));
        let sorted_map = self.define(ClassBuilder::interface(SORTED_MAP).implements(&map));
        let char_sequence = self.define(ClassBuilder::interface(CHAR_SEQUENCE));

        let container = |name: &str, kind: ContainerKind, iface: &Class| {
            self.define(
                ClassBuilder::new(name)
                    .kind(ClassKind::Container(kind))
                    .implements(iface)
                    .native_clone(),
            )
        };
        container(ARRAY_LIST, ContainerKind::ArrayList, &list);
        container(LINKED_LIST, ContainerKind::LinkedList, &list);
        container(COPY_ON_WRITE_LIST, ContainerKind::CopyOnWriteList, &list);
        let hash_set = container(HASH_SET, ContainerKind::HashSet, &set);
        self.define(
            ClassBuilder::new(LINKED_HASH_SET)
                .kind(ClassKind::Container(ContainerKind::LinkedHashSet))
                .extends(&hash_set)
                .implements(&set),
        );
        container(TREE_SET, ContainerKind::TreeSet, &sorted_set);
        container(COPY_ON_WRITE_SET, ContainerKind::CopyOnWriteSet, &set);
        let hash_map = container(HASH_MAP, ContainerKind::HashMap, &map);
        self.define(
            ClassBuilder::new(LINKED_HASH_MAP)
                .kind(ClassKind::Container(ContainerKind::LinkedHashMap))
                .extends(&hash_map)
                .implements(&map),
        );
        container(TREE_MAP, ContainerKind::TreeMap, &sorted_map);
        container(CONCURRENT_MAP, ContainerKind::ConcurrentMap, &map);

        self.define(ClassBuilder::new(DATE).kind(ClassKind::Date).native_clone());
        let calendar = self.define(
            ClassBuilder::new(CALENDAR)
                .kind(ClassKind::Calendar)
                .abstract_class()
                .native_clone(),
        );
        self.define(ClassBuilder::new(GREGORIAN_CALENDAR).extends(&calendar));
        self.define(
            ClassBuilder::new(TEXT_BUFFER)
                .kind(ClassKind::Text)
                .implements(&char_sequence),
        );
        self.define(
            ClassBuilder::new(SYNC_TEXT_BUFFER)
                .kind(ClassKind::Text)
                .implements(&char_sequence),
        );

        self.define(
            ClassBuilder::new(PATTERN)
                .field("source", FieldType::reference("String"))
                .field("flags", FieldType::int())
                .without_default_constructor(),
        );
        self.define(ClassBuilder::new(URI).field("text", FieldType::reference("String")));
        self.define(
            ClassBuilder::new(UUID)
                .field("high", FieldType::int())
                .field("low", FieldType::int()),
        );
        self.define(
            ClassBuilder::new(DECIMAL)
                .field("unscaled", FieldType::int())
                .field("scale", FieldType::int()),
        );
        self.define(
            ClassBuilder::new(INSTANT)
                .field("seconds", FieldType::int())
                .field("nanos", FieldType::int()),
        );
        self.define(
            ClassBuilder::new(DURATION)
                .field("seconds", FieldType::int())
                .field("nanos", FieldType::int()),
        );
    }
}
