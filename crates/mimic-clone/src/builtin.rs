//! Built-in strategies for the standard containers, dates, calendars and
//! text buffers.
//!
//! Every strategy creates a fresh instance of the source's concrete class,
//! records it in the identity map before touching any child, copies declared
//! fields (subclasses of the standard classes may add some) and then fills the
//! payload in the source's iteration order. Children are cloned when `deep` is
//! set and shared otherwise.

use crate::cloner::Cloner;
use crate::error::{CloneError, CloneResult};
use crate::session::{IdentityMap, record};
use crate::strategy::{StrategyRegistry, TypeCloner};
use chrono::DateTime;
use mimic_heap::{ClassKind, ClassRegistry, ObjRef, Value, names};
use std::sync::Arc;

/// Instantiate the source's class and record the new instance
fn begin(
    cloner: &Cloner,
    source: &ObjRef,
    map: &mut Option<&mut IdentityMap>,
    deep: bool,
) -> CloneResult<(ObjRef, Value)> {
    let target = cloner.new_instance(source.class())?;
    let result = Value::Object(target.clone());
    record(map, source, &result);
    cloner.copy_fields(source, &target, map.as_deref_mut(), deep)?;
    Ok((target, result))
}

fn fill_collection(
    cloner: &Cloner,
    source: &ObjRef,
    mut map: Option<&mut IdentityMap>,
    deep: bool,
    keep_comparator: bool,
) -> CloneResult<Value> {
    let (target, result) = begin(cloner, source, &mut map, deep)?;
    if keep_comparator && let Some(comparator) = source.comparator() {
        target
            .set_comparator(Some(comparator))
            .map_err(|e| CloneError::element_access(source, "comparator", e))?;
    }
    let elements = source
        .elements()
        .map_err(|e| CloneError::element_access(source, "elements", e))?;
    let mut copies = Vec::with_capacity(elements.len());
    for element in &elements {
        copies.push(cloner.clone_child(element, map.as_deref_mut(), deep)?);
    }
    target
        .add_all_ordered(copies)
        .map_err(|e| CloneError::element_access(source, "elements", e))?;
    Ok(result)
}

fn fill_map(
    cloner: &Cloner,
    source: &ObjRef,
    mut map: Option<&mut IdentityMap>,
    deep: bool,
    keep_comparator: bool,
) -> CloneResult<Value> {
    let (target, result) = begin(cloner, source, &mut map, deep)?;
    if keep_comparator && let Some(comparator) = source.comparator() {
        target
            .set_comparator(Some(comparator))
            .map_err(|e| CloneError::element_access(source, "comparator", e))?;
    }
    let entries = source
        .entries()
        .map_err(|e| CloneError::element_access(source, "entries", e))?;
    let mut copies = Vec::with_capacity(entries.len());
    for (key, value) in &entries {
        let key = cloner.clone_child(key, map.as_deref_mut(), deep)?;
        let value = cloner.clone_child(value, map.as_deref_mut(), deep)?;
        copies.push((key, value));
    }
    target
        .put_all_ordered(copies)
        .map_err(|e| CloneError::element_access(source, "entries", e))?;
    Ok(result)
}

/// Array-backed, linked and copy-on-write lists
pub struct ListCloner;

impl TypeCloner for ListCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        fill_collection(cloner, source, map, deep, false)
    }
}

/// Hash, insertion-ordered and copy-on-write sets
pub struct SetCloner;

impl TypeCloner for SetCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        fill_collection(cloner, source, map, deep, false)
    }
}

/// Sorted sets; the clone keeps the source's comparator
pub struct SortedSetCloner;

impl TypeCloner for SortedSetCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        fill_collection(cloner, source, map, deep, true)
    }
}

/// Hash, insertion-ordered and concurrent maps
pub struct MapCloner;

impl TypeCloner for MapCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        fill_map(cloner, source, map, deep, false)
    }
}

/// Sorted maps; the clone keeps the source's comparator
pub struct SortedMapCloner;

impl TypeCloner for SortedMapCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        fill_map(cloner, source, map, deep, true)
    }
}

/// Dates, rebuilt from their epoch milliseconds
pub struct DateCloner;

impl TypeCloner for DateCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        let millis = source
            .millis()
            .map_err(|e| CloneError::element_access(source, "time", e))?;
        let (target, result) = begin(cloner, source, &mut map, deep)?;
        target
            .set_millis(millis)
            .map_err(|e| CloneError::element_access(source, "time", e))?;
        Ok(result)
    }
}

/// Calendars, rebuilt from epoch milliseconds in the source's zone
pub struct CalendarCloner;

impl TypeCloner for CalendarCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        let at = source
            .calendar()
            .map_err(|e| CloneError::element_access(source, "time", e))?;
        let rebuilt = DateTime::from_timestamp_millis(at.timestamp_millis())
            .map(|utc| utc.with_timezone(at.offset()))
            .unwrap_or(at);
        let (target, result) = begin(cloner, source, &mut map, deep)?;
        target
            .set_calendar(rebuilt)
            .map_err(|e| CloneError::element_access(source, "time", e))?;
        Ok(result)
    }
}

/// Text buffers, copied from their current contents.
///
/// Other character sequences are copied field by field.
pub struct TextCloner;

impl TypeCloner for TextCloner {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        mut map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        if *source.class().kind() != ClassKind::Text {
            return cloner.clone_fields(source, map, deep);
        }
        let snapshot = source
            .text()
            .map_err(|e| CloneError::element_access(source, "text", e))?;
        let (target, result) = begin(cloner, source, &mut map, deep)?;
        target
            .append(&snapshot)
            .map_err(|e| CloneError::element_access(source, "text", e))?;
        Ok(result)
    }
}

/// Any collection without a more specific strategy.
///
/// Objects that implement the collection interface without carrying
/// collection storage are copied field by field.
pub struct CollectionFallback;

impl TypeCloner for CollectionFallback {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        if !source.is_collection() {
            return cloner.clone_fields(source, map, deep);
        }
        fill_collection(cloner, source, map, deep, true)
    }
}

/// Any map without a more specific strategy
pub struct MapFallback;

impl TypeCloner for MapFallback {
    fn clone_object(
        &self,
        cloner: &Cloner,
        source: &ObjRef,
        map: Option<&mut IdentityMap>,
        deep: bool,
    ) -> CloneResult<Value> {
        if !source.is_map() {
            return cloner.clone_fields(source, map, deep);
        }
        fill_map(cloner, source, map, deep, true)
    }
}

/// Register the built-in strategies for the standard classes present in
/// `classes`.
///
/// Subtype fallbacks for dates, calendars, text, collections and maps are
/// always installed so container contents survive a generic copy. The
/// exact-class strategies are installed only when `exact` is set.
pub fn install(
    strategies: &StrategyRegistry,
    classes: &ClassRegistry,
    exact: bool,
) -> CloneResult<()> {
    let exact_strategies: [(&str, Arc<dyn TypeCloner>); 15] = [
        (names::ARRAY_LIST, Arc::new(ListCloner)),
        (names::LINKED_LIST, Arc::new(ListCloner)),
        (names::COPY_ON_WRITE_LIST, Arc::new(ListCloner)),
        (names::HASH_SET, Arc::new(SetCloner)),
        (names::LINKED_HASH_SET, Arc::new(SetCloner)),
        (names::COPY_ON_WRITE_SET, Arc::new(SetCloner)),
        (names::TREE_SET, Arc::new(SortedSetCloner)),
        (names::HASH_MAP, Arc::new(MapCloner)),
        (names::LINKED_HASH_MAP, Arc::new(MapCloner)),
        (names::CONCURRENT_MAP, Arc::new(MapCloner)),
        (names::TREE_MAP, Arc::new(SortedMapCloner)),
        (names::DATE, Arc::new(DateCloner)),
        (names::GREGORIAN_CALENDAR, Arc::new(CalendarCloner)),
        (names::TEXT_BUFFER, Arc::new(TextCloner)),
        (names::SYNC_TEXT_BUFFER, Arc::new(TextCloner)),
    ];
    for (name, strategy) in exact_strategies.into_iter().filter(|_| exact) {
        if let Some(class) = classes.get(name) {
            strategies.register(&class, strategy)?;
        }
    }

    let is_a: [(&str, Arc<dyn TypeCloner>); 5] = [
        (names::DATE, Arc::new(DateCloner)),
        (names::CALENDAR, Arc::new(CalendarCloner)),
        (names::CHAR_SEQUENCE, Arc::new(TextCloner)),
        (names::COLLECTION, Arc::new(CollectionFallback)),
        (names::MAP, Arc::new(MapFallback)),
    ];
    for (name, strategy) in is_a {
        if let Some(class) = classes.get(name) {
            strategies.register_is_a(&class, strategy);
        }
    }
    Ok(())
}
