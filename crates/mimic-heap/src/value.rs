//! Heap values.
//!
//! Primitives, strings and enum constants are immutable and copied freely.
//! Everything else lives behind an [`ObjRef`] and is compared by identity.

use crate::object::ObjRef;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An enum constant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumConstant {
    class: Arc<str>,
    ordinal: u32,
    name: Arc<str>,
}

impl EnumConstant {
    pub(crate) fn new(class: Arc<str>, ordinal: u32, name: Arc<str>) -> Self {
        Self {
            class,
            ordinal,
            name,
        }
    }

    /// Declaring enum class name
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Position in the declaration
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Constant name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A heap value
#[derive(Clone)]
pub enum Value {
    /// Absent reference
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Character
    Char(char),
    /// Immutable string
    Str(Arc<str>),
    /// Enum constant
    Enum(EnumConstant),
    /// Reference to a heap object
    Object(ObjRef),
}

impl Value {
    /// String value
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// Null check
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitive values and strings
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Char(_) | Value::Str(_)
        )
    }

    /// Heap object, if any
    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Integer, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// String slice, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison: objects by address, everything else by value
    pub fn same(&self, other: &Value) -> bool {
        self == other
    }

    /// Short type label used in messages
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Enum(constant) => constant.class_name(),
            Value::Object(obj) => obj.class().name(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Char(_) => 3,
            Value::Str(_) => 4,
            Value::Enum(_) => 5,
            Value::Object(_) => 6,
        }
    }

    /// Natural ordering used by sorted containers without a comparator.
    ///
    /// Values of different kinds order by kind; numbers compare numerically;
    /// objects fall back to address order.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Enum(a), Value::Enum(b)) => a
                .class_name()
                .cmp(b.class_name())
                .then(a.ordinal().cmp(&b.ordinal())),
            (Value::Object(a), Value::Object(b)) => a.addr().cmp(&b.addr()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Char(c) => c.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Enum(constant) => constant.hash(state),
            Value::Object(obj) => obj.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Enum(constant) => write!(f, "{}.{}", constant.class_name(), constant.name()),
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Object(obj)
    }
}

impl From<&ObjRef> for Value {
    fn from(obj: &ObjRef) -> Self {
        Value::Object(obj.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_ordering_across_kinds() {
        let mut values = vec![
            Value::str("b"),
            Value::Int(3),
            Value::Null,
            Value::Float(1.5),
            Value::str("a"),
        ];
        values.sort_by(|a, b| a.natural_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(1.5),
                Value::Int(3),
                Value::str("a"),
                Value::str("b"),
            ]
        );
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }
}
