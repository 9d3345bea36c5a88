//! Cloning error types

use mimic_heap::{FieldDescriptor, HeapError, ObjRef};
use thiserror::Error;

/// Cloning errors
#[derive(Debug, Error)]
pub enum CloneError {
    /// No way to create an instance of the class
    #[error("cannot instantiate {class}: {reason}")]
    Construction {
        /// Class name
        class: String,
        /// Why construction failed
        reason: String,
    },

    /// Reading or writing a field (or array cell, or container entry) failed
    #[error("cloning failed for {object}: `{field}`: {source}")]
    FieldAccess {
        /// Rendered source object
        object: String,
        /// Field name, `[index]` for array cells
        field: String,
        /// Heap-level cause
        #[source]
        source: HeapError,
    },

    /// A strategy is already registered for the exact class
    #[error("a type cloner is already registered for {class}")]
    DuplicateStrategy {
        /// Class name
        class: String,
    },

    /// Named static field does not exist
    #[error("{class} declares no static field `{field}`")]
    NoSuchStaticField {
        /// Class name
        class: String,
        /// Field name
        field: String,
    },

    /// Copy target is not an instance of the source class
    #[error("cannot copy fields of {from} into {into}")]
    IncompatibleTarget {
        /// Source class name
        from: String,
        /// Target class name
        into: String,
    },

    /// A class named by configuration is not registered
    #[error("unknown class `{0}`")]
    UnknownClass(String),

    /// Configuration could not be parsed
    #[error("invalid cloner configuration: {0}")]
    Config(String),
}

impl CloneError {
    /// Field access failure on `object`
    pub fn field_access(object: &ObjRef, field: &FieldDescriptor, source: HeapError) -> Self {
        Self::FieldAccess {
            object: object.to_string(),
            field: field.name().to_string(),
            source,
        }
    }

    /// Access failure on an array cell or container entry of `object`
    pub fn element_access(object: &ObjRef, what: impl Into<String>, source: HeapError) -> Self {
        Self::FieldAccess {
            object: object.to_string(),
            field: what.into(),
            source,
        }
    }

    /// Instantiation failure
    pub fn construction(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Map a heap error raised while instantiating `class`
    pub fn from_instantiation(class: &str, err: HeapError) -> Self {
        match err {
            HeapError::Construction { class, reason } => Self::Construction { class, reason },
            other => Self::Construction {
                class: class.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for cloning operations
pub type CloneResult<T> = std::result::Result<T, CloneError>;
