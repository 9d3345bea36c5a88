//! Heap error types

use thiserror::Error;

/// Errors raised by the reflective heap
#[derive(Debug, Clone, Error)]
pub enum HeapError {
    /// Reflective access to the field was denied
    #[error("field `{field}` of {class} is not accessible")]
    InaccessibleField {
        /// Declaring class name
        class: String,
        /// Field name
        field: String,
    },

    /// The object has no storage slot for the field
    #[error("{class} instance has no slot for field `{field}`")]
    MissingSlot {
        /// Runtime class name
        class: String,
        /// Field name
        field: String,
    },

    /// A static field was used where an instance field was expected (or vice versa)
    #[error("field `{field}` of {class} is {expected}")]
    WrongFieldKind {
        /// Declaring class name
        class: String,
        /// Field name
        field: String,
        /// What the field was expected to be
        expected: &'static str,
    },

    /// The class cannot be instantiated
    #[error("cannot instantiate {class}: {reason}")]
    Construction {
        /// Class name
        class: String,
        /// Why construction failed
        reason: String,
    },

    /// The object does not carry the payload an operation needs
    #[error("{class} is not {expected}")]
    WrongKind {
        /// Runtime class name
        class: String,
        /// Expected payload, e.g. "an array"
        expected: &'static str,
    },

    /// Array index out of bounds
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Array length
        len: usize,
    },

    /// No class registered under the name
    #[error("unknown class `{0}`")]
    UnknownClass(String),

    /// Value rejected by the declared type of a slot
    #[error("cannot store {value} into {target}")]
    TypeMismatch {
        /// Rendered value
        value: String,
        /// Target slot description
        target: String,
    },
}

impl HeapError {
    /// Create a construction error
    pub fn construction(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Create a wrong-kind error
    pub fn wrong_kind(class: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongKind {
            class: class.into(),
            expected,
        }
    }
}

/// Result type for heap operations
pub type HeapResult<T> = std::result::Result<T, HeapError>;
