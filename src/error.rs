//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::value::{ValueKind, ValueType};

/// All failure modes surfaced across the slot deriver, cluster tree, value
/// normalizer and dictionary façade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DictError {
    #[error("column does not hold a dictionary, or key type does not match the declared key type")]
    CollectionTypeMismatch,

    #[error("value of kind {found:?} is not compatible with declared value type {expected:?}")]
    TypeMismatch { expected: ValueType, found: ValueKind },

    #[error("key {0:?} is invalid: string keys may not start with '$' or contain '.'")]
    InvalidKey(String),

    #[error("typed link targets table {found:?}, expected the column's opposite table {expected:?}")]
    WrongObjectType { expected: String, found: String },

    #[error("link target object key is out of range and not marked unresolved")]
    TargetOutOfRange,

    #[error("key not found in dictionary")]
    KeyNotFound,

    #[error("index {index} out of range for size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("slot already used")]
    SlotAlreadyUsed,

    #[error("operation invoked on a handle whose parent object is no longer live")]
    DetachedAccessor,

    #[error("key type {0} is not supported (only Int and String keys are implemented)")]
    NotImplemented(&'static str),

    #[error("arena allocation failed")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, DictError>;
