use thiserror::Error;

/// Errors produced while serializing, deserializing or accessing instances.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{type_name}: expected {expected}, found {found}")]
    TypeMismatch {
        type_name: String,
        expected: String,
        found: String,
    },

    #[error("{model} has no property named {key:?}")]
    UnknownProperty { model: String, key: String },

    #[error("{type_name}: cannot convert {value}: {reason}")]
    InvalidScalar {
        type_name: String,
        value: String,
        reason: String,
    },
}

pub type ModelResult<T> = Result<T, ModelError>;
