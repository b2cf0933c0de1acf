//! Error types for the Courier engine.

use crate::{ConflictId, OpStatus};
use thiserror::Error;

/// All possible errors from the Courier engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("unknown operation type: {0}")]
    UnknownOperation(String),

    #[error("operation '{operation}' is not supported for entity '{entity}'")]
    UnsupportedOperation { entity: String, operation: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // State errors
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OpStatus, to: OpStatus },

    #[error("conflict already resolved: {0}")]
    AlreadyResolved(ConflictId),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::UnknownEntity("invoice".into());
        assert_eq!(err.to_string(), "unknown entity type: invoice");

        let err = Error::InvalidTransition {
            from: OpStatus::Completed,
            to: OpStatus::Syncing,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition: completed -> syncing"
        );

        let err = Error::TypeMismatch {
            field: "phone".into(),
            expected: "String".into(),
            got: "Int".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for field 'phone': expected String, got Int"
        );
    }
}
