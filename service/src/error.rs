//! Unified error handling for the sync service.
//!
//! Only enqueue-time errors (validation, capacity) ever reach a caller
//! synchronously; everything that happens during a sync pass is absorbed by
//! the worker and surfaces through operation status fields instead.

/// Sync service error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(#[from] courier_engine::Error),

    #[error("queue full for user {user_id}: {depth} operations in flight")]
    Capacity { user_id: String, depth: usize },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_wrap_engine_errors() {
        let err: SyncError = courier_engine::Error::UnknownEntity("invoice".into()).into();
        assert_eq!(
            err.to_string(),
            "validation failed: unknown entity type: invoice"
        );
    }

    #[test]
    fn capacity_error_display() {
        let err = SyncError::Capacity {
            user_id: "user-1".into(),
            depth: 100,
        };
        assert_eq!(
            err.to_string(),
            "queue full for user user-1: 100 operations in flight"
        );
    }
}
