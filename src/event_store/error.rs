//! Event Store Errors
//!
//! Error types for event store operations.

use uuid::Uuid;

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict on `(aggregate_id, version)`
    #[error("Version conflict for aggregate {aggregate_id} at version {version}")]
    VersionConflict { aggregate_id: Uuid, version: i64 },

    /// The event id has already been committed
    #[error("Duplicate event: {0}")]
    Duplicate(Uuid),

    /// Expected aggregate has an empty stream
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error (includes unknown event types during replay)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, EventStoreError::VersionConflict { .. })
    }

    /// Conflicts and duplicates are recovered by reloading the aggregate
    /// and reissuing the command; everything else surfaces to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::VersionConflict { .. } | EventStoreError::Duplicate(_)
        )
    }
}
