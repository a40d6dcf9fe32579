//! Processed-event repository
//!
//! Backed by the `processed_events` table with `event_id` unique. Marking
//! an already-marked event is a no-op, which makes the final step of every
//! handler itself idempotent.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Errors that can occur in processed-event tracking
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Stored processed-event row
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub processed_by: String,
    pub processed_at: DateTime<Utc>,
}

/// Repository over the processed_events table
#[derive(Debug, Clone)]
pub struct ProcessedEventRepository {
    pool: PgPool,
}

impl ProcessedEventRepository {
    /// Create a new ProcessedEventRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check whether a consumer already handled this event
    pub async fn is_processed(&self, event_id: Uuid) -> Result<bool, IdempotencyError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1)
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Record an event as fully handled. Recording the same event twice is
    /// a no-op.
    pub async fn mark_processed(
        &self,
        event_id: Uuid,
        aggregate_id: Uuid,
        event_type: &str,
        processed_by: &str,
    ) -> Result<(), IdempotencyError> {
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, aggregate_id, event_type, processed_by, processed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(aggregate_id)
        .bind(event_type)
        .bind(processed_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch one processed-event row (for diagnostics)
    pub async fn get(&self, event_id: Uuid) -> Result<Option<ProcessedEvent>, IdempotencyError> {
        let row: Option<(Uuid, Uuid, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT event_id, aggregate_id, event_type, processed_by, processed_at
            FROM processed_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(event_id, aggregate_id, event_type, processed_by, processed_at)| ProcessedEvent {
                event_id,
                aggregate_id,
                event_type,
                processed_by,
                processed_at,
            },
        ))
    }

    /// Delete processed-event rows older than the retention window.
    /// Returns the number of rows removed.
    pub async fn prune_older_than(&self, retention_days: i64) -> Result<u64, IdempotencyError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM processed_events
            WHERE processed_at < NOW() - make_interval(days => $1::int)
            "#,
        )
        .bind(retention_days)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows)
    }
}
