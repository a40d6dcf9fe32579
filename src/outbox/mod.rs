//! Transactional outbox
//!
//! Mirror rows for committed events, written inside the same transaction
//! as the event log append. The relay publishes unpublished rows to the
//! message bus and flips `published` after broker acknowledgement, which
//! yields at-least-once publication.

mod relay;

pub use relay::OutboxRelay;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Errors that can occur in outbox operations
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outbox row awaiting or past publication
#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: i64,
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Repository over the outbox table
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: PgPool,
}

impl OutboxRepository {
    /// Create a new OutboxRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch unpublished rows in commit order, bounded by `limit`.
    ///
    /// `created_at` ordering preserves per-aggregate causal order because
    /// versions are monotonic within a single append transaction.
    pub async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRow>, OutboxError> {
        type Row = (
            i64,
            Uuid,
            Uuid,
            String,
            serde_json::Value,
            bool,
            Option<DateTime<Utc>>,
            DateTime<Utc>,
        );

        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT id, event_id, aggregate_id, event_type, event_data,
                   published, published_at, created_at
            FROM outbox
            WHERE NOT published
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, event_id, aggregate_id, event_type, event_data, published, published_at, created_at)| {
                    OutboxRow {
                        id,
                        event_id,
                        aggregate_id,
                        event_type,
                        event_data,
                        published,
                        published_at,
                        created_at,
                    }
                },
            )
            .collect())
    }

    /// Mark a row published after broker acknowledgement
    pub async fn mark_published(&self, event_id: Uuid) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET published = TRUE, published_at = NOW()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
