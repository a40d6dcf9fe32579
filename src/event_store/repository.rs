//! Event Store Repository
//!
//! Append-only store of domain events organized as streams keyed by
//! aggregate id. Every append writes the events and their outbox mirror
//! rows in one transaction; the `(aggregate_id, version)` and `event_id`
//! uniqueness constraints are the only concurrency primitives.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{EventEnvelope, EventMetadata};

use super::EventStoreError;

/// Named uniqueness constraints the append path maps onto typed errors
const VERSION_CONSTRAINT: &str = "events_aggregate_id_version_key";
const EVENT_ID_CONSTRAINT: &str = "events_event_id_key";

/// Stored event from the database
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub metadata: EventMetadata,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// An event ready to be appended to the log
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub metadata: EventMetadata,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
}

impl NewEvent {
    /// Build the wire envelope mirrored into the outbox for this event
    fn envelope(&self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type.clone(),
            event_type: self.event_type.clone(),
            version: self.version,
            timestamp: self.timestamp,
            metadata: self.metadata.clone(),
            payload: self.event_data.clone(),
        }
    }
}

/// Event Store for persisting and retrieving events
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically append events, possibly spanning multiple aggregates.
    ///
    /// Either every event and every outbox mirror row commits, or none.
    ///
    /// # Errors
    /// - `EventStoreError::VersionConflict` if any `(aggregate_id, version)`
    ///   already exists; the caller is expected to reload and retry.
    /// - `EventStoreError::Duplicate` if any `event_id` already exists.
    pub async fn append(&self, events: &[NewEvent]) -> Result<(), EventStoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for event in events {
            self.insert_event(&mut tx, event).await?;
            self.insert_outbox_row(&mut tx, event).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &NewEvent,
    ) -> Result<(), EventStoreError> {
        let metadata = serde_json::to_value(&event.metadata)?;

        let result = sqlx::query(
            r#"
            INSERT INTO events (
                event_id, aggregate_id, aggregate_type,
                event_type, event_data, metadata, version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id)
        .bind(event.aggregate_id)
        .bind(&event.aggregate_type)
        .bind(&event.event_type)
        .bind(&event.event_data)
        .bind(&metadata)
        .bind(event.version)
        .bind(event.timestamp)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(map_unique_violation(e, event)),
        }
    }

    async fn insert_outbox_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &NewEvent,
    ) -> Result<(), EventStoreError> {
        let envelope = serde_json::to_value(event.envelope())?;

        sqlx::query(
            r#"
            INSERT INTO outbox (event_id, aggregate_id, event_type, event_data, published, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5)
            "#,
        )
        .bind(event.event_id)
        .bind(event.aggregate_id)
        .bind(&event.event_type)
        .bind(&envelope)
        .bind(event.timestamp)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Load an aggregate's stream in ascending version order.
    ///
    /// An empty vector is the not-found signal; callers that expect the
    /// aggregate to exist turn it into `AggregateNotFound`.
    pub async fn load(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.load_from_version(aggregate_id, 1).await
    }

    /// Partial load starting at `min_version` (inclusive), for
    /// snapshot-based replay.
    pub async fn load_from_version(
        &self,
        aggregate_id: Uuid,
        min_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        type Row = (
            i64,
            Uuid,
            Uuid,
            String,
            String,
            serde_json::Value,
            serde_json::Value,
            i64,
            DateTime<Utc>,
        );

        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT id, event_id, aggregate_id, aggregate_type, event_type,
                   event_data, metadata, version, created_at
            FROM events
            WHERE aggregate_id = $1 AND version >= $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(min_version)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, event_id, aggregate_id, aggregate_type, event_type, event_data, metadata, version, created_at)| {
                    Ok(StoredEvent {
                        id,
                        event_id,
                        aggregate_id,
                        aggregate_type,
                        event_type,
                        event_data,
                        metadata: serde_json::from_value(metadata)?,
                        version,
                        created_at,
                    })
                },
            )
            .collect()
    }
}

/// Map a Postgres unique violation onto the typed conflict it represents
fn map_unique_violation(error: sqlx::Error, event: &NewEvent) -> EventStoreError {
    if let sqlx::Error::Database(ref db_err) = error {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some(VERSION_CONSTRAINT) => EventStoreError::VersionConflict {
                    aggregate_id: event.aggregate_id,
                    version: event.version,
                },
                Some(EVENT_ID_CONSTRAINT) => EventStoreError::Duplicate(event.event_id),
                _ => EventStoreError::Database(error),
            };
        }
    }
    EventStoreError::Database(error)
}
