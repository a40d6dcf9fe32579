//! Aggregate Store
//!
//! Loads aggregates by replaying their event stream and saves the
//! uncommitted events they produced. Saving flushes the buffer through a
//! single log append; on a version conflict the instance is stale and the
//! caller restarts its operation from a fresh load.

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::DomainEvent;

use super::{EventStore, EventStoreError, NewEvent};

/// Store for loading and saving event-sourced aggregates
#[derive(Debug, Clone)]
pub struct AggregateStore {
    events: EventStore,
}

impl AggregateStore {
    /// Create a new AggregateStore over a database pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: EventStore::new(pool),
        }
    }

    /// Access the underlying event store
    pub fn event_store(&self) -> &EventStore {
        &self.events
    }

    /// Load an aggregate by replaying its stream.
    ///
    /// # Errors
    /// - `EventStoreError::AggregateNotFound` for an empty stream.
    /// - `EventStoreError::Serialization` for an unknown event type
    ///   (replay is strict).
    pub async fn load<A: Aggregate>(&self, aggregate_id: Uuid) -> Result<A, EventStoreError> {
        let rows = self.events.load(aggregate_id).await?;
        if rows.is_empty() {
            return Err(EventStoreError::AggregateNotFound(aggregate_id));
        }

        let mut aggregate = A::default();
        for row in rows {
            let event: A::Event = serde_json::from_value(row.event_data)?;
            aggregate.replay(&event);
        }
        Ok(aggregate)
    }

    /// Save the aggregate's uncommitted events in one append, clearing the
    /// buffer. Saving with no uncommitted events is a no-op.
    pub async fn save<A: Aggregate>(&self, aggregate: &mut A) -> Result<usize, EventStoreError> {
        let events = drain_events(aggregate)?;
        if events.is_empty() {
            return Ok(0);
        }
        let count = events.len();
        self.events.append(&events).await?;
        Ok(count)
    }
}

/// Drain an aggregate's uncommitted buffer into appendable rows.
///
/// Exposed so multi-aggregate use cases can gather events from several
/// aggregates and submit them as one atomic append.
pub fn drain_events<A: Aggregate>(aggregate: &mut A) -> Result<Vec<NewEvent>, EventStoreError> {
    let aggregate_id = aggregate.id();
    aggregate
        .take_uncommitted()
        .into_iter()
        .map(|pending| {
            Ok(NewEvent {
                event_id: pending.event_id,
                aggregate_id,
                aggregate_type: A::aggregate_type().to_string(),
                event_type: pending.payload.event_type().to_string(),
                event_data: serde_json::to_value(&pending.payload)?,
                metadata: pending.metadata,
                version: pending.version,
                timestamp: pending.timestamp,
            })
        })
        .collect()
}
