//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//!
//! Aggregates are pure in-memory state machines. Command methods validate
//! business rules and call [`Aggregate::apply`] with a freshly constructed
//! event; `apply` runs the state transition and records the event in the
//! uncommitted buffer at `current_version + 1`. Replay runs the same
//! transition without recording, so loaded state and live state can never
//! diverge.

pub mod order;
pub mod position;

pub use order::{Order, OrderStatus, SwapOutcome};
pub use position::{Position, PositionStatus};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{DomainEvent, EventMetadata};

/// An event produced by a command but not yet persisted.
///
/// Version and identity are assigned at apply time; the event store relies
/// on them for optimistic concurrency.
#[derive(Debug, Clone)]
pub struct PendingEvent<E> {
    pub event_id: Uuid,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub metadata: EventMetadata,
    pub payload: E,
}

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized + Default {
    /// The type of events this aggregate handles
    type Event: DomainEvent;

    /// Get the aggregate type name (for storage)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> Uuid;

    /// Get the current version (number of events applied)
    fn version(&self) -> i64;

    /// Set the current version; used by the apply/replay machinery only
    fn set_version(&mut self, version: i64);

    /// State-transition function shared by live commands and replay.
    /// Must not touch the version or the uncommitted buffer.
    fn when(&mut self, event: &Self::Event);

    /// Events produced by commands since the last save
    fn uncommitted(&self) -> &[PendingEvent<Self::Event>];

    /// Mutable access to the uncommitted buffer
    fn uncommitted_mut(&mut self) -> &mut Vec<PendingEvent<Self::Event>>;

    /// Apply a new event: transition state and record it for persistence
    fn apply(&mut self, event: Self::Event) {
        self.apply_with_metadata(event, EventMetadata::new());
    }

    /// Apply a new event carrying saga correlation metadata
    fn apply_with_metadata(&mut self, event: Self::Event, metadata: EventMetadata) {
        let version = self.version() + 1;
        self.when(&event);
        self.set_version(version);
        self.uncommitted_mut().push(PendingEvent {
            event_id: Uuid::new_v4(),
            version,
            timestamp: Utc::now(),
            metadata,
            payload: event,
        });
    }

    /// Replay a stored event: transition state without recording
    fn replay(&mut self, event: &Self::Event) {
        let version = self.version() + 1;
        self.when(event);
        self.set_version(version);
    }

    /// Drain the uncommitted buffer, leaving it empty
    fn take_uncommitted(&mut self) -> Vec<PendingEvent<Self::Event>> {
        std::mem::take(self.uncommitted_mut())
    }
}
