//! Domain module
//!
//! Core domain types and business logic.

pub mod amount;
pub mod envelope;
pub mod error;
pub mod events;

pub use amount::{Amount, AmountError};
pub use envelope::{EventEnvelope, EventMetadata, POSITION_ID_KEY};
pub use error::DomainError;
pub use events::{DomainEvent, OrderChanges, OrderEvent, OrderType, PositionEvent};
