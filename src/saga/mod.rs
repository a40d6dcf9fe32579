//! Saga Orchestrator
//!
//! Drives the market-order workflow as four independent handlers, each
//! triggered by one event type and producing the next step's events. Each
//! step has a different latency class and failure model, so independent
//! subscribers can scale and retry independently.
//!
//! Every handler follows the same skeleton: check the processed-event set,
//! load aggregates fresh from the log, perform external calls and aggregate
//! commands, save, publish follow-up events, and record the event id last.
//! A crash before the final record results in a safe replay; the
//! three-layer idempotency (processed-event set, log uniqueness, swap
//! idempotency key) carries the burden.

mod compensation;
mod complete_order;
mod completion_step;
mod position_step;
mod quote_step;
mod swap_step;

pub use compensation::Compensations;
pub use complete_order::{CompleteOrder, CompletionOutcome};
pub use completion_step::CompleteOrderStep;
pub use position_step::OpenPositionStep;
pub use quote_step::QuotePriceStep;
pub use swap_step::ExecuteSwapStep;

use crate::bus::BusError;
use crate::domain::DomainError;
use crate::event_store::EventStoreError;
use crate::idempotency::IdempotencyError;
use crate::services::ExternalError;

/// Synthetic coordination event: a position exists for the order
pub const POSITION_CREATED_FOR_ORDER: &str = "PositionCreatedForOrder";

/// Synthetic coordination event: the order and position are linked
pub const POSITION_LINKED_TO_ORDER: &str = "PositionLinkedToOrder";

/// Bounded in-handler retries for optimistic concurrency conflicts before
/// the event is handed back to the broker for redelivery
pub(crate) const MAX_COMMAND_ATTEMPTS: u32 = 3;

/// Errors surfaced by saga handlers. Returning one requeues the delivery.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("External failure: {0}")]
    External(#[from] ExternalError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version conflict persisted after {0} attempts")]
    ConflictRetriesExhausted(u32),

    #[error("Order {0} has no quoted amount to complete against")]
    MissingQuote(uuid::Uuid),
}
