//! Atomic completion use case
//!
//! Finalizes an order and its position in one log append. The
//! `(aggregate_id, version)` uniqueness on each entry provides the
//! optimistic concurrency control: when two workers race, exactly one
//! commit lands and the loser restarts from a reload, observes the
//! completed order, and exits early.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::aggregate::{Order, OrderStatus, Position};
use crate::domain::EventMetadata;
use crate::event_store::{drain_events, AggregateStore};

use super::{SagaError, MAX_COMMAND_ATTEMPTS};

/// How a completion attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Both aggregates committed in this invocation
    Committed,
    /// A previous invocation already completed the order
    AlreadyCompleted,
}

/// Use case finalizing `(order, position)` pairs
#[derive(Clone)]
pub struct CompleteOrder {
    store: AggregateStore,
}

impl CompleteOrder {
    pub fn new(store: AggregateStore) -> Self {
        Self { store }
    }

    /// Complete the order and attach it to the position atomically.
    ///
    /// # Errors
    /// `SagaError::ConflictRetriesExhausted` after repeated optimistic
    /// conflicts; the caller requeues and tries again later.
    pub async fn execute(
        &self,
        order_id: Uuid,
        position_id: Uuid,
    ) -> Result<CompletionOutcome, SagaError> {
        for attempt in 0..MAX_COMMAND_ATTEMPTS {
            let mut order: Order = self.store.load(order_id).await?;
            if order.status() == OrderStatus::Completed {
                tracing::debug!(%order_id, "Order already completed");
                return Ok(CompletionOutcome::AlreadyCompleted);
            }

            let mut position: Position = self.store.load(position_id).await?;

            let to_amount = order.to_amount().ok_or(SagaError::MissingQuote(order_id))?;
            let value = order.from_amount();
            let metadata = EventMetadata::new().with_position_id(position_id);

            order.complete(metadata.clone())?;
            // pnl is zero for an order attaching to its freshly created position
            position.add_order(order_id, to_amount, value, Decimal::ZERO, metadata)?;

            let mut events = drain_events(&mut order)?;
            events.extend(drain_events(&mut position)?);

            match self.store.event_store().append(&events).await {
                Ok(()) => {
                    tracing::info!(%order_id, %position_id, "Order completed and linked to position");
                    return Ok(CompletionOutcome::Committed);
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_COMMAND_ATTEMPTS => {
                    tracing::warn!(%order_id, %position_id, attempt, "Conflict completing order, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SagaError::ConflictRetriesExhausted(MAX_COMMAND_ATTEMPTS))
    }
}
