//! Compensations
//!
//! Logical undo applied via further commands when a later step cannot
//! proceed. Valid through the swap step only: once the on-chain swap has
//! executed there is nothing to unwind, and completion must be retried
//! instead.

use uuid::Uuid;

use crate::aggregate::{Order, Position};
use crate::event_store::AggregateStore;

use super::{SagaError, MAX_COMMAND_ATTEMPTS};

/// Reason recorded on positions closed because their order failed
const ORDER_FAILED_REASON: &str = "order_failed";

/// Compensation commands shared by the saga steps
#[derive(Clone)]
pub struct Compensations {
    store: AggregateStore,
}

impl Compensations {
    pub fn new(store: AggregateStore) -> Self {
        Self { store }
    }

    /// Fail the order with the given reason. Idempotent: an already failed
    /// order is left untouched.
    pub async fn order_failed(&self, order_id: Uuid, reason: &str) -> Result<(), SagaError> {
        for attempt in 0..MAX_COMMAND_ATTEMPTS {
            let mut order: Order = self.store.load(order_id).await?;
            order.fail(reason)?;
            match self.store.save(&mut order).await {
                Ok(_) => {
                    tracing::info!(%order_id, reason, "Order failed by compensation");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_COMMAND_ATTEMPTS => {
                    tracing::warn!(%order_id, attempt, "Conflict failing order, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SagaError::ConflictRetriesExhausted(MAX_COMMAND_ATTEMPTS))
    }

    /// Fail the order and close its position. Both halves are idempotent.
    pub async fn swap_failed(
        &self,
        order_id: Uuid,
        position_id: Uuid,
        reason: &str,
    ) -> Result<(), SagaError> {
        self.order_failed(order_id, reason).await?;

        for attempt in 0..MAX_COMMAND_ATTEMPTS {
            let mut position: Position = self.store.load(position_id).await?;
            position.close(ORDER_FAILED_REASON)?;
            match self.store.save(&mut position).await {
                Ok(_) => {
                    tracing::info!(%order_id, %position_id, "Position closed by compensation");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_COMMAND_ATTEMPTS => {
                    tracing::warn!(%position_id, attempt, "Conflict closing position, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SagaError::ConflictRetriesExhausted(MAX_COMMAND_ATTEMPTS))
    }
}
