//! Saga step 3: `PositionCreatedForOrder` → `SwapExecuted`
//!
//! Records the intent to execute in the log, calls the swap worker, then
//! records the result. This is the slowest step (multi-second) and the
//! scaling bottleneck; several copies of this handler may drain the queue
//! in parallel.
//!
//! The swap call is protected by a deterministic idempotency key derived
//! from the order id, so redelivery after a crash at any point re-issues
//! the same swap rather than a second one.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, OrderStatus, SwapOutcome};
use crate::bus::{EventHandler, EventPublisher};
use crate::domain::{DomainEvent, EventEnvelope, EventMetadata, OrderEvent};
use crate::event_store::AggregateStore;
use crate::idempotency::ProcessedEventRepository;
use crate::services::{SwapRequest, SwapWorker};

use super::{Compensations, SagaError, MAX_COMMAND_ATTEMPTS};

const PROCESSOR: &str = "saga.execute_swap";

/// Maximum tolerated slippage fraction passed to the swap worker
fn slippage_tolerance() -> Decimal {
    Decimal::new(5, 3) // 0.005
}

pub struct ExecuteSwapStep {
    store: AggregateStore,
    processed: ProcessedEventRepository,
    swap_worker: Arc<dyn SwapWorker>,
    publisher: Arc<dyn EventPublisher>,
    compensations: Compensations,
}

impl ExecuteSwapStep {
    pub fn new(
        store: AggregateStore,
        processed: ProcessedEventRepository,
        swap_worker: Arc<dyn SwapWorker>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let compensations = Compensations::new(store.clone());
        Self {
            store,
            processed,
            swap_worker,
            publisher,
            compensations,
        }
    }

    pub async fn process(&self, envelope: &EventEnvelope) -> Result<(), SagaError> {
        if self.processed.is_processed(envelope.event_id).await? {
            tracing::debug!(event_id = %envelope.event_id, "Already processed, skipping");
            return Ok(());
        }

        let order_id = envelope.aggregate_id;
        let Some(position_id) = envelope.metadata.position_id() else {
            // Without the correlation there is nothing to compensate against;
            // this indicates a malformed producer, not a transient fault.
            tracing::error!(
                event_id = %envelope.event_id,
                %order_id,
                "Coordination event missing position_id metadata, discarding"
            );
            return self.mark(envelope).await;
        };

        let order: Order = self.store.load(order_id).await?;
        match order.status() {
            OrderStatus::Completed => {
                tracing::debug!(%order_id, "Order already completed");
                return self.mark(envelope).await;
            }
            OrderStatus::Failed => {
                // Order was compensated elsewhere; make sure the position is too
                self.compensations
                    .swap_failed(order_id, position_id, "order_already_failed")
                    .await?;
                return self.mark(envelope).await;
            }
            OrderStatus::Pending => {
                self.record_intent(order_id).await?;
            }
            OrderStatus::Executing => {
                // Intent already in the log from an interrupted attempt
                tracing::debug!(%order_id, "Swap intent already recorded");
            }
        }

        let request = SwapRequest {
            idempotency_key: swap_idempotency_key(order_id),
            from_currency: order.from_currency().to_string(),
            to_currency: order.to_currency().to_string(),
            from_amount: order.from_amount(),
            slippage: slippage_tolerance(),
        };

        let result = match self.swap_worker.execute_swap(request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%order_id, %position_id, error = %e, "Swap failed, compensating");
                self.compensations
                    .swap_failed(order_id, position_id, &e.to_string())
                    .await?;
                return self.mark(envelope).await;
            }
        };

        let recorded = self
            .record_result(order_id, position_id, order.from_amount(), &result)
            .await?;
        let coordination = swap_executed_envelope(order_id, position_id, &recorded)?;
        self.publisher.publish_envelope(&coordination).await?;
        tracing::info!(%order_id, %position_id, tx_hash = %result.tx_hash, "Swap executed");

        self.mark(envelope).await
    }

    /// Record `SwapExecuting` in the log before calling the worker
    async fn record_intent(&self, order_id: Uuid) -> Result<(), SagaError> {
        for attempt in 0..MAX_COMMAND_ATTEMPTS {
            let mut order: Order = self.store.load(order_id).await?;
            if order.status() != OrderStatus::Pending {
                return Ok(());
            }
            order.start_swap_execution(swap_idempotency_key(order_id))?;
            match self.store.save(&mut order).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_COMMAND_ATTEMPTS => {
                    tracing::warn!(%order_id, attempt, "Conflict recording swap intent, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SagaError::ConflictRetriesExhausted(MAX_COMMAND_ATTEMPTS))
    }

    /// Record `SwapExecuted` in the log, threading the position correlation
    /// through event metadata. Returns the recorded event payload.
    async fn record_result(
        &self,
        order_id: Uuid,
        position_id: Uuid,
        from_amount: Decimal,
        result: &crate::services::SwapResult,
    ) -> Result<OrderEvent, SagaError> {
        for attempt in 0..MAX_COMMAND_ATTEMPTS {
            let mut order: Order = self.store.load(order_id).await?;
            if order.tx_hash().is_some() {
                // Result already recorded by an earlier, interrupted attempt
                break;
            }
            order.record_swap_execution(
                SwapOutcome {
                    tx_hash: result.tx_hash.clone(),
                    from_amount: order.from_amount(),
                    to_amount: result.to_amount,
                    executed_price: result.executed_price,
                    fees: result.fees,
                    slippage: result.slippage,
                },
                EventMetadata::new().with_position_id(position_id),
            )?;
            match self.store.save(&mut order).await {
                Ok(_) => break,
                Err(e) if e.is_retryable() && attempt + 1 < MAX_COMMAND_ATTEMPTS => {
                    tracing::warn!(%order_id, attempt, "Conflict recording swap result, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(OrderEvent::SwapExecuted {
            order_id,
            tx_hash: result.tx_hash.clone(),
            from_amount,
            to_amount: result.to_amount,
            executed_price: result.executed_price,
            fees: result.fees,
            slippage: result.slippage,
            executed_at: chrono::Utc::now(),
        })
    }

    async fn mark(&self, envelope: &EventEnvelope) -> Result<(), SagaError> {
        self.processed
            .mark_processed(
                envelope.event_id,
                envelope.aggregate_id,
                &envelope.event_type,
                PROCESSOR,
            )
            .await?;
        Ok(())
    }
}

/// Deterministic swap idempotency key for an order
pub fn swap_idempotency_key(order_id: Uuid) -> String {
    format!("swap-{order_id}")
}

/// Build the synthetic `SwapExecuted` coordination envelope
fn swap_executed_envelope(
    order_id: Uuid,
    position_id: Uuid,
    event: &OrderEvent,
) -> Result<EventEnvelope, serde_json::Error> {
    Ok(EventEnvelope::coordination(
        order_id,
        Order::aggregate_type(),
        event.event_type(),
        EventMetadata::new().with_position_id(position_id),
        serde_json::to_value(event)?,
    ))
}

#[async_trait]
impl EventHandler for ExecuteSwapStep {
    fn name(&self) -> &'static str {
        PROCESSOR
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        Ok(self.process(envelope).await?)
    }
}
