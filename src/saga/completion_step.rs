//! Saga step 4: `SwapExecuted` → `PositionLinkedToOrder`
//!
//! Invokes the atomic completion use case. No compensation path exists at
//! this point: the on-chain swap has occurred and is irreversible, so any
//! failure surfaces to the broker for redelivery and the step keeps
//! retrying until it lands.

use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregate::{Aggregate, Order};
use crate::bus::{EventHandler, EventPublisher};
use crate::domain::{EventEnvelope, EventMetadata};
use crate::event_store::AggregateStore;
use crate::idempotency::ProcessedEventRepository;

use super::{CompleteOrder, SagaError, POSITION_LINKED_TO_ORDER};

const PROCESSOR: &str = "saga.complete_order";

pub struct CompleteOrderStep {
    processed: ProcessedEventRepository,
    complete_order: CompleteOrder,
    publisher: Arc<dyn EventPublisher>,
}

impl CompleteOrderStep {
    pub fn new(
        store: AggregateStore,
        processed: ProcessedEventRepository,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            processed,
            complete_order: CompleteOrder::new(store),
            publisher,
        }
    }

    pub async fn process(&self, envelope: &EventEnvelope) -> Result<(), SagaError> {
        if self.processed.is_processed(envelope.event_id).await? {
            tracing::debug!(event_id = %envelope.event_id, "Already processed, skipping");
            return Ok(());
        }

        let order_id = envelope.aggregate_id;
        let Some(position_id) = envelope.metadata.position_id() else {
            // An executed swap with no correlation cannot be linked; this is
            // a producer defect that redelivery cannot fix.
            tracing::error!(
                event_id = %envelope.event_id,
                %order_id,
                "SwapExecuted event missing position_id metadata, discarding"
            );
            return self.mark(envelope).await;
        };

        // Errors below (including exhausted conflict retries) surface to the
        // broker; the swap is irreversible, so this event is never dropped.
        self.complete_order.execute(order_id, position_id).await?;

        let coordination = EventEnvelope::coordination(
            order_id,
            Order::aggregate_type(),
            POSITION_LINKED_TO_ORDER,
            EventMetadata::new().with_position_id(position_id),
            serde_json::json!({
                "order_id": order_id,
                "position_id": position_id,
            }),
        );
        self.publisher.publish_envelope(&coordination).await?;

        self.mark(envelope).await
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

#[async_trait]
impl EventHandler for CompleteOrderStep {
    fn name(&self) -> &'static str {
        PROCESSOR
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        Ok(self.process(envelope).await?)
    }
}
