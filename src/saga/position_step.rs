//! Saga step 2: `PriceQuoted` → `PositionCreatedForOrder`
//!
//! Mints a position for the order's user and announces it with a synthetic
//! coordination event. The next step operates on the order stream but must
//! know the position id; the payload and metadata are the correlation
//! channel.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, Position};
use crate::bus::{EventHandler, EventPublisher};
use crate::domain::{EventEnvelope, EventMetadata};
use crate::event_store::AggregateStore;
use crate::idempotency::ProcessedEventRepository;

use super::{SagaError, POSITION_CREATED_FOR_ORDER};

const PROCESSOR: &str = "saga.open_position";

pub struct OpenPositionStep {
    store: AggregateStore,
    processed: ProcessedEventRepository,
    publisher: Arc<dyn EventPublisher>,
}

impl OpenPositionStep {
    pub fn new(
        store: AggregateStore,
        processed: ProcessedEventRepository,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            processed,
            publisher,
        }
    }

    pub async fn process(&self, envelope: &EventEnvelope) -> Result<(), SagaError> {
        if self.processed.is_processed(envelope.event_id).await? {
            tracing::debug!(event_id = %envelope.event_id, "Already processed, skipping");
            return Ok(());
        }

        let order_id = envelope.aggregate_id;
        let order: Order = self.store.load(order_id).await?;

        if order.is_terminal() {
            tracing::debug!(%order_id, status = %order.status(), "Order already terminal");
            return self.mark(envelope).await;
        }

        let position_id = Uuid::new_v4();
        let mut position = Position::open(position_id, order.user_id());
        self.store.save(&mut position).await?;
        tracing::info!(%order_id, %position_id, "Position created for order");

        let coordination = EventEnvelope::coordination(
            order_id,
            Order::aggregate_type(),
            POSITION_CREATED_FOR_ORDER,
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
impl EventHandler for OpenPositionStep {
    fn name(&self) -> &'static str {
        PROCESSOR
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        Ok(self.process(envelope).await?)
    }
}
