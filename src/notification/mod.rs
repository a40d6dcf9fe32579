//! Notification subscriber
//!
//! Consumes terminal order events and emits user-facing notifications.
//! Delivery channels (email, push) are external collaborators; this module
//! is the template every idempotent external subscriber follows: check the
//! processed-event set, perform the side-effect, mark processed.

use async_trait::async_trait;

use crate::bus::EventHandler;
use crate::domain::{DomainEvent, EventEnvelope, OrderEvent};
use crate::idempotency::ProcessedEventRepository;
use crate::saga::SagaError;

const PROCESSOR: &str = "notifications";

/// Routing keys this subscriber binds its queue to
pub const TERMINAL_EVENT_TYPES: [&str; 3] = ["OrderCompleted", "OrderFailed", "OrderCancelled"];

/// Subscription name used for the durable queue
pub const SUBSCRIPTION: &str = "notifications";

pub struct NotificationSubscriber {
    processed: ProcessedEventRepository,
}

impl NotificationSubscriber {
    pub fn new(processed: ProcessedEventRepository) -> Self {
        Self { processed }
    }

    pub async fn process(&self, envelope: &EventEnvelope) -> Result<(), SagaError> {
        if self.processed.is_processed(envelope.event_id).await? {
            tracing::debug!(event_id = %envelope.event_id, "Already processed, skipping");
            return Ok(());
        }

        match envelope.decode_payload::<OrderEvent>() {
            Ok(OrderEvent::OrderCompleted { order_id, .. }) => {
                tracing::info!(%order_id, "Notify: order completed");
            }
            Ok(OrderEvent::OrderFailed { order_id, reason, .. }) => {
                tracing::info!(%order_id, reason, "Notify: order failed");
            }
            Ok(OrderEvent::OrderCancelled { order_id, reason, .. }) => {
                tracing::info!(%order_id, reason, "Notify: order cancelled");
            }
            Ok(other) => {
                tracing::debug!(
                    event_type = %envelope.event_type,
                    ignored = other.event_type(),
                    "Non-terminal event on notification queue"
                );
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    error = %e,
                    "Undecodable notification payload"
                );
            }
        }

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
impl EventHandler for NotificationSubscriber {
    fn name(&self) -> &'static str {
        PROCESSOR
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        Ok(self.process(envelope).await?)
    }
}
