//! Message bus adapter
//!
//! Topic-exchange semantics over AMQP: producers publish with the event
//! type as routing key, consumers bind durable per-subscription queues to
//! the routing keys they care about. Delivery is at-least-once with manual
//! acknowledgement; handler failures negative-ack with requeue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tokio::sync::watch;

use crate::domain::EventEnvelope;

/// Topic exchange all events are published to
pub const EVENTS_EXCHANGE: &str = "events";

/// Pause after a negative-ack so a permanently failing handler does not
/// busy-loop on its own requeued message.
const REDELIVERY_PAUSE: Duration = Duration::from_millis(1000);

/// Queue naming convention for per-subscription queues
pub fn queue_name(subscription: &str) -> String {
    format!("queue.{subscription}")
}

/// Errors that can occur in the bus adapter
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Message bus error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Message bus unavailable after {0} attempts")]
    Unavailable(u32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A consumer-side event handler.
///
/// Returning an error requeues the delivery; side-effects must therefore
/// be idempotent.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable consumer name, recorded in the processed-event set
    fn name(&self) -> &'static str;

    /// Handle one delivered envelope
    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

/// Producer-side seam for publishing coordination envelopes.
///
/// Saga steps publish through this trait so the transport can be swapped
/// out under test.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an envelope with its event type as routing key
    async fn publish_envelope(&self, envelope: &EventEnvelope) -> Result<(), BusError>;
}

/// Connection to the AMQP broker with a dedicated publish channel
#[derive(Clone)]
pub struct MessageBus {
    connection: Arc<Connection>,
    publish_channel: Channel,
}

impl MessageBus {
    /// Connect to the broker with bounded retry and declare the topic
    /// exchange.
    pub async fn connect(
        url: &str,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self, BusError> {
        let mut attempt = 0;
        let connection = loop {
            attempt += 1;
            match Connection::connect(url, ConnectionProperties::default()).await {
                Ok(connection) => break connection,
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        "Message bus connection failed, retrying"
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt, "Message bus connection failed");
                    return Err(BusError::Unavailable(max_attempts));
                }
            }
        };

        let publish_channel = connection.create_channel().await?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        publish_channel
            .exchange_declare(
                EVENTS_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            connection: Arc::new(connection),
            publish_channel,
        })
    }

    /// Publish a message with persistent delivery and await broker
    /// confirmation.
    pub async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<(), BusError> {
        self.publish_channel
            .basic_publish(
                EVENTS_EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Declare a durable queue bound to the given routing keys and start
    /// consuming with manual acknowledgement.
    pub async fn subscribe(
        &self,
        queue: &str,
        routing_keys: &[&str],
    ) -> Result<Consumer, BusError> {
        let channel = self.connection.create_channel().await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        for routing_key in routing_keys {
            channel
                .queue_bind(
                    queue,
                    EVENTS_EXCHANGE,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        let consumer = channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(consumer)
    }
}

#[async_trait]
impl EventPublisher for MessageBus {
    async fn publish_envelope(&self, envelope: &EventEnvelope) -> Result<(), BusError> {
        let body = serde_json::to_vec(envelope)?;
        self.publish(&envelope.event_type, &body).await
    }
}

/// Drive a consumer until shutdown, dispatching deliveries to the handler.
///
/// Handler success acks; handler failure nacks with requeue. Undecodable
/// bodies are logged and acked so a poison message cannot requeue forever.
pub async fn run_consumer(
    mut consumer: Consumer,
    handler: Arc<dyn EventHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(handler = handler.name(), "Consumer started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!(handler = handler.name(), "Consumer shutting down");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => process_delivery(delivery, handler.as_ref()).await,
                    Some(Err(e)) => {
                        tracing::error!(handler = handler.name(), error = %e, "Consume error");
                    }
                    None => {
                        tracing::warn!(handler = handler.name(), "Consumer stream closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn process_delivery(delivery: Delivery, handler: &dyn EventHandler) {
    let envelope: EventEnvelope = match serde_json::from_slice(&delivery.data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(
                handler = handler.name(),
                error = %e,
                "Discarding undecodable message"
            );
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                tracing::error!(error = %e, "Failed to ack discarded message");
            }
            return;
        }
    };

    match handler.handle(&envelope).await {
        Ok(()) => {
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                tracing::error!(
                    handler = handler.name(),
                    event_id = %envelope.event_id,
                    error = %e,
                    "Failed to ack delivery"
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                handler = handler.name(),
                event_id = %envelope.event_id,
                event_type = %envelope.event_type,
                error = %e,
                "Handler failed, requeueing"
            );
            if let Err(e) = delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
            {
                tracing::error!(error = %e, "Failed to nack delivery");
            }
            tokio::time::sleep(REDELIVERY_PAUSE).await;
        }
    }
}
