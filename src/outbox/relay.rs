//! Outbox Relay
//!
//! Background loop that polls the outbox for unpublished rows and publishes
//! them to the message bus. A crash between publish and mark republished
//! the row on the next cycle, so consumers must deduplicate.

use std::time::Duration;

use tokio::sync::watch;

use crate::bus::{BusError, MessageBus};

use super::{OutboxError, OutboxRepository};

/// Errors that can occur while relaying a batch
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Background worker publishing committed events to the bus
pub struct OutboxRelay {
    outbox: OutboxRepository,
    bus: MessageBus,
    interval: Duration,
    batch_size: i64,
}

impl OutboxRelay {
    /// Create a new relay
    pub fn new(
        outbox: OutboxRepository,
        bus: MessageBus,
        interval: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            outbox,
            bus,
            interval,
            batch_size,
        }
    }

    /// Run the polling loop until shutdown
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Outbox relay started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("Outbox relay shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_batch().await {
                        tracing::error!(error = %e, "Outbox batch failed");
                    }
                }
            }
        }
    }

    /// Publish one batch of unpublished rows in commit order.
    ///
    /// Rows are marked published only after broker acknowledgement; a
    /// failed publish aborts the batch so the remaining rows keep their
    /// order on the next cycle.
    async fn publish_batch(&self) -> Result<usize, RelayError> {
        let rows = self.outbox.fetch_unpublished(self.batch_size).await?;
        let mut published = 0;

        for row in rows {
            let body = serde_json::to_vec(&row.event_data)?;
            self.bus.publish(&row.event_type, &body).await?;
            self.outbox.mark_published(row.event_id).await?;
            published += 1;
        }

        if published > 0 {
            tracing::debug!(published, "Published outbox batch");
        }
        Ok(published)
    }
}
