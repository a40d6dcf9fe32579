//! Saga step 1: `OrderAccepted` → `PriceQuoted`
//!
//! Fetches the market price for the order pair and records the quote. A
//! price-service failure fails the order via compensation; the user gets a
//! terminal `OrderFailed` rather than an order stuck in pending.

use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregate::Order;
use crate::bus::EventHandler;
use crate::domain::{EventEnvelope, OrderType};
use crate::event_store::AggregateStore;
use crate::idempotency::ProcessedEventRepository;
use crate::services::PriceService;

use super::{Compensations, SagaError, MAX_COMMAND_ATTEMPTS};

const PROCESSOR: &str = "saga.quote_price";

/// Decimal places quoted target amounts are rounded to
const QUOTE_SCALE: u32 = 8;

pub struct QuotePriceStep {
    store: AggregateStore,
    processed: ProcessedEventRepository,
    price_service: Arc<dyn PriceService>,
    compensations: Compensations,
}

impl QuotePriceStep {
    pub fn new(
        store: AggregateStore,
        processed: ProcessedEventRepository,
        price_service: Arc<dyn PriceService>,
    ) -> Self {
        let compensations = Compensations::new(store.clone());
        Self {
            store,
            processed,
            price_service,
            compensations,
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
        if order.order_type() == OrderType::Limit {
            // Limit orders are priced by the matching book, not the market saga
            tracing::debug!(%order_id, "Limit order, skipping market quote");
            return self.mark(envelope).await;
        }

        let price = match self
            .price_service
            .get_market_price(order.from_currency(), order.to_currency())
            .await
        {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "Price fetch failed, compensating");
                self.compensations
                    .order_failed(order_id, "price_unavailable")
                    .await?;
                return self.mark(envelope).await;
            }
        };

        for attempt in 0..MAX_COMMAND_ATTEMPTS {
            let mut order: Order = self.store.load(order_id).await?;
            if order.to_amount().is_some() {
                // Quote already recorded by an earlier, interrupted attempt
                break;
            }
            let to_amount = (order.from_amount() / price).round_dp(QUOTE_SCALE);
            order.quote_price(price, to_amount)?;
            match self.store.save(&mut order).await {
                Ok(_) => {
                    tracing::info!(%order_id, %price, %to_amount, "Price quoted");
                    break;
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_COMMAND_ATTEMPTS => {
                    tracing::warn!(%order_id, attempt, "Conflict quoting price, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

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
impl EventHandler for QuotePriceStep {
    fn name(&self) -> &'static str {
        PROCESSOR
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        Ok(self.process(envelope).await?)
    }
}
