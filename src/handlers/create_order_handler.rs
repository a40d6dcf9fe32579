//! Create Order Handler
//!
//! Accepts a swap order for asynchronous execution. The handler returns
//! only after the `OrderAccepted` event has durably committed; everything
//! downstream is driven by the saga.

use std::str::FromStr;
use uuid::Uuid;

use crate::aggregate::Order;
use crate::domain::Amount;
use crate::error::AppError;
use crate::event_store::AggregateStore;

use super::{CreateOrderCommand, CreateOrderResult};

/// Handler for order creation
#[derive(Clone)]
pub struct CreateOrderHandler {
    store: AggregateStore,
}

impl CreateOrderHandler {
    pub fn new(store: AggregateStore) -> Self {
        Self { store }
    }

    /// Execute the create-order command
    pub async fn execute(&self, command: CreateOrderCommand) -> Result<CreateOrderResult, AppError> {
        let amount = Amount::from_str(&command.from_amount)
            .map_err(|e| AppError::InvalidRequest(format!("Invalid from_amount: {e}")))?;

        let order_id = Uuid::new_v4();
        let mut order = Order::accept(
            order_id,
            command.user_id,
            amount.value(),
            command.from_currency,
            command.to_currency,
            command.order_type,
        )?;

        self.store.save(&mut order).await?;
        tracing::info!(%order_id, user_id = %command.user_id, "Order accepted");

        Ok(CreateOrderResult {
            order_id,
            status: order.status(),
        })
    }
}
