//! Cancel Order Handler
//!
//! Cancels a pending order. Orders that have started executing can no
//! longer be cancelled; the saga either completes or compensates them.

use crate::aggregate::Order;
use crate::error::AppError;
use crate::event_store::AggregateStore;

use super::CancelOrderCommand;

/// Handler for order cancellation
#[derive(Clone)]
pub struct CancelOrderHandler {
    store: AggregateStore,
}

impl CancelOrderHandler {
    pub fn new(store: AggregateStore) -> Self {
        Self { store }
    }

    /// Execute the cancel-order command
    pub async fn execute(&self, command: CancelOrderCommand) -> Result<(), AppError> {
        let mut order: Order = self.store.load(command.order_id).await?;
        order.cancel(command.reason)?;
        self.store.save(&mut order).await?;
        tracing::info!(order_id = %command.order_id, "Order cancelled");
        Ok(())
    }
}
