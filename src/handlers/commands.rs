//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::OrderStatus;
use crate::domain::OrderType;

/// Command to create a new swap order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderCommand {
    pub user_id: Uuid,
    /// Amount in the source currency (as string for precise decimal)
    pub from_amount: String,
    pub from_currency: String,
    pub to_currency: String,
    pub order_type: OrderType,
}

impl CreateOrderCommand {
    pub fn new(
        user_id: Uuid,
        from_amount: String,
        from_currency: String,
        to_currency: String,
        order_type: OrderType,
    ) -> Self {
        Self {
            user_id,
            from_amount,
            from_currency,
            to_currency,
            order_type,
        }
    }
}

/// Command to cancel a pending order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
    pub reason: String,
}

/// Result of a durably accepted order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResult {
    pub order_id: Uuid,
    pub status: OrderStatus,
}
