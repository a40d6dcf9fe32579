//! Domain Events
//!
//! Event definitions for Event Sourcing. Events are immutable facts that
//! have happened in the system; aggregate state is derived from them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Behavior shared by all persisted event families.
///
/// The event store keys rows by the `event_type` string, so each variant
/// must map to a stable name.
pub trait DomainEvent: Clone + Serialize + DeserializeOwned {
    /// Get the event type as a string
    fn event_type(&self) -> &'static str;
}

/// Order side of the swap: market executes at the quoted price, limit
/// executes when the book crosses the limit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

/// Recognized options for the UpdateOrder command.
///
/// Unknown fields are rejected at the decoding boundary rather than being
/// carried along as an opaque map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount: Option<Decimal>,
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.from_amount.is_none() && self.to_amount.is_none()
    }
}

/// Order-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// Order was durably accepted for asynchronous execution
    OrderAccepted {
        order_id: Uuid,
        user_id: Uuid,
        from_amount: Decimal,
        from_currency: String,
        to_currency: String,
        order_type: OrderType,
        accepted_at: DateTime<Utc>,
    },

    /// Order bookkeeping was initialized
    OrderInitialized {
        order_id: Uuid,
        initialized_at: DateTime<Utc>,
    },

    /// User balance covers the order amount
    BalanceCheckPassed {
        order_id: Uuid,
        available: Decimal,
        checked_at: DateTime<Utc>,
    },

    /// User balance does not cover the order amount
    BalanceCheckFailed {
        order_id: Uuid,
        available: Decimal,
        required: Decimal,
        checked_at: DateTime<Utc>,
    },

    /// Market price was quoted for the order
    PriceQuoted {
        order_id: Uuid,
        price: Decimal,
        to_amount: Decimal,
        quoted_at: DateTime<Utc>,
    },

    /// Limit price was attached to a limit order
    LimitPriceSet {
        order_id: Uuid,
        limit_price: Decimal,
        set_at: DateTime<Utc>,
    },

    /// Limit order was handed to the matching book
    OrderPlacedInBook {
        order_id: Uuid,
        book: String,
        placed_at: DateTime<Utc>,
    },

    /// On-chain swap execution was started
    SwapExecuting {
        order_id: Uuid,
        idempotency_key: String,
        started_at: DateTime<Utc>,
    },

    /// On-chain swap completed and its result was recorded
    SwapExecuted {
        order_id: Uuid,
        tx_hash: String,
        from_amount: Decimal,
        to_amount: Decimal,
        executed_price: Decimal,
        fees: Decimal,
        slippage: Decimal,
        executed_at: DateTime<Utc>,
    },

    /// Part of a limit order was matched and filled
    OrderPartiallyFilled {
        order_id: Uuid,
        filled_amount: Decimal,
        price: Decimal,
        tx_hash: String,
        filled_at: DateTime<Utc>,
    },

    /// Order reached its terminal success state
    OrderCompleted {
        order_id: Uuid,
        completed_at: DateTime<Utc>,
    },

    /// Order reached its terminal failure state
    OrderFailed {
        order_id: Uuid,
        reason: String,
        failed_at: DateTime<Utc>,
    },

    /// Pending order was cancelled by the user
    OrderCancelled {
        order_id: Uuid,
        reason: String,
        cancelled_at: DateTime<Utc>,
    },

    /// Recognized order attributes were changed
    OrderUpdated {
        order_id: Uuid,
        changes: OrderChanges,
        updated_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    /// Get the order ID this event relates to
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::OrderAccepted { order_id, .. }
            | OrderEvent::OrderInitialized { order_id, .. }
            | OrderEvent::BalanceCheckPassed { order_id, .. }
            | OrderEvent::BalanceCheckFailed { order_id, .. }
            | OrderEvent::PriceQuoted { order_id, .. }
            | OrderEvent::LimitPriceSet { order_id, .. }
            | OrderEvent::OrderPlacedInBook { order_id, .. }
            | OrderEvent::SwapExecuting { order_id, .. }
            | OrderEvent::SwapExecuted { order_id, .. }
            | OrderEvent::OrderPartiallyFilled { order_id, .. }
            | OrderEvent::OrderCompleted { order_id, .. }
            | OrderEvent::OrderFailed { order_id, .. }
            | OrderEvent::OrderCancelled { order_id, .. }
            | OrderEvent::OrderUpdated { order_id, .. } => *order_id,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderAccepted { .. } => "OrderAccepted",
            OrderEvent::OrderInitialized { .. } => "OrderInitialized",
            OrderEvent::BalanceCheckPassed { .. } => "BalanceCheckPassed",
            OrderEvent::BalanceCheckFailed { .. } => "BalanceCheckFailed",
            OrderEvent::PriceQuoted { .. } => "PriceQuoted",
            OrderEvent::LimitPriceSet { .. } => "LimitPriceSet",
            OrderEvent::OrderPlacedInBook { .. } => "OrderPlacedInBook",
            OrderEvent::SwapExecuting { .. } => "SwapExecuting",
            OrderEvent::SwapExecuted { .. } => "SwapExecuted",
            OrderEvent::OrderPartiallyFilled { .. } => "OrderPartiallyFilled",
            OrderEvent::OrderCompleted { .. } => "OrderCompleted",
            OrderEvent::OrderFailed { .. } => "OrderFailed",
            OrderEvent::OrderCancelled { .. } => "OrderCancelled",
            OrderEvent::OrderUpdated { .. } => "OrderUpdated",
        }
    }
}

/// Position-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PositionEvent {
    /// Position was opened for a user
    PositionCreated {
        position_id: Uuid,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    },

    /// A completed order was attached to the position
    PositionUpdated {
        position_id: Uuid,
        order_id: Uuid,
        to_amount: Decimal,
        value: Decimal,
        pnl: Decimal,
        updated_at: DateTime<Utc>,
    },

    /// Position reached its terminal state
    PositionClosed {
        position_id: Uuid,
        reason: String,
        closed_at: DateTime<Utc>,
    },
}

impl PositionEvent {
    /// Get the position ID this event relates to
    pub fn position_id(&self) -> Uuid {
        match self {
            PositionEvent::PositionCreated { position_id, .. }
            | PositionEvent::PositionUpdated { position_id, .. }
            | PositionEvent::PositionClosed { position_id, .. } => *position_id,
        }
    }
}

impl DomainEvent for PositionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PositionEvent::PositionCreated { .. } => "PositionCreated",
            PositionEvent::PositionUpdated { .. } => "PositionUpdated",
            PositionEvent::PositionClosed { .. } => "PositionClosed",
        }
    }
}
