//! Order Aggregate
//!
//! An order tracks one user-initiated currency swap from acceptance to its
//! terminal state. State is derived from events, never directly mutated;
//! command methods validate business rules and emit events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, EventMetadata, OrderChanges, OrderEvent, OrderType};

use super::{Aggregate, PendingEvent};

/// Minimum order size in the source currency
const MIN_ORDER_AMOUNT: i64 = 10;

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Executing => write!(f, "executing"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of an executed swap, as reported by the swap worker
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub tx_hash: String,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub executed_price: Decimal,
    pub fees: Decimal,
    pub slippage: Decimal,
}

/// Order Aggregate
#[derive(Debug, Clone)]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    from_amount: Decimal,
    from_currency: String,
    to_currency: String,
    to_amount: Option<Decimal>,
    executed_price: Option<Decimal>,
    limit_price: Option<Decimal>,
    tx_hash: Option<String>,
    fees: Option<Decimal>,
    slippage: Option<Decimal>,
    filled_amount: Decimal,
    swap_idempotency_key: Option<String>,
    order_type: OrderType,
    status: OrderStatus,
    version: i64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    uncommitted: Vec<PendingEvent<OrderEvent>>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            from_amount: Decimal::ZERO,
            from_currency: String::new(),
            to_currency: String::new(),
            to_amount: None,
            executed_price: None,
            limit_price: None,
            tx_hash: None,
            fees: None,
            slippage: None,
            filled_amount: Decimal::ZERO,
            swap_idempotency_key: None,
            order_type: OrderType::Market,
            status: OrderStatus::Pending,
            version: 0,
            created_at: None,
            updated_at: None,
            uncommitted: Vec::new(),
        }
    }
}

impl Order {
    /// Accept a new order for asynchronous execution.
    ///
    /// # Errors
    /// `DomainError::Validation` if the amount is not positive or is below
    /// the minimum order size.
    pub fn accept(
        order_id: Uuid,
        user_id: Uuid,
        from_amount: Decimal,
        from_currency: String,
        to_currency: String,
        order_type: OrderType,
    ) -> Result<Self, DomainError> {
        if from_amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "from_amount must be positive (got {from_amount})"
            )));
        }
        if from_amount < Decimal::from(MIN_ORDER_AMOUNT) {
            return Err(DomainError::validation(format!(
                "from_amount {from_amount} is below the minimum of {MIN_ORDER_AMOUNT}"
            )));
        }
        if from_currency.is_empty() || to_currency.is_empty() {
            return Err(DomainError::validation("currency must not be empty"));
        }
        if from_currency == to_currency {
            return Err(DomainError::validation(
                "from_currency and to_currency must differ",
            ));
        }

        let mut order = Self::default();
        order.apply(OrderEvent::OrderAccepted {
            order_id,
            user_id,
            from_amount,
            from_currency,
            to_currency,
            order_type,
            accepted_at: Utc::now(),
        });
        Ok(order)
    }

    /// Initialize order bookkeeping
    pub fn initialize(&mut self) -> Result<(), DomainError> {
        self.require_pending("InitializeOrder")?;
        self.apply(OrderEvent::OrderInitialized {
            order_id: self.id,
            initialized_at: Utc::now(),
        });
        Ok(())
    }

    /// Check that the user's balance covers the order amount
    pub fn check_balances(&mut self, available: Decimal) -> Result<(), DomainError> {
        self.require_pending("CheckBalances")?;
        let event = if available >= self.from_amount {
            OrderEvent::BalanceCheckPassed {
                order_id: self.id,
                available,
                checked_at: Utc::now(),
            }
        } else {
            OrderEvent::BalanceCheckFailed {
                order_id: self.id,
                available,
                required: self.from_amount,
                checked_at: Utc::now(),
            }
        };
        self.apply(event);
        Ok(())
    }

    /// Record a market price quote for the order
    pub fn quote_price(&mut self, price: Decimal, to_amount: Decimal) -> Result<(), DomainError> {
        self.require_pending("QuotePrice")?;
        if price <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "price must be positive (got {price})"
            )));
        }
        if to_amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "to_amount must be positive (got {to_amount})"
            )));
        }
        self.apply(OrderEvent::PriceQuoted {
            order_id: self.id,
            price,
            to_amount,
            quoted_at: Utc::now(),
        });
        Ok(())
    }

    /// Attach a limit price; limit orders only
    pub fn set_limit_price(&mut self, limit_price: Decimal) -> Result<(), DomainError> {
        self.require_pending("SetLimitPrice")?;
        self.require_limit("SetLimitPrice")?;
        if limit_price <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "limit_price must be positive (got {limit_price})"
            )));
        }
        self.apply(OrderEvent::LimitPriceSet {
            order_id: self.id,
            limit_price,
            set_at: Utc::now(),
        });
        Ok(())
    }

    /// Hand a limit order to the matching book
    pub fn place_in_order_book(&mut self, book: &str) -> Result<(), DomainError> {
        self.require_pending("PlaceInOrderBook")?;
        self.require_limit("PlaceInOrderBook")?;
        if book.is_empty() {
            return Err(DomainError::validation("book must not be empty"));
        }
        self.apply(OrderEvent::OrderPlacedInBook {
            order_id: self.id,
            book: book.to_string(),
            placed_at: Utc::now(),
        });
        Ok(())
    }

    /// Record the intent to execute the swap, moving the order to executing
    pub fn start_swap_execution(&mut self, idempotency_key: String) -> Result<(), DomainError> {
        self.require_pending("StartSwapExecution")?;
        self.apply(OrderEvent::SwapExecuting {
            order_id: self.id,
            idempotency_key,
            started_at: Utc::now(),
        });
        Ok(())
    }

    /// Record the result of an executed swap.
    ///
    /// The event carries the position correlation in its metadata so
    /// downstream subscribers can link the position without shared state.
    pub fn record_swap_execution(
        &mut self,
        outcome: SwapOutcome,
        metadata: EventMetadata,
    ) -> Result<(), DomainError> {
        if self.status != OrderStatus::Executing {
            return Err(DomainError::invalid_transition(
                "RecordSwapExecution",
                self.status,
            ));
        }
        self.apply_with_metadata(
            OrderEvent::SwapExecuted {
                order_id: self.id,
                tx_hash: outcome.tx_hash,
                from_amount: outcome.from_amount,
                to_amount: outcome.to_amount,
                executed_price: outcome.executed_price,
                fees: outcome.fees,
                slippage: outcome.slippage,
                executed_at: Utc::now(),
            },
            metadata,
        );
        Ok(())
    }

    /// Record a partial fill of an executing limit order
    pub fn partially_fill(
        &mut self,
        filled_amount: Decimal,
        price: Decimal,
        tx_hash: String,
    ) -> Result<(), DomainError> {
        if self.status != OrderStatus::Executing {
            return Err(DomainError::invalid_transition("PartiallyFill", self.status));
        }
        if filled_amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "filled_amount must be positive (got {filled_amount})"
            )));
        }
        if filled_amount > self.from_amount {
            return Err(DomainError::validation(format!(
                "filled_amount {filled_amount} exceeds order amount {}",
                self.from_amount
            )));
        }
        self.apply(OrderEvent::OrderPartiallyFilled {
            order_id: self.id,
            filled_amount,
            price,
            tx_hash,
            filled_at: Utc::now(),
        });
        Ok(())
    }

    /// Complete the order. No-op when already completed.
    pub fn complete(&mut self, metadata: EventMetadata) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Completed => Ok(()),
            OrderStatus::Executing => {
                self.apply_with_metadata(
                    OrderEvent::OrderCompleted {
                        order_id: self.id,
                        completed_at: Utc::now(),
                    },
                    metadata,
                );
                Ok(())
            }
            status => Err(DomainError::invalid_transition("CompleteOrder", status)),
        }
    }

    /// Fail the order. No-op when already failed; completed orders cannot fail.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Failed => Ok(()),
            OrderStatus::Completed => {
                Err(DomainError::invalid_transition("FailOrder", self.status))
            }
            _ => {
                self.apply(OrderEvent::OrderFailed {
                    order_id: self.id,
                    reason: reason.into(),
                    failed_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    /// Cancel a pending order
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.require_pending("CancelOrder")?;
        self.apply(OrderEvent::OrderCancelled {
            order_id: self.id,
            reason: reason.into(),
            cancelled_at: Utc::now(),
        });
        Ok(())
    }

    /// Change recognized order attributes on a pending order
    pub fn update(&mut self, changes: OrderChanges) -> Result<(), DomainError> {
        self.require_pending("UpdateOrder")?;
        if changes.is_empty() {
            return Err(DomainError::validation("no recognized changes supplied"));
        }
        if let Some(from_amount) = changes.from_amount {
            if from_amount < Decimal::from(MIN_ORDER_AMOUNT) {
                return Err(DomainError::validation(format!(
                    "from_amount {from_amount} is below the minimum of {MIN_ORDER_AMOUNT}"
                )));
            }
        }
        if let Some(to_amount) = changes.to_amount {
            if to_amount <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "to_amount must be positive (got {to_amount})"
                )));
            }
        }
        self.apply(OrderEvent::OrderUpdated {
            order_id: self.id,
            changes,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    fn require_pending(&self, command: &'static str) -> Result<(), DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::invalid_transition(command, self.status));
        }
        Ok(())
    }

    fn require_limit(&self, command: &'static str) -> Result<(), DomainError> {
        if self.order_type != OrderType::Limit {
            return Err(DomainError::validation(format!(
                "{command} requires a limit order"
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn from_amount(&self) -> Decimal {
        self.from_amount
    }

    pub fn from_currency(&self) -> &str {
        &self.from_currency
    }

    pub fn to_currency(&self) -> &str {
        &self.to_currency
    }

    pub fn to_amount(&self) -> Option<Decimal> {
        self.to_amount
    }

    pub fn executed_price(&self) -> Option<Decimal> {
        self.executed_price
    }

    pub fn limit_price(&self) -> Option<Decimal> {
        self.limit_price
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    pub fn filled_amount(&self) -> Decimal {
        self.filled_amount
    }

    pub fn swap_idempotency_key(&self) -> Option<&str> {
        self.swap_idempotency_key.as_deref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Completed | OrderStatus::Failed)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn when(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::OrderAccepted {
                order_id,
                user_id,
                from_amount,
                from_currency,
                to_currency,
                order_type,
                accepted_at,
            } => {
                self.id = *order_id;
                self.user_id = *user_id;
                self.from_amount = *from_amount;
                self.from_currency = from_currency.clone();
                self.to_currency = to_currency.clone();
                self.order_type = *order_type;
                self.status = OrderStatus::Pending;
                self.created_at = Some(*accepted_at);
                self.updated_at = Some(*accepted_at);
            }

            OrderEvent::OrderInitialized { initialized_at, .. } => {
                self.updated_at = Some(*initialized_at);
            }

            OrderEvent::BalanceCheckPassed { checked_at, .. }
            | OrderEvent::BalanceCheckFailed { checked_at, .. } => {
                self.updated_at = Some(*checked_at);
            }

            OrderEvent::PriceQuoted {
                to_amount,
                quoted_at,
                ..
            } => {
                self.to_amount = Some(*to_amount);
                self.updated_at = Some(*quoted_at);
            }

            OrderEvent::LimitPriceSet {
                limit_price,
                set_at,
                ..
            } => {
                self.limit_price = Some(*limit_price);
                self.updated_at = Some(*set_at);
            }

            OrderEvent::OrderPlacedInBook { placed_at, .. } => {
                self.updated_at = Some(*placed_at);
            }

            OrderEvent::SwapExecuting {
                idempotency_key,
                started_at,
                ..
            } => {
                self.swap_idempotency_key = Some(idempotency_key.clone());
                self.status = OrderStatus::Executing;
                self.updated_at = Some(*started_at);
            }

            OrderEvent::SwapExecuted {
                tx_hash,
                to_amount,
                executed_price,
                fees,
                slippage,
                executed_at,
                ..
            } => {
                self.tx_hash = Some(tx_hash.clone());
                self.to_amount = Some(*to_amount);
                self.executed_price = Some(*executed_price);
                self.fees = Some(*fees);
                self.slippage = Some(*slippage);
                self.updated_at = Some(*executed_at);
            }

            OrderEvent::OrderPartiallyFilled {
                filled_amount,
                filled_at,
                ..
            } => {
                self.filled_amount += *filled_amount;
                self.updated_at = Some(*filled_at);
            }

            OrderEvent::OrderCompleted { completed_at, .. } => {
                self.status = OrderStatus::Completed;
                self.updated_at = Some(*completed_at);
            }

            OrderEvent::OrderFailed { failed_at, .. } => {
                self.status = OrderStatus::Failed;
                self.updated_at = Some(*failed_at);
            }

            OrderEvent::OrderCancelled { cancelled_at, .. } => {
                self.status = OrderStatus::Failed;
                self.updated_at = Some(*cancelled_at);
            }

            OrderEvent::OrderUpdated {
                changes,
                updated_at,
                ..
            } => {
                if let Some(from_amount) = changes.from_amount {
                    self.from_amount = from_amount;
                }
                if let Some(to_amount) = changes.to_amount {
                    self.to_amount = Some(to_amount);
                }
                self.updated_at = Some(*updated_at);
            }
        }
    }

    fn uncommitted(&self) -> &[PendingEvent<OrderEvent>] {
        &self.uncommitted
    }

    fn uncommitted_mut(&mut self) -> &mut Vec<PendingEvent<OrderEvent>> {
        &mut self.uncommitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainEvent;
    use rust_decimal_macros::dec;

    fn market_order() -> Order {
        Order::accept(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(1000),
            "USDT".to_string(),
            "BTC".to_string(),
            OrderType::Market,
        )
        .unwrap()
    }

    fn limit_order() -> Order {
        Order::accept(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(500),
            "USDT".to_string(),
            "ETH".to_string(),
            OrderType::Limit,
        )
        .unwrap()
    }

    #[test]
    fn test_accept_order() {
        let order = market_order();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.from_amount(), dec!(1000));
        assert_eq!(order.version(), 1);
        assert_eq!(order.uncommitted().len(), 1);
        assert_eq!(order.uncommitted()[0].version, 1);
        assert_eq!(order.uncommitted()[0].payload.event_type(), "OrderAccepted");
    }

    #[test]
    fn test_accept_rejects_below_minimum() {
        let result = Order::accept(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(5),
            "USDT".to_string(),
            "BTC".to_string(),
            OrderType::Market,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_accept_rejects_non_positive_amount() {
        let result = Order::accept(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(0),
            "USDT".to_string(),
            "BTC".to_string(),
            OrderType::Market,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_accept_rejects_same_currency() {
        let result = Order::accept(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(100),
            "USDT".to_string(),
            "USDT".to_string(),
            OrderType::Market,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_quote_price() {
        let mut order = market_order();
        order.quote_price(dec!(100000), dec!(0.01)).unwrap();
        assert_eq!(order.to_amount(), Some(dec!(0.01)));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn test_quote_price_rejects_non_positive() {
        let mut order = market_order();
        assert!(matches!(
            order.quote_price(dec!(0), dec!(0.01)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            order.quote_price(dec!(100000), dec!(0)),
            Err(DomainError::Validation(_))
        ));
        // Rejected commands must not emit events
        assert_eq!(order.version(), 1);
        assert_eq!(order.uncommitted().len(), 1);
    }

    #[test]
    fn test_quote_price_on_executing_order() {
        let mut order = market_order();
        order.start_swap_execution("swap-test".to_string()).unwrap();
        let result = order.quote_price(dec!(100000), dec!(0.01));
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition { command: "QuotePrice", .. })
        ));
    }

    #[test]
    fn test_balance_check() {
        let mut order = market_order();
        order.check_balances(dec!(2000)).unwrap();
        assert_eq!(
            order.uncommitted().last().unwrap().payload.event_type(),
            "BalanceCheckPassed"
        );

        let mut poor = market_order();
        poor.check_balances(dec!(100)).unwrap();
        assert_eq!(
            poor.uncommitted().last().unwrap().payload.event_type(),
            "BalanceCheckFailed"
        );
        assert_eq!(poor.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_swap_execution_flow() {
        let mut order = market_order();
        order.quote_price(dec!(100000), dec!(0.01)).unwrap();
        order.start_swap_execution("swap-1".to_string()).unwrap();
        assert_eq!(order.status(), OrderStatus::Executing);
        assert_eq!(order.swap_idempotency_key(), Some("swap-1"));

        order
            .record_swap_execution(
                SwapOutcome {
                    tx_hash: "0xabc".to_string(),
                    from_amount: dec!(1000),
                    to_amount: dec!(0.01),
                    executed_price: dec!(100000),
                    fees: dec!(0.5),
                    slippage: dec!(0.02),
                },
                EventMetadata::new(),
            )
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Executing);
        assert_eq!(order.tx_hash(), Some("0xabc"));
        assert_eq!(order.executed_price(), Some(dec!(100000)));
        assert_eq!(order.version(), 4);
    }

    #[test]
    fn test_record_swap_requires_executing() {
        let mut order = market_order();
        let result = order.record_swap_execution(
            SwapOutcome {
                tx_hash: "0xabc".to_string(),
                from_amount: dec!(1000),
                to_amount: dec!(0.01),
                executed_price: dec!(100000),
                fees: dec!(0.5),
                slippage: dec!(0.02),
            },
            EventMetadata::new(),
        );
        assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut order = market_order();
        order.start_swap_execution("swap-1".to_string()).unwrap();
        order.complete(EventMetadata::new()).unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);
        let version = order.version();

        // Second completion emits nothing
        order.complete(EventMetadata::new()).unwrap();
        assert_eq!(order.version(), version);
    }

    #[test]
    fn test_complete_requires_executing() {
        let mut order = market_order();
        assert!(matches!(
            order.complete(EventMetadata::new()),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_fail_is_idempotent_and_blocked_after_completion() {
        let mut order = market_order();
        order.fail("price_unavailable").unwrap();
        assert_eq!(order.status(), OrderStatus::Failed);
        let version = order.version();
        order.fail("again").unwrap();
        assert_eq!(order.version(), version);

        let mut done = market_order();
        done.start_swap_execution("swap-1".to_string()).unwrap();
        done.complete(EventMetadata::new()).unwrap();
        assert!(matches!(
            done.fail("too late"),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_only_pending() {
        let mut order = market_order();
        order.cancel("user_request").unwrap();
        assert_eq!(order.status(), OrderStatus::Failed);

        let mut executing = market_order();
        executing.start_swap_execution("swap-1".to_string()).unwrap();
        assert!(matches!(
            executing.cancel("late"),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_limit_commands_require_limit_order() {
        let mut market = market_order();
        assert!(matches!(
            market.set_limit_price(dec!(90000)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            market.place_in_order_book("BTC-USDT"),
            Err(DomainError::Validation(_))
        ));

        let mut limit = limit_order();
        limit.set_limit_price(dec!(3000)).unwrap();
        assert_eq!(limit.limit_price(), Some(dec!(3000)));
        limit.place_in_order_book("ETH-USDT").unwrap();
        assert_eq!(limit.version(), 3);
    }

    #[test]
    fn test_partial_fill_bounds() {
        let mut order = limit_order();
        order.start_swap_execution("swap-2".to_string()).unwrap();

        assert!(matches!(
            order.partially_fill(dec!(0), dec!(3000), "0x1".to_string()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            order.partially_fill(dec!(501), dec!(3000), "0x1".to_string()),
            Err(DomainError::Validation(_))
        ));

        order
            .partially_fill(dec!(200), dec!(3000), "0x1".to_string())
            .unwrap();
        order
            .partially_fill(dec!(300), dec!(3000), "0x2".to_string())
            .unwrap();
        assert_eq!(order.filled_amount(), dec!(500));
    }

    #[test]
    fn test_update_order_changes() {
        let mut order = market_order();
        order
            .update(OrderChanges {
                from_amount: Some(dec!(1500)),
                to_amount: None,
            })
            .unwrap();
        assert_eq!(order.from_amount(), dec!(1500));

        assert!(matches!(
            order.update(OrderChanges::default()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            order.update(OrderChanges {
                from_amount: Some(dec!(1)),
                to_amount: None,
            }),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_replay_matches_live_state() {
        let mut live = market_order();
        live.quote_price(dec!(100000), dec!(0.01)).unwrap();
        live.start_swap_execution("swap-1".to_string()).unwrap();

        let mut replayed = Order::default();
        for pending in live.uncommitted() {
            replayed.replay(&pending.payload);
        }

        assert_eq!(replayed.id(), live.id());
        assert_eq!(replayed.status(), live.status());
        assert_eq!(replayed.to_amount(), live.to_amount());
        assert_eq!(replayed.version(), live.version());
        assert!(replayed.uncommitted().is_empty());
    }
}
