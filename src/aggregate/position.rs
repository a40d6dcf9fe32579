//! Position Aggregate
//!
//! A position collects the completed orders of one user-side holding. It is
//! created by the saga once a price is quoted and linked to its order by
//! identifier only; the atomic completion step is the single place where an
//! order and its position commit together.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, EventMetadata, PositionEvent};

use super::{Aggregate, PendingEvent};

/// Position status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl Default for PositionStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "open"),
            PositionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// One order attached to a position
#[derive(Debug, Clone, PartialEq)]
pub struct PositionOrder {
    pub order_id: Uuid,
    pub to_amount: Decimal,
    pub value: Decimal,
    pub pnl: Decimal,
}

/// Position Aggregate
#[derive(Debug, Clone, Default)]
pub struct Position {
    id: Uuid,
    user_id: Uuid,
    orders: Vec<PositionOrder>,
    remaining_amount: Decimal,
    status: PositionStatus,
    version: i64,
    uncommitted: Vec<PendingEvent<PositionEvent>>,
}

impl Position {
    /// Open a new position for a user
    pub fn open(position_id: Uuid, user_id: Uuid) -> Self {
        let mut position = Self::default();
        position.apply(PositionEvent::PositionCreated {
            position_id,
            user_id,
            created_at: Utc::now(),
        });
        position
    }

    /// Attach a completed order to the position.
    ///
    /// Attaching an order that is already present is a no-op, which keeps
    /// completion retries harmless.
    pub fn add_order(
        &mut self,
        order_id: Uuid,
        to_amount: Decimal,
        value: Decimal,
        pnl: Decimal,
        metadata: EventMetadata,
    ) -> Result<(), DomainError> {
        if self.status != PositionStatus::Open {
            return Err(DomainError::invalid_transition("AddOrder", self.status));
        }
        if self.orders.iter().any(|o| o.order_id == order_id) {
            return Ok(());
        }
        if to_amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "to_amount must be positive (got {to_amount})"
            )));
        }
        self.apply_with_metadata(
            PositionEvent::PositionUpdated {
                position_id: self.id,
                order_id,
                to_amount,
                value,
                pnl,
                updated_at: Utc::now(),
            },
            metadata,
        );
        Ok(())
    }

    /// Close the position. No-op when already closed.
    pub fn close(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if self.status == PositionStatus::Closed {
            return Ok(());
        }
        self.apply(PositionEvent::PositionClosed {
            position_id: self.id,
            reason: reason.into(),
            closed_at: Utc::now(),
        });
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn orders(&self) -> &[PositionOrder] {
        &self.orders
    }

    pub fn contains_order(&self, order_id: Uuid) -> bool {
        self.orders.iter().any(|o| o.order_id == order_id)
    }

    pub fn remaining_amount(&self) -> Decimal {
        self.remaining_amount
    }

    pub fn status(&self) -> PositionStatus {
        self.status
    }
}

impl Aggregate for Position {
    type Event = PositionEvent;

    fn aggregate_type() -> &'static str {
        "Position"
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

    fn when(&mut self, event: &PositionEvent) {
        match event {
            PositionEvent::PositionCreated {
                position_id,
                user_id,
                ..
            } => {
                self.id = *position_id;
                self.user_id = *user_id;
                self.status = PositionStatus::Open;
            }

            PositionEvent::PositionUpdated {
                order_id,
                to_amount,
                value,
                pnl,
                ..
            } => {
                self.orders.push(PositionOrder {
                    order_id: *order_id,
                    to_amount: *to_amount,
                    value: *value,
                    pnl: *pnl,
                });
                self.remaining_amount += *to_amount;
            }

            PositionEvent::PositionClosed { .. } => {
                self.status = PositionStatus::Closed;
            }
        }
    }

    fn uncommitted(&self) -> &[PendingEvent<PositionEvent>] {
        &self.uncommitted
    }

    fn uncommitted_mut(&mut self) -> &mut Vec<PendingEvent<PositionEvent>> {
        &mut self.uncommitted
    }
}
