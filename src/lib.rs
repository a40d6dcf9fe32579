//! swapEngine Library
//!
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod bus;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod idempotency;
pub mod jobs;
pub mod notification;
pub mod outbox;
pub mod saga;
pub mod services;

// Private modules (used only by main.rs binary)
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{Amount, AmountError, DomainError, EventEnvelope, EventMetadata};
pub use domain::{OrderChanges, OrderEvent, OrderType, PositionEvent};
pub use error::{AppError, AppResult};
