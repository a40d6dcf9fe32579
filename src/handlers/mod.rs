//! Command Handlers module
//!
//! Command handlers validate inbound intents, drive the aggregates, and
//! persist the resulting events. Everything after the durable accept is
//! asynchronous and owned by the saga.

mod cancel_order_handler;
mod commands;
mod create_order_handler;

pub use cancel_order_handler::CancelOrderHandler;
pub use commands::{CancelOrderCommand, CreateOrderCommand, CreateOrderResult};
pub use create_order_handler::CreateOrderHandler;
