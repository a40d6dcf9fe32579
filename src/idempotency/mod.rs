//! Consumer-side idempotency
//!
//! Durable record of event ids each consumer has fully handled. A handler
//! records the event id only after its side-effects succeed, so a crash in
//! between results in a safe replay rather than a lost event.

mod repository;

pub use repository::{IdempotencyError, ProcessedEvent, ProcessedEventRepository};
