//! Common test utilities

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use swap_engine::bus::{BusError, EventPublisher};
use swap_engine::domain::EventEnvelope;
use swap_engine::services::{ExternalError, PriceService, SwapRequest, SwapResult, SwapWorker};

/// Setup test database - truncate tables for fresh state
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE events, outbox, processed_events CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

/// Fetch the latest outbox envelope for an aggregate and event type
pub async fn outbox_envelope(
    pool: &PgPool,
    aggregate_id: Uuid,
    event_type: &str,
) -> EventEnvelope {
    let (event_data,): (serde_json::Value,) = sqlx::query_as(
        r#"
        SELECT event_data FROM outbox
        WHERE aggregate_id = $1 AND event_type = $2
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(aggregate_id)
    .bind(event_type)
    .fetch_one(pool)
    .await
    .expect("Expected outbox row");

    serde_json::from_value(event_data).expect("Invalid envelope in outbox")
}

/// Count outbox rows for an event id
pub async fn outbox_count(pool: &PgPool, event_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count outbox rows")
}

/// Price service stub returning a fixed price
pub struct FixedPriceService(pub Decimal);

#[async_trait]
impl PriceService for FixedPriceService {
    async fn get_market_price(&self, _from: &str, _to: &str) -> Result<Decimal, ExternalError> {
        Ok(self.0)
    }
}

/// Price service stub that is always down
pub struct FailingPriceService;

#[async_trait]
impl PriceService for FailingPriceService {
    async fn get_market_price(&self, _from: &str, _to: &str) -> Result<Decimal, ExternalError> {
        Err(ExternalError::Unavailable("price feed down".to_string()))
    }
}

/// Swap worker stub returning a fixed result
pub struct FixedSwapWorker(pub SwapResult);

#[async_trait]
impl SwapWorker for FixedSwapWorker {
    async fn execute_swap(&self, _request: SwapRequest) -> Result<SwapResult, ExternalError> {
        Ok(self.0.clone())
    }
}

/// Swap worker stub that is always down
pub struct FailingSwapWorker;

#[async_trait]
impl SwapWorker for FailingSwapWorker {
    async fn execute_swap(&self, _request: SwapRequest) -> Result<SwapResult, ExternalError> {
        Err(ExternalError::Unavailable("swap worker down".to_string()))
    }
}

/// Publisher stub collecting envelopes in memory
#[derive(Default)]
pub struct CollectingPublisher {
    published: Mutex<Vec<EventEnvelope>>,
}

impl CollectingPublisher {
    pub fn take(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.published.lock().unwrap())
    }
}

#[async_trait]
impl EventPublisher for CollectingPublisher {
    async fn publish_envelope(&self, envelope: &EventEnvelope) -> Result<(), BusError> {
        self.published.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}
