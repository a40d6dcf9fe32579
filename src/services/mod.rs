//! External service contracts
//!
//! The core treats pricing and swap execution as opaque, retriable
//! capabilities behind these traits. The swap worker must deduplicate by
//! `idempotency_key`; without that contract a swap call cannot be retried
//! safely.

mod http;

pub use http::{HttpPriceService, HttpSwapWorker};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors from external collaborators
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExternalError {
    #[error("External service unavailable: {0}")]
    Unavailable(String),

    #[error("External call timed out")]
    Timeout,
}

/// Market price lookup
#[async_trait]
pub trait PriceService: Send + Sync {
    /// Get the current market price of `to` denominated in `from`
    async fn get_market_price(&self, from: &str, to: &str) -> Result<Decimal, ExternalError>;
}

/// Swap execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Deduplication key honored by the worker
    pub idempotency_key: String,
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: Decimal,
    /// Maximum tolerated slippage fraction
    pub slippage: Decimal,
}

/// Result of an executed swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResult {
    pub tx_hash: String,
    pub to_amount: Decimal,
    pub executed_price: Decimal,
    pub fees: Decimal,
    pub slippage: Decimal,
}

/// On-chain swap execution
#[async_trait]
pub trait SwapWorker: Send + Sync {
    /// Execute a swap; duplicate invocations with the same
    /// `idempotency_key` must return the original result
    async fn execute_swap(&self, request: SwapRequest) -> Result<SwapResult, ExternalError>;
}
