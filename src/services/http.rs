//! HTTP clients for the external price and swap services

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ExternalError, PriceService, SwapRequest, SwapResult, SwapWorker};

fn map_request_error(e: reqwest::Error) -> ExternalError {
    if e.is_timeout() {
        ExternalError::Timeout
    } else {
        ExternalError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

/// Price service client
#[derive(Debug, Clone)]
pub struct HttpPriceService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceService {
    /// Create a client with the given per-call timeout
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ExternalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl PriceService for HttpPriceService {
    async fn get_market_price(&self, from: &str, to: &str) -> Result<Decimal, ExternalError> {
        let url = format!("{}/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("from", from), ("to", to)])
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(ExternalError::Unavailable(format!(
                "price service returned {}",
                response.status()
            )));
        }

        let body: PriceResponse = response.json().await.map_err(map_request_error)?;
        if body.price <= Decimal::ZERO {
            return Err(ExternalError::Unavailable(format!(
                "price service returned non-positive price {}",
                body.price
            )));
        }
        Ok(body.price)
    }
}

/// Swap worker client
#[derive(Debug, Clone)]
pub struct HttpSwapWorker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSwapWorker {
    /// Create a client with the given per-call timeout
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ExternalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl SwapWorker for HttpSwapWorker {
    async fn execute_swap(&self, request: SwapRequest) -> Result<SwapResult, ExternalError> {
        let url = format!("{}/swaps", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(ExternalError::Unavailable(format!(
                "swap worker returned {}",
                response.status()
            )));
        }

        response.json().await.map_err(map_request_error)
    }
}
