//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::OrderStatus;
use crate::domain::OrderType;
use crate::error::AppError;
use crate::event_store::{AggregateStore, EventStore};
use crate::handlers::{
    CancelOrderCommand, CancelOrderHandler, CreateOrderCommand, CreateOrderHandler,
};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    /// Amount in the source currency (as string for precise decimal)
    pub from_amount: String,
    pub from_currency: String,
    pub to_currency: String,
    pub order_type: OrderType,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TimelineEntry {
    pub event_id: Uuid,
    pub event_type: String,
    pub version: i64,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderTimelineResponse {
    pub order_id: Uuid,
    pub events: Vec<TimelineEntry>,
}

// =========================================================================
// Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route("/orders/:order_id/events", get(order_events))
}

// =========================================================================
// Handlers
// =========================================================================

/// POST /orders - accept an order for asynchronous execution
async fn create_order(
    State(pool): State<PgPool>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let handler = CreateOrderHandler::new(AggregateStore::new(pool));
    let result = handler
        .execute(CreateOrderCommand {
            user_id: request.user_id,
            from_amount: request.from_amount,
            from_currency: request.from_currency,
            to_currency: request.to_currency,
            order_type: request.order_type,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateOrderResponse {
            order_id: result.order_id,
            status: result.status,
        }),
    ))
}

/// POST /orders/:order_id/cancel - cancel a pending order
async fn cancel_order(
    State(pool): State<PgPool>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<StatusCode, AppError> {
    let handler = CancelOrderHandler::new(AggregateStore::new(pool));
    handler
        .execute(CancelOrderCommand {
            order_id,
            reason: request.reason.unwrap_or_else(|| "user_request".to_string()),
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/:order_id/events - full event timeline for auditing
async fn order_events(
    State(pool): State<PgPool>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderTimelineResponse>, AppError> {
    let store = EventStore::new(pool);
    let events = store.load(order_id).await?;

    if events.is_empty() {
        return Err(AppError::OrderNotFound(order_id.to_string()));
    }

    Ok(Json(OrderTimelineResponse {
        order_id,
        events: events
            .into_iter()
            .map(|e| TimelineEntry {
                event_id: e.event_id,
                event_type: e.event_type,
                version: e.version,
                event_data: e.event_data,
                created_at: e.created_at,
            })
            .collect(),
    }))
}
