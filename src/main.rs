//! swapEngine - Currency swap order execution backend
//!
//! Accepts swap orders over HTTP and executes them through an event-sourced
//! saga: price quote, position allocation, on-chain swap, atomic completion.
//! The event log is the single source of truth; the outbox relay and the
//! saga consumers are background workers over durable state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_engine::bus::{self, EventHandler, EventPublisher, MessageBus};
use swap_engine::event_store::AggregateStore;
use swap_engine::idempotency::ProcessedEventRepository;
use swap_engine::jobs::JobScheduler;
use swap_engine::notification::{NotificationSubscriber, SUBSCRIPTION, TERMINAL_EVENT_TYPES};
use swap_engine::outbox::{OutboxRelay, OutboxRepository};
use swap_engine::saga::{
    CompleteOrderStep, ExecuteSwapStep, OpenPositionStep, QuotePriceStep,
    POSITION_CREATED_FOR_ORDER,
};
use swap_engine::services::{HttpPriceService, HttpSwapWorker};
use swap_engine::{api, db, Config};

/// Grace period for background workers after the HTTP acceptor stops
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swap_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(pool: PgPool) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Subscribe a handler to its queue and drive it until shutdown
async fn spawn_consumer(
    bus: &MessageBus,
    queue: &str,
    routing_keys: &[&str],
    handler: Arc<dyn EventHandler>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<JoinHandle<()>> {
    let consumer = bus.subscribe(queue, routing_keys).await?;
    Ok(tokio::spawn(bus::run_consumer(consumer, handler, shutdown)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting swapEngine");
    tracing::info!("Connecting to database...");

    let pool = db::connect_with_retry(
        &config.database_url,
        config.database_max_connections,
        config.connect_max_attempts,
        config.connect_retry_delay,
    )
    .await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }
    tracing::info!("Database connected successfully");

    tracing::info!("Connecting to message bus...");
    let message_bus = MessageBus::connect(
        &config.message_bus_url,
        config.connect_max_attempts,
        config.connect_retry_delay,
    )
    .await?;
    tracing::info!("Message bus connected successfully");

    // External collaborators
    let price_service = Arc::new(HttpPriceService::new(
        config.price_service_url.clone(),
        config.price_timeout,
    )?);
    let swap_worker = Arc::new(HttpSwapWorker::new(
        config.swap_worker_url.clone(),
        config.swap_timeout,
    )?);

    // Shared stores
    let store = AggregateStore::new(pool.clone());
    let processed = ProcessedEventRepository::new(pool.clone());
    let publisher: Arc<dyn EventPublisher> = Arc::new(message_bus.clone());

    // Shutdown broadcast: HTTP acceptor stops first, workers drain after
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    // Outbox relay
    let relay = OutboxRelay::new(
        OutboxRepository::new(pool.clone()),
        message_bus.clone(),
        config.relay_interval,
        config.relay_batch_size,
    );
    workers.push(tokio::spawn(relay.run(shutdown_rx.clone())));

    // Maintenance jobs
    let scheduler = JobScheduler::new(pool.clone());
    workers.push(tokio::spawn(scheduler.run(shutdown_rx.clone())));

    // Saga step 1: OrderAccepted -> PriceQuoted
    workers.push(
        spawn_consumer(
            &message_bus,
            &bus::queue_name("OrderAccepted"),
            &["OrderAccepted"],
            Arc::new(QuotePriceStep::new(
                store.clone(),
                processed.clone(),
                price_service,
            )),
            shutdown_rx.clone(),
        )
        .await?,
    );

    // Saga step 2: PriceQuoted -> PositionCreatedForOrder
    workers.push(
        spawn_consumer(
            &message_bus,
            &bus::queue_name("PriceQuoted"),
            &["PriceQuoted"],
            Arc::new(OpenPositionStep::new(
                store.clone(),
                processed.clone(),
                publisher.clone(),
            )),
            shutdown_rx.clone(),
        )
        .await?,
    );

    // Saga step 3: PositionCreatedForOrder -> SwapExecuted. The slowest
    // step; N parallel consumers drain the queue.
    let swap_step = Arc::new(ExecuteSwapStep::new(
        store.clone(),
        processed.clone(),
        swap_worker,
        publisher.clone(),
    ));
    for _ in 0..config.swap_workers.max(1) {
        workers.push(
            spawn_consumer(
                &message_bus,
                &bus::queue_name(POSITION_CREATED_FOR_ORDER),
                &[POSITION_CREATED_FOR_ORDER],
                swap_step.clone(),
                shutdown_rx.clone(),
            )
            .await?,
        );
    }

    // Saga step 4: SwapExecuted -> PositionLinkedToOrder
    workers.push(
        spawn_consumer(
            &message_bus,
            &bus::queue_name("SwapExecuted"),
            &["SwapExecuted"],
            Arc::new(CompleteOrderStep::new(
                store.clone(),
                processed.clone(),
                publisher.clone(),
            )),
            shutdown_rx.clone(),
        )
        .await?,
    );

    // Notification subscriber for terminal events
    workers.push(
        spawn_consumer(
            &message_bus,
            &bus::queue_name(SUBSCRIPTION),
            &TERMINAL_EVENT_TYPES,
            Arc::new(NotificationSubscriber::new(processed.clone())),
            shutdown_rx.clone(),
        )
        .await?,
    );

    // HTTP server
    let app = build_router(pool.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain background workers
    tracing::info!("Server shutting down...");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(DRAIN_TIMEOUT, futures::future::join_all(workers))
        .await
        .is_err()
    {
        tracing::warn!("Background workers did not drain in time");
    }

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
