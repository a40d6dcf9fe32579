//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// AMQP broker URL
    pub message_bus_url: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Outbox relay polling interval
    pub relay_interval: Duration,

    /// Outbox relay batch size
    pub relay_batch_size: i64,

    /// Number of parallel swap-step consumers
    pub swap_workers: u32,

    /// Price service base URL
    pub price_service_url: String,

    /// Swap worker base URL
    pub swap_worker_url: String,

    /// Per-call timeout for price fetches
    pub price_timeout: Duration,

    /// Per-call timeout for swap execution
    pub swap_timeout: Duration,

    /// Startup connection attempts for database and bus
    pub connect_max_attempts: u32,

    /// Delay between startup connection attempts
    pub connect_retry_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", "10")?;

        let message_bus_url =
            env::var("MESSAGE_BUS_URL").map_err(|_| ConfigError::MissingEnv("MESSAGE_BUS_URL"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let relay_interval = Duration::from_millis(parse_var("RELAY_INTERVAL_MS", "100")?);
        let relay_batch_size = parse_var("RELAY_BATCH_SIZE", "100")?;
        let swap_workers = parse_var("SWAP_WORKERS", "1")?;

        let price_service_url = env::var("PRICE_SERVICE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8081".to_string());
        let swap_worker_url =
            env::var("SWAP_WORKER_URL").unwrap_or_else(|_| "http://127.0.0.1:8082".to_string());

        let price_timeout = Duration::from_millis(parse_var("PRICE_TIMEOUT_MS", "1000")?);
        let swap_timeout = Duration::from_millis(parse_var("SWAP_TIMEOUT_MS", "30000")?);

        let connect_max_attempts = parse_var("CONNECT_MAX_ATTEMPTS", "10")?;
        let connect_retry_delay =
            Duration::from_millis(parse_var("CONNECT_RETRY_DELAY_MS", "2000")?);

        Ok(Self {
            database_url,
            database_max_connections,
            message_bus_url,
            host,
            port,
            environment,
            relay_interval,
            relay_batch_size,
            swap_workers,
            price_service_url,
            swap_worker_url,
            price_timeout,
            swap_timeout,
            connect_max_attempts,
            connect_retry_delay,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
