//! Database module
//!
//! Database connection and schema verification utilities.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Per-statement acquire timeout for pool connections
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to the database with bounded retry
pub async fn connect_with_retry(
    database_url: &str,
    max_connections: u32,
    max_attempts: u32,
    retry_delay: Duration,
) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await;

        match result {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                tracing::error!(error = %e, attempt, "Database connection failed");
                return Err(e);
            }
        }
    }
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let required_tables = vec!["events", "outbox", "processed_events"];

    for table in required_tables {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}
