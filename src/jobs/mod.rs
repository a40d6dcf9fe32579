//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks. The processed-event set
//! grows with every consumed event; rows past the redelivery horizon are
//! pruned so the table stays bounded.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::time::interval;

use crate::idempotency::{IdempotencyError, ProcessedEventRepository};

/// Days a processed-event row is kept before pruning
const PROCESSED_EVENT_RETENTION_DAYS: i64 = 7;

/// Delete processed-event rows older than the retention window
pub async fn prune_processed_events(pool: &PgPool) -> Result<u64, IdempotencyError> {
    let repository = ProcessedEventRepository::new(pool.clone());
    let rows_deleted = repository
        .prune_older_than(PROCESSED_EVENT_RETENTION_DAYS)
        .await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "Pruned processed events");
    }

    Ok(rows_deleted)
}

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for processed-event pruning (default: 1 hour)
    pub prune_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            prune_interval: Duration::from_secs(3600),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(pool: PgPool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Run the scheduler loop until shutdown
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Job scheduler started");

        let mut prune_interval = interval(self.config.prune_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("Job scheduler shutting down");
                    break;
                }
                _ = prune_interval.tick() => {
                    if let Err(e) = prune_processed_events(&self.pool).await {
                        tracing::error!(error = %e, "Processed-event pruning failed");
                    }
                }
            }
        }
    }
}
