//! Configuration management for the sync service.

use courier_engine::{QueuePolicy, RetryPolicy};
use std::env;
use std::time::Duration;

/// Sync service configuration loaded from environment variables.
///
/// Everything except `DATABASE_URL` has a default matching the production
/// deployment, so a bare environment yields a working service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Sleep between synchronizer passes
    pub sync_interval: Duration,
    /// Maximum operations drained per pass
    pub batch_size: u32,
    /// Requeues granted to a failing operation
    pub max_retries: u32,
    /// Linear backoff unit between retries
    pub retry_unit: Duration,
    /// Per-user queue depth cap
    pub max_queue_size: usize,
    /// Autosave snapshot lifetime, refreshed on every write
    pub autosave_ttl: Duration,
    /// Conflict record lifetime, resolved or not
    pub conflict_ttl: Duration,
    /// How long completed operations are retained
    pub completed_retention: Duration,
    /// Sleep between retention sweeps
    pub sweep_interval: Duration,
}

impl SyncConfig {
    /// Load configuration from environment variables, reading a `.env`
    /// file first if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            sync_interval: Duration::from_secs(env_u64("SYNC_INTERVAL_SECS", 5)?),
            batch_size: env_u64("SYNC_BATCH_SIZE", 10)? as u32,
            max_retries: env_u64("MAX_RETRIES", 3)? as u32,
            retry_unit: Duration::from_secs(env_u64("RETRY_UNIT_SECS", 5 * 60)?),
            max_queue_size: env_u64("MAX_QUEUE_SIZE", 100)? as usize,
            autosave_ttl: Duration::from_secs(env_u64("AUTOSAVE_TTL_SECS", 24 * 60 * 60)?),
            conflict_ttl: Duration::from_secs(env_u64("CONFLICT_TTL_SECS", 7 * 24 * 60 * 60)?),
            completed_retention: Duration::from_secs(env_u64(
                "COMPLETED_RETENTION_SECS",
                7 * 24 * 60 * 60,
            )?),
            sweep_interval: Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS", 24 * 60 * 60)?),
            database_url,
        })
    }

    /// Configuration with default knobs and an explicit database URL.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            sync_interval: Duration::from_secs(5),
            batch_size: 10,
            max_retries: 3,
            retry_unit: Duration::from_secs(5 * 60),
            max_queue_size: 100,
            autosave_ttl: Duration::from_secs(24 * 60 * 60),
            conflict_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            completed_retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// The engine retry policy implied by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_unit.as_millis() as i64)
    }

    /// The engine queue policy implied by this configuration.
    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy {
            max_depth: self.max_queue_size,
        }
    }

    pub(crate) fn autosave_ttl_ms(&self) -> i64 {
        self.autosave_ttl.as_millis() as i64
    }

    pub(crate) fn conflict_ttl_ms(&self) -> i64 {
        self.conflict_ttl.as_millis() as i64
    }

    pub(crate) fn completed_retention_ms(&self) -> i64 {
        self.completed_retention.as_millis() as i64
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
