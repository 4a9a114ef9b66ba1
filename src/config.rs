/// Configuration management for the moderation service
use crate::error::{ModError, ModResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub moderation: ModerationConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Per-query deadline for store access, in milliseconds
    pub store_timeout_ms: u64,
}

/// Moderation workflow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Upper bound on the merged flagged/reported candidate set held in memory
    pub queue_candidate_cap: usize,
    /// Maximum IDs accepted by a bulk decision
    pub bulk_limit: usize,
    /// Counter outbox retry attempts before giving up
    pub outbox_max_retries: u32,
    /// Base backoff between outbox retries, in milliseconds
    pub outbox_backoff_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ModResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MODWATCH_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("MODWATCH_PORT")
            .unwrap_or_else(|_| "8480".to_string())
            .parse()
            .map_err(|_| ModError::Validation("Invalid port number".to_string()))?;
        let version = env::var("MODWATCH_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("MODWATCH_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("MODWATCH_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("moderation.sqlite"));
        let store_timeout_ms = env::var("MODWATCH_STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        let queue_candidate_cap = env::var("MODWATCH_QUEUE_CANDIDATE_CAP")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);
        let bulk_limit = env::var("MODWATCH_BULK_LIMIT")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let outbox_max_retries = env::var("MODWATCH_OUTBOX_MAX_RETRIES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let outbox_backoff_ms = env::var("MODWATCH_OUTBOX_BACKOFF_MS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .unwrap_or(200);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                store_timeout_ms,
            },
            moderation: ModerationConfig {
                queue_candidate_cap,
                bulk_limit,
                outbox_max_retries,
                outbox_backoff_ms,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ModResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ModError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.moderation.bulk_limit == 0 || self.moderation.bulk_limit > 100 {
            return Err(ModError::Validation(
                "Bulk limit must be between 1 and 100".to_string(),
            ));
        }

        if self.moderation.queue_candidate_cap == 0 {
            return Err(ModError::Validation(
                "Queue candidate cap must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
