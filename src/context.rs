/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    db,
    error::ModResult,
    moderation::{AuditLog, DecisionEngine, QueueService, ReportService},
    outbox::{CounterOutbox, OutboxOptions},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub queue: Arc<QueueService>,
    pub decisions: Arc<DecisionEngine>,
    pub reports: Arc<ReportService>,
    pub audit: Arc<AuditLog>,
    pub store_deadline: Duration,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ModResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let outbox = CounterOutbox::spawn(
            pool.clone(),
            OutboxOptions {
                max_retries: config.moderation.outbox_max_retries,
                backoff: Duration::from_millis(config.moderation.outbox_backoff_ms),
                ..Default::default()
            },
        );

        let queue = Arc::new(QueueService::new(
            pool.clone(),
            config.moderation.queue_candidate_cap,
        ));
        let decisions = Arc::new(DecisionEngine::new(
            pool.clone(),
            outbox,
            config.moderation.bulk_limit,
        ));
        let reports = Arc::new(ReportService::new(pool.clone()));
        let audit = Arc::new(AuditLog::new(pool.clone()));

        let store_deadline = Duration::from_millis(config.storage.store_timeout_ms);

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            queue,
            decisions,
            reports,
            audit,
            store_deadline,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
