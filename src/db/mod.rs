/// Database layer for the moderation service
///
/// Manages the SQLite connection pool, embedded migrations, and the
/// bounded-deadline wrapper every store access goes through.

use crate::error::{ModError, ModResult};
use sqlx::sqlite::SqlitePool;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> ModResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(if options.enable_wal {
                sqlx::sqlite::SqliteJournalMode::Wal
            } else {
                sqlx::sqlite::SqliteJournalMode::Delete
            })
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5)),
    )
    .await
    .map_err(ModError::Database)?;

    Ok(pool)
}

/// Create an in-memory pool with migrations applied. Test-only helper.
pub async fn create_test_pool() -> ModResult<SqlitePool> {
    let pool = SqlitePool::connect(":memory:")
        .await
        .map_err(ModError::Database)?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Run embedded migrations
pub async fn run_migrations(pool: &SqlitePool) -> ModResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ModError::Internal(format!("Failed to run migrations: {}", e)))?;
    Ok(())
}

/// Verify the pool is usable
pub async fn test_connection(pool: &SqlitePool) -> ModResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(ModError::Database)?;
    Ok(())
}

/// Apply the configured store deadline to a single database access.
///
/// Timeouts surface as `ModError::Timeout`, distinct from NotFound and
/// Internal, so callers and clients can tell a slow store from a bad request.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> ModResult<T>
where
    F: Future<Output = ModResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ModError::Timeout(format!(
            "store access exceeded {}ms",
            deadline.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_and_connection() {
        let pool = create_test_pool().await.unwrap();
        test_connection(&pool).await.unwrap();

        // Schema is present
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'audit_log'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout_error() {
        let result: ModResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ModError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_deadline_passes_through_success() {
        let result = with_deadline(Duration::from_millis(100), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
