/// Counter outbox
///
/// The approve path increments the parent story's comment counter. That
/// counter is denormalized and allowed to be eventually consistent, so the
/// increment never rides in the decision transaction: it is enqueued here and
/// applied by a background worker with bounded retries. Enqueue failure and
/// retry exhaustion are logged, never surfaced to the moderator.

use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Retry tuning for the worker
#[derive(Debug, Clone)]
pub struct OutboxOptions {
    pub max_retries: u32,
    pub backoff: Duration,
    pub queue_capacity: usize,
}

impl Default for OutboxOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(200),
            queue_capacity: 1024,
        }
    }
}

/// Handle for enqueueing counter increments
#[derive(Clone)]
pub struct CounterOutbox {
    tx: mpsc::Sender<String>,
}

impl CounterOutbox {
    /// Spawn the worker task and return the enqueue handle
    pub fn spawn(db: SqlitePool, options: OutboxOptions) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(options.queue_capacity);

        tokio::spawn(async move {
            while let Some(story_id) = rx.recv().await {
                apply_with_retries(&db, &story_id, &options).await;
            }
            debug!("counter outbox worker stopped");
        });

        Self { tx }
    }

    /// Queue an increment for a story's comment counter. Best effort.
    pub fn enqueue(&self, story_id: &str) {
        if let Err(e) = self.tx.try_send(story_id.to_string()) {
            warn!(story_id, "failed to enqueue counter increment: {}", e);
        }
    }
}

async fn apply_with_retries(db: &SqlitePool, story_id: &str, options: &OutboxOptions) {
    let mut attempt = 0;
    loop {
        match apply_increment(db, story_id).await {
            Ok(applied) => {
                if !applied {
                    // Story no longer exists; nothing to converge toward.
                    warn!(story_id, "skipping counter increment for missing story");
                }
                return;
            }
            Err(e) => {
                attempt += 1;
                if attempt > options.max_retries {
                    error!(
                        story_id,
                        "counter increment dropped after {} attempts: {}", attempt, e
                    );
                    return;
                }
                warn!(story_id, attempt, "counter increment failed, retrying: {}", e);
                tokio::time::sleep(options.backoff * attempt).await;
            }
        }
    }
}

/// Apply one increment. Returns false when the story row is gone.
pub async fn apply_increment(db: &SqlitePool, story_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE story SET comments_count = comments_count + 1 WHERE id = ?")
        .bind(story_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}
