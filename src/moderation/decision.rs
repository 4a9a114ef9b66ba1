/// Decision Engine
///
/// Applies a moderator's decision to a single comment or a bounded batch.
/// Each decision is one transaction: a conditional status write guarded on
/// the status observed at read time, the resolve-path report batch, and the
/// audit row. Concurrent moderators lose the race with a Conflict rather
/// than silently overwriting each other.

use crate::error::{ModError, ModResult};
use crate::moderation::audit::{AuditEntry, AuditLog};
use crate::moderation::{parse_comment, Comment, Moderator, ModerationStatus, Visibility};
use crate::outbox::CounterOutbox;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

/// A moderator-issued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve,
    Reject,
    Dismiss,
    Resolve,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Approve => "approve",
            DecisionAction::Reject => "reject",
            DecisionAction::Dismiss => "dismiss",
            DecisionAction::Resolve => "resolve",
        }
    }

    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(DecisionAction::Approve),
            "reject" => Ok(DecisionAction::Reject),
            "dismiss" => Ok(DecisionAction::Dismiss),
            "resolve" => Ok(DecisionAction::Resolve),
            _ => Err(ModError::Validation(format!(
                "Invalid moderation action: {}",
                s
            ))),
        }
    }

    /// The deterministic (status, visibility, approved) triple for this action.
    /// `None` means the field is left unchanged.
    pub fn transition(&self) -> Transition {
        match self {
            DecisionAction::Approve => Transition {
                new_status: ModerationStatus::Approved,
                visibility: Some(Visibility::Public),
                approved: Some(true),
            },
            DecisionAction::Reject => Transition {
                new_status: ModerationStatus::Rejected,
                visibility: Some(Visibility::Hidden),
                approved: Some(false),
            },
            DecisionAction::Dismiss => Transition {
                new_status: ModerationStatus::Dismissed,
                visibility: None,
                approved: None,
            },
            DecisionAction::Resolve => Transition {
                new_status: ModerationStatus::Resolved,
                visibility: None,
                approved: None,
            },
        }
    }
}

/// Effects of an action on a comment
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub new_status: ModerationStatus,
    pub visibility: Option<Visibility>,
    pub approved: Option<bool>,
}

/// Result of a single decision
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub comment: Comment,
    pub previous_status: ModerationStatus,
    pub new_status: ModerationStatus,
    pub audit_id: i64,
    /// Pending reports transitioned by a resolve action
    pub reports_resolved: u64,
}

/// A per-item failure within a bulk decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Partial-success result of a bulk decision
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub success: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

/// Decision engine over the content store
#[derive(Clone)]
pub struct DecisionEngine {
    db: SqlitePool,
    outbox: CounterOutbox,
    bulk_limit: usize,
}

impl DecisionEngine {
    pub fn new(db: SqlitePool, outbox: CounterOutbox, bulk_limit: usize) -> Self {
        Self {
            db,
            outbox,
            bulk_limit,
        }
    }

    /// Apply one decision to one comment
    pub async fn decide(
        &self,
        comment_id: &str,
        action: DecisionAction,
        notes: Option<&str>,
        moderator: &Moderator,
    ) -> ModResult<DecisionOutcome> {
        self.decide_inner(comment_id, action, notes, moderator, false)
            .await
    }

    /// Apply one decision to up to `bulk_limit` comments.
    ///
    /// Items are independent: one bad ID lands in `failed` with its reason and
    /// the rest still go through. The size cap is checked before any write.
    pub async fn decide_bulk(
        &self,
        comment_ids: &[String],
        action: DecisionAction,
        notes: Option<&str>,
        moderator: &Moderator,
    ) -> ModResult<BulkOutcome> {
        if comment_ids.is_empty() {
            return Err(ModError::Validation("No comment IDs provided".to_string()));
        }
        if comment_ids.len() > self.bulk_limit {
            return Err(ModError::Validation(format!(
                "Bulk moderation accepts at most {} IDs, got {}",
                self.bulk_limit,
                comment_ids.len()
            )));
        }

        let mut success = Vec::new();
        let mut failed = Vec::new();

        for id in comment_ids {
            match self.decide_inner(id, action, notes, moderator, true).await {
                Ok(_) => success.push(id.clone()),
                Err(e) => failed.push(BulkFailure {
                    id: id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(BulkOutcome { success, failed })
    }

    async fn decide_inner(
        &self,
        comment_id: &str,
        action: DecisionAction,
        notes: Option<&str>,
        moderator: &Moderator,
        bulk: bool,
    ) -> ModResult<DecisionOutcome> {
        let comment = self.fetch_comment(comment_id).await?;
        let previous_status = comment.status;
        let transition = action.transition();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        // Conditional write: the status must still be what we read. A
        // concurrent decision on the same item surfaces as Conflict.
        let result = if let (Some(visibility), Some(approved)) =
            (transition.visibility, transition.approved)
        {
            sqlx::query(
                r#"
                UPDATE comment
                SET status = ?, visibility = ?, approved = ?,
                    moderation_notes = ?, moderated_by = ?, moderated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(transition.new_status.as_str())
            .bind(visibility.as_str())
            .bind(approved)
            .bind(notes)
            .bind(&moderator.id)
            .bind(now.to_rfc3339())
            .bind(comment_id)
            .bind(previous_status.as_str())
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE comment
                SET status = ?, moderation_notes = ?, moderated_by = ?, moderated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(transition.new_status.as_str())
            .bind(notes)
            .bind(&moderator.id)
            .bind(now.to_rfc3339())
            .bind(comment_id)
            .bind(previous_status.as_str())
            .execute(&mut *tx)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(ModError::Conflict(format!(
                "Comment {} changed while deciding (expected status {})",
                comment_id,
                previous_status.as_str()
            )));
        }

        // Resolve closes out every pending report for the comment, atomically
        // with the status write.
        let reports_resolved = if action == DecisionAction::Resolve {
            let updated = sqlx::query(
                r#"
                UPDATE report
                SET status = 'resolved', resolved_by = ?, resolved_at = ?
                WHERE comment_id = ? AND status = 'pending'
                "#,
            )
            .bind(&moderator.id)
            .bind(now.to_rfc3339())
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
            updated.rows_affected()
        } else {
            0
        };

        let audit = AuditLog::append_in_tx(
            &mut tx,
            moderator,
            AuditEntry {
                comment_id: Some(comment_id.to_string()),
                action: action.as_str().to_string(),
                notes: notes.map(String::from),
                previous_status: Some(previous_status.as_str().to_string()),
                new_status: Some(transition.new_status.as_str().to_string()),
                bulk_operation: bulk,
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;

        // Denormalized parent counter: first approval only, applied off the
        // decision path by the outbox worker.
        if action == DecisionAction::Approve && !comment.approved {
            if let Some(story_id) = &comment.story_id {
                self.outbox.enqueue(story_id);
            }
        }

        debug!(
            comment_id,
            action = action.as_str(),
            previous = previous_status.as_str(),
            moderator = %moderator.id,
            "decision applied"
        );

        let updated = self.fetch_comment(comment_id).await?;
        Ok(DecisionOutcome {
            comment: updated,
            previous_status,
            new_status: transition.new_status,
            audit_id: audit.id,
            reports_resolved,
        })
    }

    async fn fetch_comment(&self, comment_id: &str) -> ModResult<Comment> {
        let row = sqlx::query("SELECT * FROM comment WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => parse_comment(&row),
            None => Err(ModError::NotFound(format!(
                "Comment {} not found",
                comment_id
            ))),
        }
    }
}
