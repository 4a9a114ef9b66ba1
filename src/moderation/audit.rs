/// Append-only audit ledger
///
/// Every decision and report resolution writes exactly one row here, inside
/// the same transaction as the status change. Rows are never updated or
/// deleted; a failed audit insert aborts the whole operation.

use crate::error::ModResult;
use crate::moderation::{parse_timestamp, Moderator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// One ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub comment_id: Option<String>,
    pub report_id: Option<String>,
    pub moderator_id: String,
    pub moderator_email: Option<String>,
    pub action: String,
    pub notes: Option<String>,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub bulk_operation: bool,
    pub triggered_comment_action: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields of a ledger entry the caller controls
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub comment_id: Option<String>,
    pub report_id: Option<String>,
    pub action: String,
    pub notes: Option<String>,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub bulk_operation: bool,
    pub triggered_comment_action: bool,
}

/// Audit ledger access
#[derive(Clone)]
pub struct AuditLog {
    db: SqlitePool,
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append an entry within an open transaction.
    ///
    /// The caller owns the transaction so the status write and its audit row
    /// commit together or not at all.
    pub async fn append_in_tx(
        conn: &mut SqliteConnection,
        moderator: &Moderator,
        entry: AuditEntry,
    ) -> ModResult<AuditRecord> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO audit_log
            (comment_id, report_id, moderator_id, moderator_email, action, notes,
             previous_status, new_status, bulk_operation, triggered_comment_action, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.comment_id)
        .bind(&entry.report_id)
        .bind(&moderator.id)
        .bind(&moderator.email)
        .bind(&entry.action)
        .bind(&entry.notes)
        .bind(&entry.previous_status)
        .bind(&entry.new_status)
        .bind(entry.bulk_operation)
        .bind(entry.triggered_comment_action)
        .bind(now.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        Ok(AuditRecord {
            id: result.last_insert_rowid(),
            comment_id: entry.comment_id,
            report_id: entry.report_id,
            moderator_id: moderator.id.clone(),
            moderator_email: moderator.email.clone(),
            action: entry.action,
            notes: entry.notes,
            previous_status: entry.previous_status,
            new_status: entry.new_status,
            bulk_operation: entry.bulk_operation,
            triggered_comment_action: entry.triggered_comment_action,
            created_at: now,
        })
    }

    /// Ledger entries for one comment, newest first
    pub async fn for_comment(&self, comment_id: &str) -> ModResult<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, comment_id, report_id, moderator_id, moderator_email, action, notes,
                   previous_status, new_status, bulk_operation, triggered_comment_action, created_at
            FROM audit_log
            WHERE comment_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(comment_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_audit_record).collect()
    }

    /// Ledger entries for one report, newest first
    pub async fn for_report(&self, report_id: &str) -> ModResult<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, comment_id, report_id, moderator_id, moderator_email, action, notes,
                   previous_status, new_status, bulk_operation, triggered_comment_action, created_at
            FROM audit_log
            WHERE report_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_audit_record).collect()
    }
}

fn parse_audit_record(row: &sqlx::sqlite::SqliteRow) -> ModResult<AuditRecord> {
    let created_at_str: String = row.get("created_at");
    let created_at = parse_timestamp(&created_at_str)?;

    Ok(AuditRecord {
        id: row.get("id"),
        comment_id: row.get("comment_id"),
        report_id: row.get("report_id"),
        moderator_id: row.get("moderator_id"),
        moderator_email: row.get("moderator_email"),
        action: row.get("action"),
        notes: row.get("notes"),
        previous_status: row.get("previous_status"),
        new_status: row.get("new_status"),
        bulk_operation: row.get("bulk_operation"),
        triggered_comment_action: row.get("triggered_comment_action"),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn moderator() -> Moderator {
        Moderator {
            id: "mod-1".to_string(),
            email: Some("mod@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_append_and_fetch() {
        let pool = create_test_pool().await.unwrap();
        let log = AuditLog::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        let record = AuditLog::append_in_tx(
            &mut tx,
            &moderator(),
            AuditEntry {
                comment_id: Some("c1".to_string()),
                action: "approve".to_string(),
                notes: Some("ok".to_string()),
                previous_status: Some("flagged".to_string()),
                new_status: Some("approved".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(record.action, "approve");
        assert!(!record.bulk_operation);

        let entries = log.for_comment("c1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].previous_status.as_deref(), Some("flagged"));
        assert_eq!(entries[0].new_status.as_deref(), Some("approved"));
        assert_eq!(entries[0].moderator_email.as_deref(), Some("mod@example.com"));
    }

    #[tokio::test]
    async fn test_rolled_back_transaction_leaves_no_entry() {
        let pool = create_test_pool().await.unwrap();
        let log = AuditLog::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        AuditLog::append_in_tx(
            &mut tx,
            &moderator(),
            AuditEntry {
                comment_id: Some("c2".to_string()),
                action: "reject".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        assert!(log.for_comment("c2").await.unwrap().is_empty());
    }
}
