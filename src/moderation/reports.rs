/// Report Resolution Engine
///
/// Reports are the atomic unit reporters create. Resolving one is a
/// lighter-weight action than a full moderation decision: the optional
/// cascade writes only the comment's moderation status, never its
/// visibility or approved flag.

use crate::error::{ModError, ModResult};
use crate::moderation::audit::{AuditEntry, AuditLog};
use crate::moderation::cursor::Cursor;
use crate::moderation::{parse_optional_timestamp, parse_timestamp, Moderator, TargetType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, SqlitePool};
use tracing::{debug, warn};

/// Report lifecycle. Transitions only pending -> {resolved, dismissed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            _ => Err(ModError::Validation(format!("Invalid report status: {}", s))),
        }
    }
}

/// Terminal actions a moderator may take on a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Resolved,
    Dismissed,
}

impl ReportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportAction::Resolved => "resolved",
            ReportAction::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "resolved" => Ok(ReportAction::Resolved),
            "dismissed" => Ok(ReportAction::Dismissed),
            _ => Err(ModError::Validation(format!(
                "Invalid report action: {} (expected resolved or dismissed)",
                s
            ))),
        }
    }

    fn as_status(&self) -> ReportStatus {
        match self {
            ReportAction::Resolved => ReportStatus::Resolved,
            ReportAction::Dismissed => ReportStatus::Dismissed,
        }
    }
}

/// A user-submitted report referencing exactly one content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub comment_id: Option<String>,
    pub story_id: Option<String>,
    pub target_type: TargetType,
    pub reason: String,
    pub status: ReportStatus,
    pub reported_by: String,
    pub created_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

/// Result of resolving a single report
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    pub report: Report,
    /// Whether the cascade actually wrote the referenced comment
    pub cascade_applied: bool,
    pub audit_id: i64,
}

/// One page of reports
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub next_cursor: Option<String>,
    pub limit: i64,
    pub has_more: bool,
}

/// Report engine over the content store
#[derive(Clone)]
pub struct ReportService {
    db: SqlitePool,
}

impl ReportService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Resolve or dismiss one report, optionally cascading the status to the
    /// reported comment.
    pub async fn resolve_report(
        &self,
        report_id: &str,
        action: ReportAction,
        notes: Option<&str>,
        trigger_comment_action: bool,
        moderator: &Moderator,
    ) -> ModResult<ResolutionOutcome> {
        let report = self.fetch_report(report_id).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        // A report leaves pending exactly once.
        let result = sqlx::query(
            r#"
            UPDATE report
            SET status = ?, resolved_by = ?, resolved_at = ?, resolution_notes = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(action.as_status().as_str())
        .bind(&moderator.id)
        .bind(now.to_rfc3339())
        .bind(notes)
        .bind(report_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ModError::Conflict(format!(
                "Report {} is already {}",
                report_id,
                report.status.as_str()
            )));
        }

        // Optional cascade. Writes only the moderation status; a full
        // decision through the decision engine is needed to change
        // visibility or approval. Missing comments are skipped.
        let mut cascade_applied = false;
        if trigger_comment_action {
            if let Some(comment_id) = &report.comment_id {
                let cascade = sqlx::query("UPDATE comment SET status = ? WHERE id = ?")
                    .bind(action.as_status().as_str())
                    .bind(comment_id)
                    .execute(&mut *tx)
                    .await?;
                cascade_applied = cascade.rows_affected() > 0;
                if !cascade_applied {
                    warn!(report_id, comment_id = %comment_id, "cascade skipped, comment gone");
                }
            }
        }

        let audit = AuditLog::append_in_tx(
            &mut tx,
            moderator,
            AuditEntry {
                report_id: Some(report_id.to_string()),
                action: format!("report_{}", action.as_str()),
                notes: notes.map(String::from),
                previous_status: Some(ReportStatus::Pending.as_str().to_string()),
                new_status: Some(action.as_status().as_str().to_string()),
                triggered_comment_action: cascade_applied,
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;

        debug!(
            report_id,
            action = action.as_str(),
            cascade_applied,
            moderator = %moderator.id,
            "report resolved"
        );

        let report = self.fetch_report(report_id).await?;
        Ok(ResolutionOutcome {
            report,
            cascade_applied,
            audit_id: audit.id,
        })
    }

    /// Filtered, cursor-paginated report listing, newest first.
    ///
    /// The cursor resolves natively in SQL with a (created_at, id) tuple
    /// predicate, so the page is stable under inserts ahead of it.
    pub async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        target_type: Option<TargetType>,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> ModResult<ReportPage> {
        let limit = limit.clamp(1, 100);

        let mut builder = QueryBuilder::new(
            "SELECT id, comment_id, story_id, target_type, reason, status, reported_by, \
             created_at, resolved_by, resolved_at, resolution_notes FROM report WHERE 1 = 1",
        );

        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(target_type) = target_type {
            builder
                .push(" AND target_type = ")
                .push_bind(target_type.as_str());
        }
        if let Some(cursor) = &cursor {
            builder
                .push(" AND (created_at < ")
                .push_bind(cursor.sort_key.clone())
                .push(" OR (created_at = ")
                .push_bind(cursor.sort_key.clone())
                .push(" AND id < ")
                .push_bind(cursor.id.clone())
                .push("))");
        }

        // Fetch one past the page to learn whether more remain
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit + 1);

        let rows = builder.build().fetch_all(&self.db).await?;

        let has_more = rows.len() as i64 > limit;
        let mut reports = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.iter().take(limit as usize) {
            reports.push(parse_report(row)?);
        }

        let next_cursor = if has_more {
            reports
                .last()
                .map(|r| Cursor::new(r.created_at.to_rfc3339(), r.id.clone()).encode())
        } else {
            None
        };

        Ok(ReportPage {
            reports,
            next_cursor,
            limit,
            has_more,
        })
    }

    async fn fetch_report(&self, report_id: &str) -> ModResult<Report> {
        let row = sqlx::query("SELECT * FROM report WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => parse_report(&row),
            None => Err(ModError::NotFound(format!("Report {} not found", report_id))),
        }
    }
}

/// Parse a report row into a Report
pub(crate) fn parse_report(row: &sqlx::sqlite::SqliteRow) -> ModResult<Report> {
    let target_type_str: String = row.get("target_type");
    let target_type = TargetType::from_str(&target_type_str)?;

    let status_str: String = row.get("status");
    let status = ReportStatus::from_str(&status_str)?;

    let created_at_str: String = row.get("created_at");
    let created_at = parse_timestamp(&created_at_str)?;

    Ok(Report {
        id: row.get("id"),
        comment_id: row.get("comment_id"),
        story_id: row.get("story_id"),
        target_type,
        reason: row.get("reason"),
        status,
        reported_by: row.get("reported_by"),
        created_at,
        resolved_by: row.get("resolved_by"),
        resolved_at: parse_optional_timestamp(row, "resolved_at"),
        resolution_notes: row.get("resolution_notes"),
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

    async fn seed_comment(pool: &SqlitePool, id: &str, status: &str) {
        sqlx::query(
            "INSERT INTO comment (id, author_id, content, created_at, status) VALUES (?, 'a1', 'text', ?, ?)",
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_report_at(pool: &SqlitePool, id: &str, comment_id: Option<&str>, created_at: &str) {
        sqlx::query(
            r#"
            INSERT INTO report (id, comment_id, target_type, reason, status, reported_by, created_at)
            VALUES (?, ?, 'comment', 'spam', 'pending', 'u1', ?)
            "#,
        )
        .bind(id)
        .bind(comment_id)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_dismiss_without_cascade_leaves_comment_alone() {
        let pool = create_test_pool().await.unwrap();
        seed_comment(&pool, "c1", "reported").await;
        seed_report_at(&pool, "r1", Some("c1"), &Utc::now().to_rfc3339()).await;
        let service = ReportService::new(pool.clone());

        let outcome = service
            .resolve_report("r1", ReportAction::Dismissed, Some("spam"), false, &moderator())
            .await
            .unwrap();

        assert_eq!(outcome.report.status, ReportStatus::Dismissed);
        assert!(!outcome.cascade_applied);
        assert_eq!(outcome.report.resolution_notes.as_deref(), Some("spam"));

        let comment_status: String = sqlx::query_scalar("SELECT status FROM comment WHERE id = 'c1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(comment_status, "reported");

        let log = AuditLog::new(pool.clone());
        let entries = log.for_report("r1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "report_dismissed");
        assert!(!entries[0].triggered_comment_action);
    }

    #[tokio::test]
    async fn test_resolve_with_cascade_updates_comment_status_only() {
        let pool = create_test_pool().await.unwrap();
        seed_comment(&pool, "c1", "reported").await;
        seed_report_at(&pool, "r1", Some("c1"), &Utc::now().to_rfc3339()).await;
        let service = ReportService::new(pool.clone());

        let outcome = service
            .resolve_report("r1", ReportAction::Resolved, None, true, &moderator())
            .await
            .unwrap();
        assert!(outcome.cascade_applied);

        let (status, visibility, approved): (String, String, bool) = sqlx::query_as(
            "SELECT status, visibility, approved FROM comment WHERE id = 'c1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "resolved");
        // Cascade never touches visibility or approval
        assert_eq!(visibility, "public");
        assert!(!approved);
    }

    #[tokio::test]
    async fn test_cascade_on_missing_comment_still_resolves() {
        let pool = create_test_pool().await.unwrap();
        seed_report_at(&pool, "r1", Some("gone"), &Utc::now().to_rfc3339()).await;
        let service = ReportService::new(pool.clone());

        let outcome = service
            .resolve_report("r1", ReportAction::Resolved, None, true, &moderator())
            .await
            .unwrap();

        assert_eq!(outcome.report.status, ReportStatus::Resolved);
        assert!(!outcome.cascade_applied);

        let log = AuditLog::new(pool.clone());
        let entries = log.for_report("r1").await.unwrap();
        assert!(!entries[0].triggered_comment_action);
    }

    #[tokio::test]
    async fn test_resolving_twice_conflicts() {
        let pool = create_test_pool().await.unwrap();
        seed_report_at(&pool, "r1", None, &Utc::now().to_rfc3339()).await;
        let service = ReportService::new(pool.clone());

        service
            .resolve_report("r1", ReportAction::Resolved, None, false, &moderator())
            .await
            .unwrap();
        let err = service
            .resolve_report("r1", ReportAction::Dismissed, None, false, &moderator())
            .await
            .unwrap_err();
        assert!(matches!(err, ModError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let pool = create_test_pool().await.unwrap();
        let service = ReportService::new(pool);

        let err = service
            .resolve_report("ghost", ReportAction::Resolved, None, false, &moderator())
            .await
            .unwrap_err();
        assert!(matches!(err, ModError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_reports_paginates_to_exhaustion() {
        let pool = create_test_pool().await.unwrap();
        for i in 0..5 {
            let ts = format!("2026-01-0{}T10:00:00+00:00", i + 1);
            seed_report_at(&pool, &format!("r{}", i), None, &ts).await;
        }
        let service = ReportService::new(pool);

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = service
                .list_reports(Some(ReportStatus::Pending), None, cursor, 2)
                .await
                .unwrap();
            seen.extend(page.reports.iter().map(|r| r.id.clone()));
            if !page.has_more {
                break;
            }
            cursor = Some(Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap());
        }

        // Newest first, no duplicates, no omissions
        assert_eq!(seen, vec!["r4", "r3", "r2", "r1", "r0"]);
    }

    #[tokio::test]
    async fn test_list_reports_filters_by_type() {
        let pool = create_test_pool().await.unwrap();
        seed_report_at(&pool, "r1", Some("c1"), &Utc::now().to_rfc3339()).await;
        sqlx::query(
            r#"
            INSERT INTO report (id, story_id, target_type, reason, status, reported_by, created_at)
            VALUES ('r2', 's1', 'story', 'spam', 'pending', 'u1', ?)
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();
        let service = ReportService::new(pool);

        let page = service
            .list_reports(None, Some(TargetType::Story), None, 20)
            .await
            .unwrap();
        assert_eq!(page.reports.len(), 1);
        assert_eq!(page.reports[0].id, "r2");
        assert!(!page.has_more);
    }
}
