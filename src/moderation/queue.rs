/// Moderation Query Service
///
/// Assembles the moderator-facing queue by merging two sources: comments
/// whose own moderation status is flagged, and comments referenced by
/// pending reports (flagged only through user reports). The merged set is
/// deduplicated, filtered, re-sorted in memory, and paginated with the same
/// cursor shape as the report listing. The merged set is bounded by a
/// candidate cap, so in-memory sorting stays cheap.

use crate::error::{ModError, ModResult};
use crate::moderation::cursor::Cursor;
use crate::moderation::reports::{parse_report, Report};
use crate::moderation::{parse_comment, Comment, ModerationStatus};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::collections::HashSet;

/// Which statuses the queue shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatusFilter {
    #[default]
    Flagged,
    Pending,
    Reported,
    All,
}

impl QueueStatusFilter {
    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "flagged" => Ok(QueueStatusFilter::Flagged),
            "pending" => Ok(QueueStatusFilter::Pending),
            "reported" => Ok(QueueStatusFilter::Reported),
            "all" => Ok(QueueStatusFilter::All),
            _ => Err(ModError::Validation(format!(
                "Invalid queue status filter: {}",
                s
            ))),
        }
    }

    fn statuses(&self) -> &'static [ModerationStatus] {
        match self {
            QueueStatusFilter::Flagged => &[ModerationStatus::Flagged],
            QueueStatusFilter::Pending => &[ModerationStatus::Pending],
            QueueStatusFilter::Reported => &[ModerationStatus::Reported],
            QueueStatusFilter::All => &[
                ModerationStatus::Flagged,
                ModerationStatus::Pending,
                ModerationStatus::Reported,
            ],
        }
    }

    /// Whether report-referenced comments join the candidate set
    fn includes_reported(&self) -> bool {
        matches!(self, QueueStatusFilter::Reported | QueueStatusFilter::All)
    }
}

/// Sort key for the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueSort {
    #[default]
    Severity,
    CreatedAt,
}

impl QueueSort {
    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "severity" => Ok(QueueSort::Severity),
            "createdat" | "created_at" => Ok(QueueSort::CreatedAt),
            _ => Err(ModError::Validation(format!("Invalid sort: {}", s))),
        }
    }
}

/// Queue request parameters
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub status: QueueStatusFilter,
    pub cursor: Option<Cursor>,
    pub limit: i64,
    pub q: Option<String>,
    pub sort: QueueSort,
}

/// A queue entry: the comment plus its live pending-report count
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedItem {
    #[serde(flatten)]
    pub comment: Comment,
    pub reports_count: i64,
}

/// One page of the moderator queue
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedPage {
    pub items: Vec<FlaggedItem>,
    pub next_cursor: Option<String>,
    pub limit: i64,
    pub has_more: bool,
}

/// Summary of a comment's parent story
#[derive(Debug, Clone, Serialize)]
pub struct StorySummary {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub author_id: String,
}

/// Summary of a comment's author
#[derive(Debug, Clone, Serialize)]
pub struct AuthorSummary {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Full moderation detail for one comment
#[derive(Debug, Clone, Serialize)]
pub struct CommentDetail {
    pub comment: Comment,
    pub reports: Vec<Report>,
    pub story: Option<StorySummary>,
    pub author: Option<AuthorSummary>,
}

/// Queue assembly over the content store
#[derive(Clone)]
pub struct QueueService {
    db: SqlitePool,
    candidate_cap: usize,
}

impl QueueService {
    pub fn new(db: SqlitePool, candidate_cap: usize) -> Self {
        Self { db, candidate_cap }
    }

    /// List flagged/reported comments for the moderator queue
    pub async fn list_flagged(&self, filter: &QueueFilter) -> ModResult<FlaggedPage> {
        let limit = filter.limit.clamp(1, 100);

        // Source 1: comments matching the status filter directly
        let mut comments = self.fetch_by_status(filter).await?;
        let mut seen: HashSet<String> = comments.iter().map(|c| c.id.clone()).collect();

        // Source 2: comments referenced by pending reports, which may not
        // have had their own status updated yet
        if filter.status.includes_reported() {
            for comment_id in self.pending_report_targets().await? {
                if seen.len() >= self.candidate_cap {
                    break;
                }
                if seen.contains(&comment_id) {
                    continue;
                }
                // At most one extra read per report-only ID
                if let Some(comment) = self.fetch_optional_comment(&comment_id).await? {
                    seen.insert(comment_id);
                    comments.push(comment);
                }
            }
        }

        // Free-text filter, case-insensitive substring on content
        if let Some(q) = filter.q.as_deref().filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            comments.retain(|c| c.content.to_lowercase().contains(&needle));
        }

        // The union mixes two independently-ordered sources, so re-sort
        // in memory by the requested key. ID breaks ties for a stable order.
        match filter.sort {
            QueueSort::Severity => comments.sort_by(|a, b| {
                b.highest_score
                    .partial_cmp(&a.highest_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.id.cmp(&a.id))
            }),
            QueueSort::CreatedAt => {
                comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)))
            }
        }

        let start = match &filter.cursor {
            Some(cursor) => match comments.iter().position(|c| c.id == cursor.id) {
                Some(pos) => pos + 1,
                // The cursor item left the queue; resume at the first item
                // sorting strictly after it.
                None => comments
                    .iter()
                    .position(|c| sorts_after(c, cursor, filter.sort))
                    .unwrap_or(comments.len()),
            },
            None => 0,
        };

        let end = (start + limit as usize).min(comments.len());
        let has_more = end < comments.len();
        let page = &comments[start..end];

        let mut items = Vec::with_capacity(page.len());
        for comment in page {
            let reports_count = self.pending_report_count(&comment.id).await?;
            items.push(FlaggedItem {
                comment: comment.clone(),
                reports_count,
            });
        }

        let next_cursor = if has_more {
            items
                .last()
                .map(|item| encode_cursor(&item.comment, filter.sort))
        } else {
            None
        };

        Ok(FlaggedPage {
            items,
            next_cursor,
            limit,
            has_more,
        })
    }

    /// Moderation detail for one comment: its reports, parent story summary,
    /// and author summary
    pub async fn comment_detail(&self, comment_id: &str) -> ModResult<CommentDetail> {
        let comment = self
            .fetch_optional_comment(comment_id)
            .await?
            .ok_or_else(|| ModError::NotFound(format!("Comment {} not found", comment_id)))?;

        let report_rows = sqlx::query(
            "SELECT * FROM report WHERE comment_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(comment_id)
        .fetch_all(&self.db)
        .await?;
        let reports = report_rows
            .iter()
            .map(parse_report)
            .collect::<ModResult<Vec<_>>>()?;

        let story = if let Some(story_id) = &comment.story_id {
            sqlx::query("SELECT id, title, category, author_id FROM story WHERE id = ?")
                .bind(story_id)
                .fetch_optional(&self.db)
                .await?
                .map(|row| StorySummary {
                    id: row.get("id"),
                    title: row.get("title"),
                    category: row.get("category"),
                    author_id: row.get("author_id"),
                })
        } else {
            None
        };

        let author = sqlx::query("SELECT id, name, email, avatar_url FROM author WHERE id = ?")
            .bind(&comment.author_id)
            .fetch_optional(&self.db)
            .await?
            .map(|row| AuthorSummary {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
                avatar_url: row.get("avatar_url"),
            });

        Ok(CommentDetail {
            comment,
            reports,
            story,
            author,
        })
    }

    async fn fetch_by_status(&self, filter: &QueueFilter) -> ModResult<Vec<Comment>> {
        let mut builder = QueryBuilder::new("SELECT * FROM comment WHERE status IN (");
        let mut separated = builder.separated(", ");
        for status in filter.status.statuses() {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");

        match filter.sort {
            QueueSort::Severity => builder.push(" ORDER BY highest_score DESC, id DESC"),
            QueueSort::CreatedAt => builder.push(" ORDER BY created_at DESC, id DESC"),
        };
        builder.push(" LIMIT ").push_bind(self.candidate_cap as i64);

        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(parse_comment).collect()
    }

    /// Comment IDs referenced by pending comment reports
    async fn pending_report_targets(&self) -> ModResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT comment_id FROM report
            WHERE status = 'pending' AND target_type = 'comment' AND comment_id IS NOT NULL
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    async fn fetch_optional_comment(&self, comment_id: &str) -> ModResult<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comment WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(parse_comment).transpose()
    }

    async fn pending_report_count(&self, comment_id: &str) -> ModResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM report WHERE comment_id = ? AND status = 'pending'",
        )
        .bind(comment_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }
}

fn sort_key(comment: &Comment, sort: QueueSort) -> String {
    match sort {
        QueueSort::Severity => format!("{:020.6}", comment.highest_score),
        QueueSort::CreatedAt => comment.created_at.to_rfc3339(),
    }
}

fn encode_cursor(comment: &Comment, sort: QueueSort) -> String {
    Cursor::new(sort_key(comment, sort), comment.id.clone()).encode()
}

/// Whether `comment` sorts strictly after the cursor position in the
/// descending order used by the queue
fn sorts_after(comment: &Comment, cursor: &Cursor, sort: QueueSort) -> bool {
    let key = sort_key(comment, sort);
    key < cursor.sort_key || (key == cursor.sort_key && comment.id < cursor.id)
}
