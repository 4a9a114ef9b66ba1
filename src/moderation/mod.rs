/// Moderation Workflow Core
///
/// Covers the moderator-facing queue, the per-item decision state machine,
/// bulk decisions, report resolution, and the append-only audit ledger.

pub mod audit;
pub mod cursor;
pub mod decision;
pub mod queue;
pub mod reports;

pub use audit::{AuditLog, AuditRecord};
pub use cursor::Cursor;
pub use decision::{BulkOutcome, DecisionAction, DecisionEngine, DecisionOutcome};
pub use queue::{FlaggedPage, QueueFilter, QueueService, QueueSort, QueueStatusFilter};
pub use reports::{Report, ReportService, ReportStatus, ResolutionOutcome};

use crate::error::{ModError, ModResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// The acting moderator, injected by the upstream gateway and threaded
/// explicitly through every write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moderator {
    pub id: String,
    pub email: Option<String>,
}

/// Moderation status of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Flagged,
    Reported,
    Approved,
    Rejected,
    Dismissed,
    Resolved,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Flagged => "flagged",
            ModerationStatus::Reported => "reported",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
            ModerationStatus::Dismissed => "dismissed",
            ModerationStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ModerationStatus::Pending),
            "flagged" => Ok(ModerationStatus::Flagged),
            "reported" => Ok(ModerationStatus::Reported),
            "approved" => Ok(ModerationStatus::Approved),
            "rejected" => Ok(ModerationStatus::Rejected),
            "dismissed" => Ok(ModerationStatus::Dismissed),
            "resolved" => Ok(ModerationStatus::Resolved),
            _ => Err(ModError::Validation(format!(
                "Invalid moderation status: {}",
                s
            ))),
        }
    }
}

/// Content visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Hidden,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Hidden => "hidden",
        }
    }

    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "hidden" => Ok(Visibility::Hidden),
            _ => Err(ModError::Validation(format!("Invalid visibility: {}", s))),
        }
    }
}

/// What a report points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Comment,
    Story,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Comment => "comment",
            TargetType::Story => "story",
        }
    }

    pub fn from_str(s: &str) -> ModResult<Self> {
        match s.to_lowercase().as_str() {
            "comment" => Ok(TargetType::Comment),
            "story" => Ok(TargetType::Story),
            _ => Err(ModError::Validation(format!("Invalid target type: {}", s))),
        }
    }
}

/// A moderatable comment with its moderation sub-record flattened in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub story_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: ModerationStatus,
    pub highest_score: f64,
    pub moderation_notes: Option<String>,
    pub moderated_by: Option<String>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub approved: bool,
    pub visibility: Visibility,
}

/// Parse a required RFC 3339 timestamp column
pub(crate) fn parse_timestamp(raw: &str) -> ModResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ModError::Internal(format!("Invalid timestamp: {}", e)))
}

/// Parse an optional RFC 3339 timestamp column
pub(crate) fn parse_optional_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> Option<DateTime<Utc>> {
    row.try_get::<String, _>(column)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a comment row into a Comment
pub(crate) fn parse_comment(row: &sqlx::sqlite::SqliteRow) -> ModResult<Comment> {
    let status_str: String = row.get("status");
    let status = ModerationStatus::from_str(&status_str)?;

    let visibility_str: String = row.get("visibility");
    let visibility = Visibility::from_str(&visibility_str)?;

    let created_at_str: String = row.get("created_at");
    let created_at = parse_timestamp(&created_at_str)?;

    Ok(Comment {
        id: row.get("id"),
        story_id: row.get("story_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        created_at,
        status,
        highest_score: row.get("highest_score"),
        moderation_notes: row.get("moderation_notes"),
        moderated_by: row.get("moderated_by"),
        moderated_at: parse_optional_timestamp(row, "moderated_at"),
        approved: row.get("approved"),
        visibility,
    })
}
