/// Report endpoints
///
/// Listing and resolution of user-submitted reports. Resolution may cascade
/// a status change to the reported comment.

use crate::{
    context::AppContext,
    db::with_deadline,
    error::ModResult,
    moderation::{reports::ReportAction, Cursor, Moderator, ReportStatus, TargetType},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build report routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/moderation/reports/comments", get(list_reports))
        .route("/api/moderation/reports/:report_id", put(resolve_report))
}

#[derive(Debug, Deserialize)]
struct ListReportsQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "type")]
    target_type: Option<String>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

/// List reports, filtered and cursor-paginated
async fn list_reports(
    State(ctx): State<AppContext>,
    Query(query): Query<ListReportsQuery>,
) -> ModResult<Json<Value>> {
    let status = query
        .status
        .as_deref()
        .map(ReportStatus::from_str)
        .transpose()?;
    let target_type = query
        .target_type
        .as_deref()
        .map(TargetType::from_str)
        .transpose()?;
    let cursor = query.cursor.as_deref().map(Cursor::decode).transpose()?;

    let page = with_deadline(
        ctx.store_deadline,
        ctx.reports
            .list_reports(status, target_type, cursor, query.limit.unwrap_or(20)),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "reports": page.reports,
        "next_cursor": page.next_cursor,
        "limit": page.limit,
        "has_more": page.has_more,
    })))
}

#[derive(Debug, Deserialize)]
struct ResolveReportRequest {
    action: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    trigger_comment_action: bool,
}

/// Resolve or dismiss one report
async fn resolve_report(
    State(ctx): State<AppContext>,
    moderator: Moderator,
    Path(report_id): Path<String>,
    Json(req): Json<ResolveReportRequest>,
) -> ModResult<Json<Value>> {
    let action = ReportAction::from_str(&req.action)?;

    let outcome = with_deadline(
        ctx.store_deadline,
        ctx.reports.resolve_report(
            &report_id,
            action,
            req.notes.as_deref(),
            req.trigger_comment_action,
            &moderator,
        ),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "report": outcome.report,
        "triggered_comment_action": outcome.cascade_applied,
        "audit_id": outcome.audit_id,
    })))
}
