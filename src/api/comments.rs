/// Comment moderation endpoints
///
/// The moderator queue, per-comment detail, and the single/bulk decision
/// paths. Writes require the injected moderator identity.

use crate::{
    context::AppContext,
    db::with_deadline,
    error::ModResult,
    moderation::{Cursor, DecisionAction, Moderator, QueueFilter, QueueSort, QueueStatusFilter},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build comment moderation routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/moderation/comments", get(list_comments))
        .route("/api/moderation/comments/bulk", post(bulk_decision))
        .route(
            "/api/moderation/comments/:id",
            get(comment_detail).put(single_decision),
        )
}

#[derive(Debug, Deserialize)]
struct ListCommentsQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    sort: Option<String>,
}

/// List flagged/reported comments for the moderator queue
async fn list_comments(
    State(ctx): State<AppContext>,
    Query(query): Query<ListCommentsQuery>,
) -> ModResult<Json<Value>> {
    let status = match query.status.as_deref() {
        Some(s) => QueueStatusFilter::from_str(s)?,
        None => QueueStatusFilter::default(),
    };
    let sort = match query.sort.as_deref() {
        Some(s) => QueueSort::from_str(s)?,
        None => QueueSort::default(),
    };
    let cursor = query.cursor.as_deref().map(Cursor::decode).transpose()?;

    let filter = QueueFilter {
        status,
        cursor,
        limit: query.limit.unwrap_or(20),
        q: query.q,
        sort,
    };

    let page = with_deadline(ctx.store_deadline, ctx.queue.list_flagged(&filter)).await?;

    Ok(Json(json!({
        "success": true,
        "comments": page.items,
        "next_cursor": page.next_cursor,
        "limit": page.limit,
        "has_more": page.has_more,
    })))
}

/// Moderation detail for one comment
async fn comment_detail(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ModResult<Json<Value>> {
    let detail = with_deadline(ctx.store_deadline, ctx.queue.comment_detail(&id)).await?;

    Ok(Json(json!({
        "success": true,
        "comment": detail.comment,
        "reports": detail.reports,
        "story": detail.story,
        "author": detail.author,
    })))
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    action: String,
    #[serde(default)]
    notes: Option<String>,
}

/// Apply a decision to one comment
async fn single_decision(
    State(ctx): State<AppContext>,
    moderator: Moderator,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> ModResult<Json<Value>> {
    let action = DecisionAction::from_str(&req.action)?;

    let outcome = with_deadline(
        ctx.store_deadline,
        ctx.decisions
            .decide(&id, action, req.notes.as_deref(), &moderator),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "comment": outcome.comment,
        "previous_status": outcome.previous_status,
        "new_status": outcome.new_status,
        "reports_resolved": outcome.reports_resolved,
        "audit_id": outcome.audit_id,
    })))
}

#[derive(Debug, Deserialize)]
struct BulkDecisionRequest {
    ids: Vec<String>,
    action: String,
    #[serde(default)]
    notes: Option<String>,
}

/// Apply one decision to up to 100 comments with partial-success semantics
async fn bulk_decision(
    State(ctx): State<AppContext>,
    moderator: Moderator,
    Json(req): Json<BulkDecisionRequest>,
) -> ModResult<Json<Value>> {
    let action = DecisionAction::from_str(&req.action)?;

    let outcome = with_deadline(
        ctx.store_deadline,
        ctx.decisions
            .decide_bulk(&req.ids, action, req.notes.as_deref(), &moderator),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "applied": outcome.success,
        "failed": outcome.failed,
    })))
}
