/// End-to-end tests for the moderation HTTP surface
///
/// Each test builds the real router over a fresh on-disk SQLite database and
/// drives it with in-process requests.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Utc;
use modwatch::config::{
    LoggingConfig, ModerationConfig, ServerConfig, ServiceConfig, StorageConfig,
};
use modwatch::context::AppContext;
use modwatch::server::build_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_context() -> (AppContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: dir.path().to_path_buf(),
            database: dir.path().join("moderation.sqlite"),
            store_timeout_ms: 5000,
        },
        moderation: ModerationConfig {
            queue_candidate_cap: 1000,
            bulk_limit: 100,
            outbox_max_retries: 3,
            outbox_backoff_ms: 10,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    };

    let ctx = AppContext::new(config).await.unwrap();
    (ctx, dir)
}

async fn seed_comment(ctx: &AppContext, id: &str, story_id: Option<&str>, status: &str) {
    sqlx::query(
        r#"
        INSERT INTO comment (id, story_id, author_id, content, created_at, status, highest_score)
        VALUES (?, ?, 'a1', 'questionable text', ?, ?, 0.7)
        "#,
    )
    .bind(id)
    .bind(story_id)
    .bind(Utc::now().to_rfc3339())
    .bind(status)
    .execute(&ctx.db)
    .await
    .unwrap();
}

async fn seed_report(ctx: &AppContext, id: &str, comment_id: &str) {
    sqlx::query(
        r#"
        INSERT INTO report (id, comment_id, target_type, reason, status, reported_by, created_at)
        VALUES (?, ?, 'comment', 'spam', 'pending', 'u1', ?)
        "#,
    )
    .bind(id)
    .bind(comment_id)
    .bind(Utc::now().to_rfc3339())
    .execute(&ctx.db)
    .await
    .unwrap();
}

fn authed(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-moderator-id", "mod-1")
        .header("x-moderator-email", "mod@example.com");

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn approve_flow_updates_comment_counter_and_audit() {
    let (ctx, _dir) = test_context().await;
    sqlx::query("INSERT INTO story (id, title, author_id, comments_count) VALUES ('s1', 'Story', 'a1', 0)")
        .execute(&ctx.db)
        .await
        .unwrap();
    seed_comment(&ctx, "c1", Some("s1"), "flagged").await;
    let app = build_router(ctx.clone());

    let response = app
        .oneshot(authed(
            Method::PUT,
            "/api/moderation/comments/c1",
            Some(json!({"action": "approve", "notes": "ok"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["comment"]["approved"], true);
    assert_eq!(body["comment"]["visibility"], "public");
    assert_eq!(body["previous_status"], "flagged");
    assert_eq!(body["new_status"], "approved");

    // The counter increment is asynchronous
    for _ in 0..50 {
        let count: i64 = sqlx::query_scalar("SELECT comments_count FROM story WHERE id = 's1'")
            .fetch_one(&ctx.db)
            .await
            .unwrap();
        if count == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let count: i64 = sqlx::query_scalar("SELECT comments_count FROM story WHERE id = 's1'")
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let entries = ctx.audit.for_comment("c1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].previous_status.as_deref(), Some("flagged"));
    assert_eq!(entries[0].new_status.as_deref(), Some("approved"));
    assert_eq!(entries[0].moderator_id, "mod-1");
}

#[tokio::test]
async fn queue_lists_reported_comments_with_counts() {
    let (ctx, _dir) = test_context().await;
    seed_comment(&ctx, "c1", None, "pending").await;
    seed_report(&ctx, "r1", "c1").await;
    seed_report(&ctx, "r2", "c1").await;
    let app = build_router(ctx);

    let response = app
        .oneshot(authed(
            Method::GET,
            "/api/moderation/comments?status=reported",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);
    assert_eq!(body["comments"][0]["id"], "c1");
    assert_eq!(body["comments"][0]["reports_count"], 2);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn decision_without_identity_is_rejected() {
    let (ctx, _dir) = test_context().await;
    seed_comment(&ctx, "c1", None, "flagged").await;
    let app = build_router(ctx);

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/moderation/comments/c1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"action": "approve"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["error"], "AuthenticationRequired");
}

#[tokio::test]
async fn invalid_action_is_a_validation_error() {
    let (ctx, _dir) = test_context().await;
    seed_comment(&ctx, "c1", None, "flagged").await;
    let app = build_router(ctx);

    let response = app
        .oneshot(authed(
            Method::PUT,
            "/api/moderation/comments/c1",
            Some(json!({"action": "obliterate"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await;
    assert_eq!(body["error"], "InvalidRequest");
}

#[tokio::test]
async fn bulk_decision_reports_partial_success() {
    let (ctx, _dir) = test_context().await;
    seed_comment(&ctx, "c1", None, "flagged").await;
    seed_comment(&ctx, "c2", None, "flagged").await;
    let app = build_router(ctx);

    let response = app
        .oneshot(authed(
            Method::POST,
            "/api/moderation/comments/bulk",
            Some(json!({"ids": ["c1", "ghost", "c2"], "action": "reject"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["applied"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"].as_array().unwrap().len(), 1);
    assert_eq!(body["failed"][0]["id"], "ghost");
}

#[tokio::test]
async fn dismissing_report_leaves_comment_unchanged() {
    let (ctx, _dir) = test_context().await;
    seed_comment(&ctx, "c1", None, "reported").await;
    seed_report(&ctx, "r1", "c1").await;
    let app = build_router(ctx.clone());

    let response = app
        .oneshot(authed(
            Method::PUT,
            "/api/moderation/reports/r1",
            Some(json!({
                "action": "dismissed",
                "notes": "spam",
                "trigger_comment_action": false
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["report"]["status"], "dismissed");
    assert_eq!(body["triggered_comment_action"], false);

    let status: String = sqlx::query_scalar("SELECT status FROM comment WHERE id = 'c1'")
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(status, "reported");

    let entries = ctx.audit.for_report("r1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "report_dismissed");
}

#[tokio::test]
async fn detail_returns_not_found_for_unknown_comment() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);

    let response = app
        .oneshot(authed(Method::GET, "/api/moderation/comments/ghost", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);

    let response = app
        .oneshot(authed(Method::GET, "/api/nope", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = read_json(response).await;
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
}
