/// API routes and handlers
pub mod comments;
pub mod reports;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(comments::routes())
        .merge(reports::routes())
}
