/// Authentication extractors
///
/// The upstream gateway authenticates moderators and injects their identity
/// as trusted headers. This service does not verify roles itself; it only
/// requires that an identity is present on write paths, and threads it
/// explicitly through the engines for audit stamping.

use crate::{context::AppContext, error::ModError, moderation::Moderator};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const MODERATOR_ID_HEADER: &str = "x-moderator-id";
pub const MODERATOR_EMAIL_HEADER: &str = "x-moderator-email";

#[async_trait]
impl FromRequestParts<AppContext> for Moderator {
    type Rejection = ModError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(MODERATOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ModError::Authentication("Missing moderator identity header".to_string())
            })?
            .to_string();

        let email = parts
            .headers
            .get(MODERATOR_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(Moderator { id, email })
    }
}
