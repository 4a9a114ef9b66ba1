/// Modwatch - moderation workflow service
///
/// Library surface for the binary and the integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod moderation;
pub mod outbox;
pub mod server;
