/// Modwatch - moderation workflow service
///
/// Serves the moderator queue, the decision engine, and report resolution
/// for a community platform, over SQLite with an append-only audit ledger.

use modwatch::{config::ServerConfig, context::AppContext, error::ModResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ModResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}
