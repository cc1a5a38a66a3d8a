//! Shelfmark server binary
use shelfmark::{server, AppContext, CatalogResult, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> CatalogResult<()> {
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(config.logging.env_filter()?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = %config.service.version, "Starting Shelfmark");

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}
