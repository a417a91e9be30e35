//! Ambulance dispatch server
//!
//! Configuration: optional YAML file at `DISPATCH_CONFIG`, then `HOST`,
//! `PORT`, `CORS_ORIGINS` and `MONITORING_FEED` from the environment (a
//! `.env` file is read first). Log filtering follows `RUST_LOG`.

use anyhow::Result;
use dispatch::config::DispatchConfig;
use dispatch::server::ServerBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dispatch=info,ambulance_dispatch=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = DispatchConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        origins = ?config.allowed_origins,
        monitoring = ?config.monitoring,
        auth = ?config.auth.mode,
        "Loaded dispatch configuration"
    );

    ServerBuilder::new().with_config(config).serve().await
}
