//! Call center router binary
//!
//! Boots the routing core from environment configuration: connects to the
//! shared store and the media server, reconciles store state, then serves
//! channel events until the control transport drops.

use tracing::info;
use tracing_subscriber::EnvFilter;

use dialer_call_engine::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CallCenterConfig::from_env()?;

    let filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting dialer call engine (app: {}, store: {}:{})",
        config.ari.app_name, config.redis.host, config.redis.port
    );

    let server = CallCenterServerBuilder::new()
        .with_config(config)
        .build()
        .await?;

    // A dropped control transport is fatal; the supervisor restarts us.
    server.run().await?;
    Ok(())
}
