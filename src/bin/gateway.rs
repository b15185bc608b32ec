//! Feedback gateway server
//!
//! Configuration comes from the environment (see `GatewayConfig::from_env`); log
//! verbosity from `RUST_LOG`, defaulting to `info`.

use anyhow::Context;
use feedback_gateway::{Gateway, GatewayConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    tracing::info!(
        bind = %config.bind_addr,
        admin = %config.admin_service_url,
        feedback = %config.feedback_service_url,
        timeout_ms = config.upstream_timeout.as_millis() as u64,
        "Starting feedback gateway"
    );

    Gateway::builder()
        .with_config(config)
        .build()
        .context("failed to build gateway")?
        .serve()
        .await
        .context("gateway server failed")?;

    Ok(())
}
