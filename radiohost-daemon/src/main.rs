//! radiohost daemon: one Lua context per session behind a REST API.

use anyhow::Context as _;
use radiohost_core::ContextConfig;
use radiohost_daemon::{build_app, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = std::env::var("RADIOHOST_PORT").unwrap_or_else(|_| "7421".to_string());
    let config = ContextConfig::from_env().context("read context configuration")?;
    tracing::info!(library_path = ?config.library_path, memory_limit = ?config.memory_limit, "context configuration");

    let app = build_app(AppState::new(config));
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("radiohost daemon listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
