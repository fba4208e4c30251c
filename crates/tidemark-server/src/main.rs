//! Tidemark server binary

use tidemark_server::{init_server, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load()?;
    let addr = format!("{}:{}", config.host, config.port);
    let app = init_server(config).await.map_err(|e| anyhow::anyhow!(e))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "tidemark server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
