//! # Tidemark Server
//!
//! The HTTP surface of the chart tile server: a thin axum application
//! over the render pipeline. Clients fetch PNG tiles by
//! `/charts/{set}/{z}/{x}/{y}.png` and structured feature descriptions
//! by `/charts/{set}/featureInfo`; `/list` and `/status` report the
//! installed sets and cache counters.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use state::AppState;

/// Build the application with state and middleware
pub async fn init_server(config: ServerConfig) -> ServerResult<Router> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "initializing tidemark server"
    );
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    let state = AppState::new(config).await?;
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout));
    Ok(app)
}
