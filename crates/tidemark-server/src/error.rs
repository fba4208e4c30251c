//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tidemark_render::RenderError;

/// Errors surfaced by the HTTP layer
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request parameters
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The chart set is unknown
    #[error("unknown chart set {0}")]
    UnknownSet(String),

    /// Render pipeline failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Startup / configuration failure
    #[error("bad config: {0}")]
    BadConfig(String),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for handlers
pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::UnknownSet(s) => (StatusCode::NOT_FOUND, format!("unknown set {}", s)),
            ServerError::Render(RenderError::UnknownSet(s)) => {
                (StatusCode::NOT_FOUND, format!("unknown set {}", s))
            }
            // NoCharts is handled by the tile route before this point
            ServerError::Render(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ServerError::BadConfig(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            ServerError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };
        (
            status,
            Json(json!({
                "status": "error",
                "info": message,
            })),
        )
            .into_response()
    }
}
