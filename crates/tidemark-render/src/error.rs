//! Error types for rendering

use thiserror::Error;
use tidemark_core::bbox::TileId;

/// Errors raised by the tile renderer
#[derive(Error, Debug)]
pub enum RenderError {
    /// The tile lies outside every active chart set.
    ///
    /// This maps to an empty-tile response, not a server error.
    #[error("no charts to render for {0}")]
    NoCharts(TileId),

    /// The requested chart set does not exist
    #[error("unknown chart set {0}")]
    UnknownSet(String),

    /// A chart failed to open (already logged per chart)
    #[error(transparent)]
    Cache(#[from] tidemark_cache::CacheError),

    /// PNG encoding failed
    #[error("png encode failed: {0}")]
    Encode(String),

    /// Anything else
    #[error("render error: {0}")]
    Internal(String),
}

/// Result type alias for rendering
pub type RenderResult<T> = Result<T, RenderError>;
