//! Error types shared by the coordinate model

use thiserror::Error;

/// Errors raised by the coordinate and tile model
#[derive(Error, Debug)]
pub enum CoreError {
    /// Tile coordinates outside the pyramid for the zoom level
    #[error("invalid tile coordinate {z}/{x}/{y}")]
    InvalidTile {
        /// Zoom level
        z: u32,
        /// Column
        x: i64,
        /// Row
        y: i64,
    },

    /// Zoom level above the supported maximum
    #[error("invalid zoom level {0}")]
    InvalidZoomLevel(u32),

    /// A box operation received an unusable operand
    #[error("invalid box: {0}")]
    InvalidBox(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
