//! Error types for the chart set catalog

use thiserror::Error;

/// Errors raised while scanning and querying chart sets
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A chart directory is missing or unreadable
    #[error("chart directory {0} not found")]
    DirectoryMissing(String),

    /// Set metadata could not be parsed
    #[error("invalid set metadata in {path}: {detail}")]
    InvalidSetInfo {
        /// The offending file
        path: String,
        /// What went wrong
        detail: String,
    },

    /// The requested set does not exist
    #[error("unknown chart set {0}")]
    UnknownSet(String),

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted chart-info cache is unreadable
    #[error("chart info cache error: {0}")]
    InfoCache(String),
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
