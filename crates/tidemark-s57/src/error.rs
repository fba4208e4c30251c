//! Error types for chart parsing

use thiserror::Error;

/// Errors raised while reading a decrypted chart stream
#[derive(Error, Debug)]
pub enum S57Error {
    /// The stream is not a chart or is structurally broken
    #[error("invalid chart: {0}")]
    InvalidChart(String),

    /// The stream version is not supported
    #[error("unsupported chart version {0}")]
    VersionMismatch(u16),

    /// The licence for the chart has expired
    #[error("chart licence expired")]
    LicenceExpired,

    /// The opener could not decrypt the chart
    #[error("chart decrypt failed (status {0})")]
    DecryptError(u16),

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended inside a record
    #[error("unexpected end of stream in record {0}")]
    UnexpectedEof(u16),
}

/// Result type alias for chart parsing
pub type S57Result<T> = Result<T, S57Error>;
