//! Error types for the caches and the opener pool

use thiserror::Error;

/// Errors surfaced by chart loading and caching.
///
/// Load failures do not poison the cache: the failing key goes into a
/// back-off state and is retried later.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The chart file does not exist
    #[error("chart file missing: {0}")]
    FileMissing(String),

    /// The chart stream was structurally invalid
    #[error("invalid chart {0}: {1}")]
    InvalidChart(String, String),

    /// The opener could not decrypt the chart
    #[error("decrypt failed for {0}")]
    DecryptError(String),

    /// No install key is known for the chart
    #[error("missing key for {0}")]
    MissingKey(String),

    /// Unsupported chart stream version
    #[error("version mismatch for {0}")]
    VersionMismatch(String),

    /// The chart licence has expired
    #[error("licence expired for {0}")]
    LicenceExpired(String),

    /// The opener pool did not answer in time
    #[error("opener timeout after {0:?}")]
    OpenerTimeout(std::time::Duration),

    /// The opener helper crashed (after a respawn retry)
    #[error("opener crashed: {0}")]
    OpenerCrashed(String),

    /// A single chart is larger than the whole cache budget
    #[error("chart {0} exceeds the cache budget")]
    OutOfBudget(String),

    /// The load was interrupted (shutdown)
    #[error("interrupted")]
    Interrupted,

    /// Anything else
    #[error("cache error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Whether retrying the load later can help
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CacheError::OpenerTimeout(_)
                | CacheError::OpenerCrashed(_)
                | CacheError::Interrupted
                | CacheError::Internal(_)
        )
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

impl From<tidemark_s57::S57Error> for CacheError {
    fn from(e: tidemark_s57::S57Error) -> Self {
        use tidemark_s57::S57Error;
        match e {
            S57Error::VersionMismatch(_) => CacheError::VersionMismatch(String::new()),
            S57Error::LicenceExpired => CacheError::LicenceExpired(String::new()),
            S57Error::DecryptError(_) => CacheError::DecryptError(String::new()),
            other => CacheError::InvalidChart(String::new(), other.to_string()),
        }
    }
}
