//! Error types for the symbology engine

use thiserror::Error;

/// Errors raised while building or applying S-52 symbology
#[derive(Error, Debug)]
pub enum S52Error {
    /// A color name is not present in the active color table
    #[error("unknown color {0}")]
    UnknownColor(String),

    /// A symbol name could not be resolved
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    /// A rule string could not be parsed
    #[error("invalid rule {0}")]
    InvalidRule(String),

    /// An attribute was read with the wrong type
    #[error("attribute {id} is no {expected}")]
    AttributeType {
        /// The attribute id
        id: u16,
        /// The requested type
        expected: &'static str,
    },

    /// The snapshot was mutated after freezing
    #[error("s52 data is frozen: {0}")]
    Frozen(&'static str),

    /// HPGL vector symbol could not be interpreted
    #[error("invalid hpgl in {symbol}: {detail}")]
    InvalidHpgl {
        /// Symbol name
        symbol: String,
        /// What went wrong
        detail: String,
    },

    /// Image decode/encode failure for raster symbols
    #[error("symbol image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error
    #[error("s52 error: {0}")]
    Other(String),
}

/// Result type alias for symbology operations
pub type S52Result<T> = Result<T, S52Error>;
