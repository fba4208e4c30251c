//! # Tidemark S-57
//!
//! The chart content model: S-57 feature objects with their geometry
//! (triangle tessellations, indexed line references, multipoint
//! soundings) plus the reader that parses the decrypted chart byte
//! stream delivered by an opener helper into a [`chart::ChartData`].
//!
//! All geometry is stored in integer world coordinates (see
//! `tidemark-core`); features reference shared vector edges and
//! connected nodes through index tables owned by the chart, so the whole
//! chart is immutable and cheaply shareable once parsed.

pub mod chart;
pub mod error;
pub mod object;
pub mod senc;

pub use chart::{ChartData, ChartType};
pub use error::{S57Error, S57Result};
pub use object::S57Object;
