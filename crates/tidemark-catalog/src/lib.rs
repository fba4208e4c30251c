//! # Tidemark Catalog
//!
//! Keeps track of the installed chart sets: directory scanning, set
//! metadata (`Chartinfo.txt` / `ChartList.XML`), per-chart header
//! information, and the tile-to-chart lookup that drives rendering.
//!
//! Sets are immutable snapshots behind `Arc`s; any mutation builds a new
//! snapshot and swaps it in, so lookups never observe a half-updated
//! set and returned chart lists stay valid however long a render takes.

pub mod catalog;
pub mod chart_info;
pub mod chart_set;
pub mod error;
pub mod info_cache;
pub mod set_info;

pub use catalog::{Catalog, WeightedChart};
pub use chart_info::ChartInfo;
pub use chart_set::{ChartSet, SetState};
pub use error::{CatalogError, CatalogResult};
pub use set_info::ChartSetInfo;
