//! # Tidemark Cache
//!
//! The resource-bounded caches of the tile server:
//!
//! - [`chart_cache::ChartCache`] keeps parsed charts under a memory
//!   budget with LRU eviction and single-flight loading; entries in use
//!   are never evicted.
//! - [`opener::OpenerPool`] owns the bounded set of external decrypt
//!   helpers and serializes chart reads through them.
//! - [`tile_cache::TileCache`] stores encoded PNG tiles keyed by set
//!   token and settings sequence.
//! - [`housekeeper::HouseKeeper`] trims idle chart cache entries on a
//!   fixed cadence.

pub mod chart_cache;
pub mod error;
pub mod housekeeper;
pub mod opener;
pub mod tile_cache;

pub use chart_cache::{CacheValue, ChartCache, ChartCacheConfig, OpenOutcome};
pub use housekeeper::HouseKeeper;
pub use error::{CacheError, CacheResult};
pub use opener::{OpenerConfig, OpenerPool};
pub use tile_cache::{TileCache, TileCacheKey};
