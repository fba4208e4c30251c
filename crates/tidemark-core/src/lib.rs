//! # Tidemark Core
//!
//! Coordinate model and spatial primitives for the Tidemark chart tile server.
//!
//! The central idea is a fixed-precision integer *world coordinate*: the
//! spherical-Mercator projection of the earth computed for a reference zoom
//! level of 20 with 256-pixel tiles and one sub-pixel bit. Chart geometry is
//! stored in world coordinates once and converted to per-tile pixel
//! coordinates with nothing but shifts, which keeps rendering free of
//! floating point work.
//!
//! Two high bits of the 32-bit coordinate are reserved for longitude wrap
//! overflow so that charts crossing the antimeridian can be handled by
//! shifting a whole earth east or west.
//!
//! - [`coord`]: scalar conversions between lat/lon, world and pixel space
//! - [`bbox`]: boxes over world and pixel coordinates, tile boxes
//! - [`scale`]: the zoom level to chart scale mapping
//! - [`error`]: shared error type

pub mod bbox;
pub mod coord;
pub mod error;
pub mod scale;

pub mod prelude {
    //! Convenient imports for downstream crates.

    pub use crate::bbox::{tile_to_box, world_point_to_tile, Bounds, Extent, PixelBox, TileBox, TileId};
    pub use crate::coord::{LatLon, LlXy, Pixel, PixelXy, Point, World, WorldXy, TILE_SIZE};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::scale::ZoomLevelScales;
}

/// The version of the Tidemark core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
