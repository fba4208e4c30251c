//! Boxes over world and pixel coordinates
//!
//! [`Bounds`] is the axis-aligned integer box used for chart extents and
//! pixel rectangles. A box starts out invalid and becomes valid through
//! [`Bounds::extend`]; extending a valid box with an invalid operand is a
//! programmer error and panics.
//!
//! [`TileBox`] tags a world box with its zoom level and provides the
//! per-tile world/pixel conversions used throughout rendering.

use crate::coord::{
    bitshift, pixel_to_world, world_to_pixel, LatLon, Limits, PixelXy, World, WorldXy,
    COORD_ZOOM_LEVEL, SUB_PIXEL_BITS, TILE_SIZE_BITS,
};
use crate::coord::{lat_to_world_y, lon_to_world_x, world_x_to_lon, world_y_to_lat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned box over integer coordinates.
///
/// `ymin` is the northern edge (world y grows southward), `xmin` the
/// western edge. All bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Whether the box holds any area at all
    pub valid: bool,
    /// Western edge
    pub xmin: i32,
    /// Eastern edge
    pub xmax: i32,
    /// Northern edge
    pub ymin: i32,
    /// Southern edge
    pub ymax: i32,
}

/// A box in world coordinates (chart extents)
pub type Extent = Bounds;
/// A box in pixel coordinates
pub type PixelBox = Bounds;

impl Bounds {
    /// An invalid (empty) box
    pub fn invalid() -> Self {
        Bounds::default()
    }

    /// A valid box from its edges
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Bounds {
            valid: true,
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// Whether two boxes overlap
    pub fn intersects(&self, other: &Bounds) -> bool {
        if !self.valid || !other.valid {
            return false;
        }
        if self.xmax < other.xmin || self.ymax < other.ymin {
            return false;
        }
        if self.xmin > other.xmax || self.ymin > other.ymax {
            return false;
        }
        true
    }

    /// Whether a point lies inside the box
    pub fn contains_point(&self, p: PixelXy) -> bool {
        self.valid && p.x >= self.xmin && p.x <= self.xmax && p.y >= self.ymin && p.y <= self.ymax
    }

    /// Whether the box completely contains another
    pub fn includes(&self, other: &Bounds) -> bool {
        self.valid
            && other.valid
            && other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    /// Grow the box to cover another box.
    ///
    /// Returns whether any edge moved. An invalid box takes the operand's
    /// edges.
    ///
    /// # Panics
    ///
    /// Panics when the operand is invalid; callers must never feed an
    /// uninitialized box into an extent computation.
    pub fn extend(&mut self, other: &Bounds) -> bool {
        assert!(other.valid, "cannot extend a box with an invalid one");
        if !self.valid {
            *self = *other;
            return true;
        }
        let mut changed = false;
        if other.xmin < self.xmin {
            self.xmin = other.xmin;
            changed = true;
        }
        if other.ymin < self.ymin {
            self.ymin = other.ymin;
            changed = true;
        }
        if other.xmax > self.xmax {
            self.xmax = other.xmax;
            changed = true;
        }
        if other.ymax > self.ymax {
            self.ymax = other.ymax;
            changed = true;
        }
        changed
    }

    /// Grow the box to cover a point.
    pub fn extend_point(&mut self, p: Point32) -> bool {
        if !self.valid {
            *self = Bounds::new(p.x, p.y, p.x, p.y);
            return true;
        }
        let mut changed = false;
        if p.x < self.xmin {
            self.xmin = p.x;
            changed = true;
        }
        if p.y < self.ymin {
            self.ymin = p.y;
            changed = true;
        }
        if p.x > self.xmax {
            self.xmax = p.x;
            changed = true;
        }
        if p.y > self.ymax {
            self.ymax = p.y;
            changed = true;
        }
        changed
    }

    /// Translate the box with saturation.
    pub fn shift(&mut self, x: i32, y: i32) {
        if !self.valid {
            return;
        }
        self.xmin = Limits::shift(self.xmin, x);
        self.xmax = Limits::shift(self.xmax, x);
        self.ymin = Limits::shift(self.ymin, y);
        self.ymax = Limits::shift(self.ymax, y);
    }

    /// A translated copy
    pub fn shifted(&self, x: i32, y: i32) -> Bounds {
        let mut rt = *self;
        rt.shift(x, y);
        rt
    }

    /// Grow the box symmetrically by the given amounts per axis
    pub fn expand(&mut self, x: i32, y: i32) {
        if !self.valid {
            return;
        }
        self.xmin = Limits::shift(self.xmin, -x);
        self.xmax = Limits::shift(self.xmax, x);
        self.ymin = Limits::shift(self.ymin, -y);
        self.ymax = Limits::shift(self.ymax, y);
    }

    /// An expanded copy
    pub fn expanded(&self, x: i32, y: i32) -> Bounds {
        let mut rt = *self;
        rt.expand(x, y);
        rt
    }

    /// The centre point (midpoint of each axis)
    pub fn mid_point(&self) -> Point32 {
        Point32::new(self.xmin / 2 + self.xmax / 2, self.ymin / 2 + self.ymax / 2)
    }

    /// Width in coordinate units (inclusive bounds)
    pub fn width(&self) -> i64 {
        self.xmax as i64 - self.xmin as i64 + 1
    }

    /// Height in coordinate units (inclusive bounds)
    pub fn height(&self) -> i64 {
        self.ymax as i64 - self.ymin as i64 + 1
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Box: valid={}, xmin={}, xmax={}, ymin={}, ymax={}",
            self.valid, self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

type Point32 = crate::coord::Point<i32>;

/// Tile address in the XYZ scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    /// Zoom level
    pub zoom: u32,
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl TileId {
    /// Create a tile address
    pub fn new(zoom: u32, x: i32, y: i32) -> Self {
        TileId { zoom, x, y }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// A world-coordinate box tagged with a zoom level.
///
/// Provides the conversions between world coordinates and pixels relative
/// to the tile origin; a world coordinate equal to `xmin`/`ymin` maps to
/// pixel 0/0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBox {
    /// Zoom level of the tile
    pub zoom: u32,
    /// Western edge (world)
    pub xmin: World,
    /// Eastern edge, last world unit inside the tile
    pub xmax: World,
    /// Northern edge (world)
    pub ymin: World,
    /// Southern edge, last world unit inside the tile
    pub ymax: World,
}

impl TileBox {
    /// The box as a plain extent
    pub fn extent(&self) -> Extent {
        Extent::new(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    /// A copy shifted by world units (antimeridian handling)
    pub fn shifted(&self, x: World, y: World) -> TileBox {
        TileBox {
            zoom: self.zoom,
            xmin: Limits::shift(self.xmin, x),
            xmax: Limits::shift(self.xmax, x),
            ymin: Limits::shift(self.ymin, y),
            ymax: Limits::shift(self.ymax, y),
        }
    }

    /// Whether the tile overlaps an extent
    pub fn intersects(&self, other: &Extent) -> bool {
        self.extent().intersects(other)
    }

    /// Convert a world point to pixels relative to the tile origin
    pub fn world_to_pixel(&self, wp: WorldXy) -> PixelXy {
        let rel = WorldXy::new(
            Limits::shift(wp.x, -self.xmin),
            Limits::shift(wp.y, -self.ymin),
        );
        PixelXy::new(
            world_to_pixel(rel.x, self.zoom),
            world_to_pixel(rel.y, self.zoom),
        )
    }

    /// Convert tile-relative pixels back to a world point
    pub fn rel_pixel_to_world(&self, rel: PixelXy) -> WorldXy {
        let rel_world = WorldXy::new(
            pixel_to_world(rel.x, self.zoom),
            pixel_to_world(rel.y, self.zoom),
        );
        WorldXy::new(
            Limits::shift(self.xmin, rel_world.x),
            Limits::shift(self.ymin, rel_world.y),
        )
    }

    /// Pixel range covered by the tile, `[0, TILE_SIZE-1]` on each axis
    pub fn pixel_bounds(&self) -> PixelBox {
        PixelBox::new(
            0,
            0,
            world_to_pixel(self.xmax + 1 - self.xmin, self.zoom) - 1,
            world_to_pixel(self.ymax + 1 - self.ymin, self.zoom) - 1,
        )
    }
}

/// World extent of a tile, optionally expanded by a pixel border.
///
/// `xmax`/`ymax` are set to the last world unit inside the tile so that
/// adjacent tiles do not overlap.
pub fn tile_to_box(zoom: u32, tile_x: i32, tile_y: i32, pixel_border: i32) -> TileBox {
    let zoom = zoom.min(COORD_ZOOM_LEVEL);
    let shift = (COORD_ZOOM_LEVEL - zoom + TILE_SIZE_BITS + SUB_PIXEL_BITS) as i32;
    let mut rt = TileBox {
        zoom,
        xmin: Limits::shift(bitshift(tile_x, shift), Limits::HALF_SHIFT),
        ymin: Limits::shift(bitshift(tile_y, shift), Limits::HALF_SHIFT),
        xmax: Limits::shift(bitshift(tile_x + 1, shift) - 1, Limits::HALF_SHIFT),
        ymax: Limits::shift(bitshift(tile_y + 1, shift) - 1, Limits::HALF_SHIFT),
    };
    if pixel_border > 0 {
        let shifted_border = bitshift(pixel_border, (COORD_ZOOM_LEVEL - zoom + SUB_PIXEL_BITS) as i32);
        rt.xmin = Limits::shift(rt.xmin, -shifted_border);
        rt.ymin = Limits::shift(rt.ymin, -shifted_border);
        rt.xmax = Limits::shift(rt.xmax, shifted_border);
        rt.ymax = Limits::shift(rt.ymax, shifted_border);
    }
    rt
}

/// World extent of a tile address
pub fn tile_id_to_box(tile: TileId, pixel_border: i32) -> TileBox {
    tile_to_box(tile.zoom, tile.x, tile.y, pixel_border)
}

/// The tile containing a world point at a zoom level.
///
/// X overflow is wrapped back into the normal range; y is clipped.
pub fn world_point_to_tile(wp: WorldXy, zoom: u32) -> TileId {
    let zoom = zoom.min(COORD_ZOOM_LEVEL);
    let mut x = wp.x;
    while x > Limits::MAX {
        x = Limits::shift(x, -Limits::WORLD_SHIFT);
    }
    while x < Limits::MIN {
        x = Limits::shift(x, Limits::WORLD_SHIFT);
    }
    let y = Limits::clip(wp.y);
    let shift = (COORD_ZOOM_LEVEL - zoom + TILE_SIZE_BITS + SUB_PIXEL_BITS) as i32;
    TileId {
        zoom,
        x: bitshift(x - Limits::HALF_SHIFT, -shift),
        y: bitshift(y - Limits::HALF_SHIFT, -shift),
    }
}

/// Project a world extent into pixels relative to a tile box
pub fn world_extent_to_pixel(extent: &Extent, tile: &TileBox) -> PixelBox {
    let shifted = extent.shifted(-tile.xmin, -tile.ymin);
    PixelBox::new(
        world_to_pixel(shifted.xmin, tile.zoom),
        world_to_pixel(shifted.ymin, tile.zoom),
        world_to_pixel(shifted.xmax, tile.zoom),
        world_to_pixel(shifted.ymax, tile.zoom),
    )
}

/// A lat/lon box with named edges, convertible to a world extent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLonBox {
    /// Eastern longitude
    pub e_lon: LatLon,
    /// Western longitude
    pub w_lon: LatLon,
    /// Northern latitude
    pub n_lat: LatLon,
    /// Southern latitude
    pub s_lat: LatLon,
}

impl LatLonBox {
    /// Project into a world extent
    pub fn to_world(&self) -> Extent {
        Extent::new(
            lon_to_world_x(self.w_lon, true),
            lat_to_world_y(self.n_lat),
            lon_to_world_x(self.e_lon, true),
            lat_to_world_y(self.s_lat),
        )
    }

    /// Back-project from a world extent
    pub fn from_world(ext: &Extent) -> LatLonBox {
        LatLonBox {
            e_lon: world_x_to_lon(ext.xmax, true),
            s_lat: world_y_to_lat(ext.ymax),
            w_lon: world_x_to_lon(ext.xmin, true),
            n_lat: world_y_to_lat(ext.ymin),
        }
    }

    /// The naive midpoint of the box.
    ///
    /// Boxes crossing the 0/180 meridian get the arithmetic midpoint of
    /// their edges, matching the long-standing behavior of chart headers.
    pub fn mid_point(&self) -> crate::coord::LlXy {
        crate::coord::LlXy::new((self.e_lon + self.w_lon) / 2.0, (self.s_lat + self.n_lat) / 2.0)
    }
}
