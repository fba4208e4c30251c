//! Per-tile render state

use crate::font::FontBook;
use std::sync::Arc;
use tidemark_core::bbox::PixelBox;
use tidemark_core::coord::TILE_SIZE;
use tidemark_s52::S52Data;

/// Pixels added around extents when checking what needs to render
pub const RENDER_BOUNDARY: i32 = 50;

/// State shared by everything drawn into one tile.
///
/// The declutter text boxes accumulate here; the renderer clears them
/// between chart groups so decluttering is deterministic per tile.
pub struct RenderContext {
    /// Nominal display scale of the tile's zoom
    pub scale: i32,
    /// The S-52 snapshot in use
    pub s52: Arc<S52Data>,
    /// Fonts, absent in text-less setups
    pub fonts: Option<Arc<FontBook>>,
    /// Already placed text boxes (declutter)
    pub text_boxes: Vec<PixelBox>,
    /// Pixel extent of the tile
    pub tile_extent: PixelBox,
    /// Extent slack for render checks
    pub boundary: i32,
}

impl RenderContext {
    /// Context for a full tile
    pub fn new(s52: Arc<S52Data>, scale: i32, fonts: Option<Arc<FontBook>>) -> Self {
        RenderContext {
            scale,
            s52,
            fonts,
            text_boxes: Vec::new(),
            tile_extent: PixelBox::new(0, 0, TILE_SIZE as i32 - 1, TILE_SIZE as i32 - 1),
            boundary: RENDER_BOUNDARY,
        }
    }

    /// Context for an arbitrary pixel box (feature info)
    pub fn with_extent(
        s52: Arc<S52Data>,
        scale: i32,
        fonts: Option<Arc<FontBook>>,
        tile_extent: PixelBox,
    ) -> Self {
        RenderContext {
            scale,
            s52,
            fonts,
            text_boxes: Vec::new(),
            tile_extent,
            boundary: RENDER_BOUNDARY,
        }
    }

    /// Whether a candidate text box overlaps an already placed one
    pub fn text_overlaps(&self, candidate: &PixelBox) -> bool {
        self.text_boxes.iter().any(|b| b.intersects(candidate))
    }
}
