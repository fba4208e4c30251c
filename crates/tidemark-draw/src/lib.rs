//! # Tidemark Draw
//!
//! Single-threaded CPU rasterizer used by the tile renderer.
//!
//! The [`DrawingContext`] owns a fixed-size RGBA buffer and offers the
//! primitives S-52 symbology needs: clipped h/v lines, Bresenham and
//! anti-aliased lines with dash stencils, thick strokes, pattern-stippled
//! triangle fills, symbol and glyph blits, and circular arcs for sector
//! lights.
//!
//! All primitives clip to the buffer; out-of-range coordinates are safe.
//! In check-only mode every primitive is short-circuited to set a
//! `has_drawn` flag, which the feature-info path uses to decide whether an
//! object would produce visible ink.

mod color;
mod context;
mod dash;
mod pattern;

pub use color::{convert_color, get_alpha, set_alpha, ColorAndAlpha};
pub use context::{DrawingContext, ThicknessMode};
pub use dash::Dash;
pub use pattern::PatternSpec;
