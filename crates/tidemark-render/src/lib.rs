//! # Tidemark Render
//!
//! Turns charts into tiles. The crate owns the per-feature
//! [`object::RenderObject`] wrappers (look-up binding, conditional rule
//! expansion, text and arc caches), the per-chart render data, the tile
//! renderer with its scale grouping and pass ordering, and the
//! feature-info path that answers "what is at this point".
//!
//! Rendering itself is synchronous and single-threaded per tile; the
//! async parts (warm opens through the opener pool, the background cache
//! filler) sit at the edges.

pub mod chart;
pub mod context;
pub mod description;
pub mod error;
pub mod filler;
pub mod font;
pub mod helper;
pub mod object;
pub mod png;
pub mod renderer;

pub use chart::RenderChart;
pub use context::RenderContext;
pub use error::{RenderError, RenderResult};
pub use filler::{CacheFiller, FillerConfig};
pub use renderer::{Renderer, RendererConfig};
