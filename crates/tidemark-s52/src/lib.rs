//! # Tidemark S-52
//!
//! The symbology engine: everything needed to turn an S-57 feature into a
//! list of drawing instructions.
//!
//! The heart of the crate is [`data::S52Data`], an immutable snapshot of
//! the presentation library: color tables, look-up tables (LUPs), raster
//! and vector symbols, and the mariner settings the snapshot was built
//! for. A settings change builds a *new* snapshot and publishes it behind
//! an `Arc`; renders in flight keep using the old one.
//!
//! Rule strings from the LUPs are compiled once into a [`rules::RuleList`]
//! of tagged instructions. Conditional (`CS`) rules are late bound: they
//! are expanded per feature against the runtime [`rules::RuleConditions`]
//! and the result is memoized under the originating rule's stable key.

pub mod attributes;
pub mod cond;
pub mod data;
pub mod error;
pub mod lup;
pub mod rules;
pub mod settings;
pub mod symbols;
pub mod text;
pub mod types;

pub use data::S52Data;
pub use error::{S52Error, S52Result};
pub use settings::RenderSettings;
