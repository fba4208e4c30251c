//! Shared S-52 value types

use serde::{Deserialize, Serialize};
use std::fmt;
use tidemark_core::bbox::PixelBox;
use tidemark_draw::ColorAndAlpha;

/// Display category of a look-up or feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisCat {
    /// Always drawn
    DisplayBase,
    /// Standard display
    Standard,
    /// Everything else
    Other,
    /// Standard with per-feature mariner overrides
    MarinersStandard,
    /// Not yet resolved
    Undefined,
}

impl DisCat {
    /// Parse the single-letter category of the presentation library
    pub fn from_char(c: char) -> DisCat {
        match c {
            'D' => DisCat::DisplayBase,
            'S' => DisCat::Standard,
            'O' => DisCat::Other,
            'A' => DisCat::MarinersStandard,
            _ => DisCat::Undefined,
        }
    }
}

/// Display priorities (drawing order groups)
pub mod prio {
    /// No data
    pub const NODATA: i32 = 0;
    /// Land and other group-1 areas
    pub const GROUP1: i32 = 1;
    /// Area fills 1
    pub const AREA_1: i32 = 2;
    /// Area fills 2
    pub const AREA_2: i32 = 3;
    /// Point symbols
    pub const SYMB_POINT: i32 = 4;
    /// Line symbols
    pub const SYMB_LINE: i32 = 5;
    /// Area symbols
    pub const SYMB_AREA: i32 = 6;
    /// Routing elements
    pub const ROUTING: i32 = 7;
    /// Hazards
    pub const HAZARDS: i32 = 8;
    /// Mariners objects
    pub const MARINERS: i32 = 9;
    /// Unset
    pub const NONE: i32 = -1;
}

/// Radar priority of a look-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadPrio {
    /// Over radar
    Over,
    /// Suppressed by radar
    Suppressed,
}

impl RadPrio {
    /// Parse 'O' / 'S'
    pub fn from_char(c: char) -> RadPrio {
        if c == 'O' {
            RadPrio::Over
        } else {
            RadPrio::Suppressed
        }
    }
}

/// The five look-up tables of the presentation library
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LupTable {
    /// Simplified point symbols
    Simplified,
    /// Paper-chart point symbols
    PaperChart,
    /// Line symbology
    Lines,
    /// Plain area boundaries
    PlainBoundaries,
    /// Symbolized area boundaries
    SymbolizedBoundaries,
}

/// The render passes of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RenderStep {
    /// Area color fills (AC rules only)
    Areas1 = 1,
    /// Area pattern fills (AP rules only)
    AreasSym = 2,
    /// Area rules from the boundary tables
    Areas2 = 3,
    /// Line rules
    Lines = 4,
    /// Point rules
    Points = 5,
}

impl RenderStep {
    /// The steps in drawing order
    pub const ALL: [RenderStep; 5] = [
        RenderStep::Areas1,
        RenderStep::AreasSym,
        RenderStep::Areas2,
        RenderStep::Lines,
        RenderStep::Points,
    ];
}

/// Geometric primitive of a feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeoPrimitive {
    /// Not set
    #[default]
    Unset,
    /// Point feature
    Point,
    /// Line feature
    Line,
    /// Area feature
    Area,
}

impl GeoPrimitive {
    /// Map the primitive code of the chart format (1=point, 2=line, 3=area)
    pub fn from_code(code: u8) -> GeoPrimitive {
        match code {
            1 => GeoPrimitive::Point,
            2 => GeoPrimitive::Line,
            3 => GeoPrimitive::Area,
            _ => GeoPrimitive::Unset,
        }
    }
}

/// A color table entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl RgbColor {
    /// Create a color
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        RgbColor { r, g, b }
    }

    /// Pack into the rasterizer color format (opaque)
    pub fn to_color(&self) -> ColorAndAlpha {
        tidemark_draw::convert_color(self.r, self.g, self.b, 255)
    }
}

/// An MD5 digest used as a cache key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Md5Name(pub [u8; 16]);

impl Md5Name {
    /// Digest arbitrary bytes
    pub fn digest(data: &[u8]) -> Self {
        Md5Name(md5::compute(data).0)
    }
}

impl fmt::Display for Md5Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Incremental MD5 helper mirroring the value-typed hashing of settings
/// and feature identities.
pub struct Md5Builder {
    ctx: md5::Context,
}

impl Default for Md5Builder {
    fn default() -> Self {
        Md5Builder::new()
    }
}

impl Md5Builder {
    /// Start a new digest
    pub fn new() -> Self {
        Md5Builder {
            ctx: md5::Context::new(),
        }
    }

    /// Add raw bytes
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.ctx.consume(bytes);
    }

    /// Add an integer value
    pub fn add_i32(&mut self, v: i32) {
        self.ctx.consume(v.to_le_bytes());
    }

    /// Add an unsigned value
    pub fn add_u32(&mut self, v: u32) {
        self.ctx.consume(v.to_le_bytes());
    }

    /// Add a float value
    pub fn add_f64(&mut self, v: f64) {
        self.ctx.consume(v.to_le_bytes());
    }

    /// Add a string
    pub fn add_str(&mut self, v: &str) {
        self.ctx.consume(v.as_bytes());
    }

    /// Finish the digest
    pub fn finish(self) -> Md5Name {
        Md5Name(self.ctx.compute().0)
    }
}

/// A measured text ready for drawing
#[derive(Debug, Clone, Default)]
pub struct DisplayString {
    /// The expanded text
    pub value: String,
    /// Horizontal pivot relative to the object point
    pub pivot_x: i32,
    /// Vertical pivot relative to the object point
    pub pivot_y: i32,
    /// Whether the string expanded to something drawable
    pub valid: bool,
    /// Text color
    pub color: ColorAndAlpha,
    /// Pixel box relative to the object point
    pub relative_extent: PixelBox,
    /// Font size used for measurement
    pub font_size: i32,
    /// Text group code for the show-text-groups gate
    pub group: i32,
}

/// An expanded sector-light arc
#[derive(Debug, Clone, Default)]
pub struct SectorArc {
    /// Outline color
    pub c_outline: ColorAndAlpha,
    /// Outline stroke width
    pub outline_width: i32,
    /// Arc color
    pub c_arc: ColorAndAlpha,
    /// Arc stroke width
    pub arc_width: i32,
    /// First sector bearing (degrees)
    pub sectr1: f64,
    /// Second sector bearing (degrees)
    pub sectr2: f64,
    /// Arc radius in pixels
    pub arc_radius: i32,
    /// Sector leg radius in pixels
    pub sector_radius: i32,
    /// Pixel box relative to the object point
    pub relative_extent: PixelBox,
    /// Whether the arc is drawable
    pub valid: bool,
}

/// Well-known feature type codes used by the conditional rules
pub mod objclass {
    /// Depth area
    pub const DEPARE: u16 = 42;
    /// Depth contour
    pub const DEPCNT: u16 = 43;
    /// Dredged area
    pub const DRGARE: u16 = 46;
    /// Land area
    pub const LNDARE: u16 = 71;
    /// Light
    pub const LIGHTS: u16 = 75;
    /// Light float
    pub const LITFLT: u16 = 76;
    /// Light vessel
    pub const LITVES: u16 = 77;
    /// Mooring facility
    pub const MORFAC: u16 = 84;
    /// Obstruction
    pub const OBSTRN: u16 = 86;
    /// Restricted area
    pub const RESARE: u16 = 112;
    /// Shoreline construction
    pub const SLCONS: u16 = 122;
    /// Sounding
    pub const SOUNDG: u16 = 129;
    /// Topmark
    pub const TOPMAR: u16 = 144;
    /// Underwater rock
    pub const UWTROC: u16 = 153;
    /// Wreck
    pub const WRECKS: u16 = 159;
    /// Coverage meta object
    pub const M_COVR: u16 = 302;
    /// Navigational marks system meta object
    pub const M_NSYS: u16 = 306;
    /// Quality meta object
    pub const M_QUAL: u16 = 308;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discat_parse() {
        assert_eq!(DisCat::from_char('D'), DisCat::DisplayBase);
        assert_eq!(DisCat::from_char('A'), DisCat::MarinersStandard);
        assert_eq!(DisCat::from_char('x'), DisCat::Undefined);
    }

    #[test]
    fn test_md5_name_stable() {
        let a = Md5Name::digest(b"abc");
        let b = Md5Name::digest(b"abc");
        assert_eq!(a, b);
        assert_eq!(a.to_string().len(), 32);
    }

    #[test]
    fn test_geo_primitive_codes() {
        assert_eq!(GeoPrimitive::from_code(1), GeoPrimitive::Point);
        assert_eq!(GeoPrimitive::from_code(3), GeoPrimitive::Area);
        assert_eq!(GeoPrimitive::from_code(9), GeoPrimitive::Unset);
    }
}
