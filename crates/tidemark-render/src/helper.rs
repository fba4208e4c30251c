//! Drawing helpers shared by the rule drawers

use crate::font::{FontBook, FontManager, FontType, SOUNDING_FONT_SIZE};
use std::sync::Arc;
use tidemark_core::bbox::{PixelBox, TileBox};
use tidemark_core::coord::{world_to_pixel, Pixel, PixelXy, WorldXy};
use tidemark_draw::{ColorAndAlpha, Dash, DrawingContext, PatternSpec, ThicknessMode};
use tidemark_s52::symbols::SymbolPtr;
use tidemark_s52::types::{DisplayString, SectorArc};
use tidemark_s52::S52Data;
use tidemark_s57::object::Sounding;

/// Widest sounding label used for margins
pub const SOUNDINGS_MAX: &str = "99999";

/// Draw a line in pixel space, thick when `width > 1`
pub fn render_line_px(
    ctx: &mut DrawingContext,
    color: ColorAndAlpha,
    start: PixelXy,
    end: PixelXy,
    width: i32,
    dash: Option<&Dash>,
) {
    if width <= 1 {
        ctx.draw_line(start, end, color, false, dash);
    } else {
        ctx.draw_thick_line(
            start,
            end,
            color,
            false,
            dash,
            width as u32,
            ThicknessMode::Clockwise,
        );
    }
}

/// Draw a line given in world coordinates
pub fn render_line(
    ctx: &mut DrawingContext,
    tile: &TileBox,
    color: ColorAndAlpha,
    start: WorldXy,
    end: WorldXy,
    width: i32,
    dash: Option<&Dash>,
) {
    render_line_px(
        ctx,
        color,
        tile.world_to_pixel(start),
        tile.world_to_pixel(end),
        width,
        dash,
    );
}

/// Stepper placing symbol repetitions along the major axis of a line.
///
/// The step is the symbol's major-axis size; a placement only happens
/// when the whole symbol still fits before the line end.
struct LineProgress {
    slope: f32,
    delta: Pixel,
    start: PixelXy,
    end: PixelXy,
    current: PixelXy,
    x_major: bool,
}

impl LineProgress {
    fn new(start: PixelXy, end: PixelXy, width: Pixel, height: Pixel) -> Self {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if dy.abs() > dx.abs() {
            let slope = if dy != 0 { dx as f32 / dy as f32 } else { 0.0 };
            LineProgress {
                slope,
                delta: if dy > 0 { height } else { -height },
                start,
                end,
                current: start,
                x_major: false,
            }
        } else {
            let slope = if dx != 0 { dy as f32 / dx as f32 } else { 0.0 };
            LineProgress {
                slope,
                delta: if dx > 0 { width } else { -width },
                start,
                end,
                current: start,
                x_major: true,
            }
        }
    }

    fn cmpe(&self, cur: Pixel, cmp: Pixel) -> bool {
        if self.delta == 0 {
            return false;
        }
        if self.delta > 0 {
            cur <= cmp
        } else {
            cur >= cmp
        }
    }

    fn fits(&self) -> bool {
        if self.x_major {
            self.cmpe(self.current.x + self.delta, self.end.x)
        } else {
            self.cmpe(self.current.y + self.delta, self.end.y)
        }
    }

    fn end_reached(&self) -> bool {
        if self.x_major {
            !self.cmpe(self.current.x, self.end.x)
        } else {
            !self.cmpe(self.current.y, self.end.y)
        }
    }

    fn step(&mut self) {
        if self.x_major {
            self.current.x += self.delta;
            self.current.y = self.start.y
                + (self.slope * (self.current.x - self.start.x) as f32) as Pixel;
        } else {
            self.current.y += self.delta;
            self.current.x = self.start.x
                + (self.slope * (self.current.y - self.start.y) as f32) as Pixel;
        }
    }
}

/// Draw a line as repeated symbols, filling the leftover with a plain
/// line in the symbol's default color.
///
/// The symbol is fetched rotated to the segment direction (0° of a
/// symbol points north, so 90° is added to the east-based segment
/// angle).
pub fn render_symbol_line(
    s52: &S52Data,
    ctx: &mut DrawingContext,
    tile: &TileBox,
    start: WorldXy,
    end: WorldXy,
    symbol_name: &str,
) {
    if symbol_name.is_empty() {
        return;
    }
    let pstart = tile.world_to_pixel(start);
    let pend = tile.world_to_pixel(end);
    let dx = (pend.x - pstart.x) as f64;
    let dy = (pend.y - pstart.y) as f64;
    let mut rotation = (dy.atan2(dx).to_degrees()).round() as i32;
    rotation += 90;
    let Some(symbol) = s52.symbol(symbol_name, rotation, -1.0) else {
        return;
    };
    let Some(buffer) = symbol.buffer.as_ref() else {
        return;
    };
    let pivot_inv = PixelXy::new(-symbol.pivot_x, -symbol.pivot_y);
    let mut progress = LineProgress::new(
        pstart.shifted_by(pivot_inv),
        pend.shifted_by(pivot_inv),
        symbol.width,
        symbol.height,
    );
    let default_color = symbol.default_color;
    if !progress.fits() {
        ctx.draw_line(pstart, pend, default_color, false, None);
        return;
    }
    loop {
        ctx.draw_symbol(progress.current, symbol.width, symbol.height, buffer);
        progress.step();
        if !progress.fits() {
            break;
        }
    }
    if !progress.end_reached() {
        ctx.draw_line(
            progress.current.shifted_by(pivot_inv.inverted()),
            pend,
            default_color,
            false,
            None,
        );
    }
}

/// Build a tile-anchored pattern from a pattern symbol.
///
/// The offsets derive from the tile's world minimum in pixel units, so
/// the raster continues seamlessly across tile borders.
pub fn create_pattern_spec(symbol: &SymbolPtr, tile: &TileBox) -> Option<PatternSpec> {
    let buffer = symbol.buffer.clone()?;
    let mut pattern = PatternSpec::new(buffer, symbol.width, symbol.height);
    pattern.distance = symbol.min_dist;
    pattern.stagger = symbol.stagger;
    let xraster = pattern.width + pattern.distance;
    let yraster = pattern.height + pattern.distance;
    if xraster > 0 && yraster > 0 {
        pattern.xoffset = world_to_pixel(tile.xmin, tile.zoom).rem_euclid(xraster);
        pattern.yoffset = world_to_pixel(tile.ymin, tile.zoom).rem_euclid(yraster);
    }
    Some(pattern)
}

/// Draw a sector-light arc plus its two sector legs.
///
/// The legs are dashed anti-aliased lines; the bearings were converted
/// from nautical convention during rule expansion, the screen conversion
/// (0° pointing north, clockwise) happens here.
pub fn render_arc(s52: &S52Data, ctx: &mut DrawingContext, arc: &SectorArc, point: PixelXy) {
    let mut arc_inner = arc.arc_radius;
    let mut arc_outer = arc.arc_radius;
    if arc.outline_width >= 2 {
        arc_inner = arc.arc_radius - arc.outline_width / 2;
        arc_outer = arc_inner + arc.outline_width;
        ctx.draw_arc(point, arc.c_outline, arc_outer, arc_inner, arc.sectr1, arc.sectr2);
    } else {
        ctx.draw_arc(point, arc.c_outline, arc_outer, -1, arc.sectr1, arc.sectr2);
    }
    if arc.arc_width > 0 {
        if arc.arc_width >= 2 {
            arc_inner = arc.arc_radius - arc.arc_width / 2;
            arc_outer = arc_inner + arc.arc_width;
            ctx.draw_arc(point, arc.c_arc, arc_outer, arc_inner, arc.sectr1, arc.sectr2);
        } else {
            ctx.draw_arc(point, arc.c_arc, arc.arc_radius, -1, arc.sectr1, arc.sectr2);
        }
    }
    if arc.sector_radius > 0 {
        let color = s52.convert_color("CHBLK");
        let dash = Dash::new(8, 2);
        for bearing in [arc.sectr1, arc.sectr2] {
            let a = (bearing - 90.0).to_radians();
            let dst = PixelXy::new(
                point.x + (arc.sector_radius as f64 * a.cos()) as i32,
                point.y + (arc.sector_radius as f64 * a.sin()) as i32,
            );
            ctx.draw_aa_line(point, dst, color, Some(&dash));
        }
    }
}

/// A depth value split for display
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StrSounding {
    /// Integer part
    pub decimal: String,
    /// Single fractional digit, empty when not shown
    pub fract: String,
}

/// Convert a depth to its label parts.
///
/// Depths convert to the display unit first; feet show no decimals, and
/// metric depths show the fractional digit only below 31 m.
pub fn val_to_sounding(v: f32, s52: &S52Data) -> StrSounding {
    let mut rt = StrSounding::default();
    if v < 0.0 {
        return rt;
    }
    let mut v = v as f64;
    if v > 40_000.0 {
        v = 99_999.0;
    }
    let v = s52.convert_sounding(v, 0);
    let in_feet = matches!(
        s52.settings().depth_unit,
        tidemark_s52::settings::DepthUnit::Feet
    );
    let decimal = if in_feet { v.round() } else { v.floor() };
    rt.decimal = format!("{}", decimal as i64);
    if !in_feet && v < 31.0 {
        let fract = ((v - decimal) * 10.0).round() as i64;
        if fract != 0 {
            rt.fract = fract.to_string();
        }
    }
    rt
}

/// Draw one text run at a pen position; returns the advance
pub fn draw_text(
    fm: &FontManager,
    ctx: &mut DrawingContext,
    text: &str,
    point: PixelXy,
    color: ColorAndAlpha,
) -> i32 {
    let mut pp = point;
    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let glyph = fm.glyph(*c);
        let dp = PixelXy::new(pp.x + glyph.pivot_x, pp.y + glyph.pivot_y);
        ctx.draw_glyph(dp, glyph.width, glyph.height, &glyph.mask, color);
        pp.x += glyph.advance_x;
        if i + 1 < chars.len() {
            pp.x += fm.kern_x(*c, chars[i + 1]);
        }
    }
    pp.x - point.x
}

/// Draw a measured display string; returns the occupied pixel box
pub fn draw_display_string(
    fm: &FontManager,
    ctx: &mut DrawingContext,
    text: &DisplayString,
    point: PixelXy,
) -> PixelBox {
    let rt = text.relative_extent.shifted(point.x, point.y);
    let pen = PixelXy::new(point.x + text.pivot_x, point.y + text.pivot_y);
    draw_text(fm, ctx, &text.value, pen, text.color);
    rt
}

/// Draw sounding labels, split in color at the safety contour.
pub fn render_soundings(
    s52: &S52Data,
    fonts: &Arc<FontBook>,
    ctx: &mut DrawingContext,
    tile: &TileBox,
    soundings: &[Sounding],
) {
    let fm = fonts.manager(FontType::Sounding, SOUNDING_FONT_SIZE);
    let safety = s52.settings().safety_contour;
    let shallow_color = s52.convert_color("SNDG2");
    let deep_color = s52.convert_color("SNDG1");
    for sounding in soundings {
        let label = val_to_sounding(sounding.depth, s52);
        if label.decimal.is_empty() {
            continue;
        }
        let color = if (sounding.depth as f64) <= safety {
            shallow_color
        } else {
            deep_color
        };
        let pp = tile.world_to_pixel(sounding.point);
        let width = fm.text_width(&label.decimal);
        let height = fm.line_height();
        let pen = PixelXy::new(pp.x - width / 2, pp.y + height / 2);
        let advance = draw_text(&fm, ctx, &label.decimal, pen, color);
        if !label.fract.is_empty() {
            // the fractional digit sits lowered behind the integer part
            let fract_pen = PixelXy::new(pen.x + advance + 1, pen.y + height / 3);
            draw_text(&fm, ctx, &label.fract, fract_pen, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use tidemark_s52::RenderSettings;

    fn s52() -> S52Data {
        let mut data = S52Data::new(RenderSettings::default().into_shared());
        data.build_rules().unwrap();
        data
    }

    #[test]
    fn test_val_to_sounding_metric() {
        let data = s52();
        let v = val_to_sounding(12.37, &data);
        assert_eq!(v.decimal, "12");
        assert_eq!(v.fract, "4");
        // no decimals above 31 m
        let deep = val_to_sounding(42.7, &data);
        assert_eq!(deep.decimal, "42");
        assert_eq!(deep.fract, "");
        // negative depths produce nothing
        assert_eq!(val_to_sounding(-1.0, &data).decimal, "");
    }

    #[test]
    fn test_val_to_sounding_feet() {
        let mut settings = RenderSettings::default();
        settings.depth_unit = tidemark_s52::settings::DepthUnit::Feet;
        let mut data = S52Data::new(settings.into_shared());
        data.build_rules().unwrap();
        let v = val_to_sounding(3.048, &data);
        assert_eq!(v.decimal, "10");
        assert_eq!(v.fract, "");
    }

    #[test]
    fn test_pattern_spec_offsets_tile_anchored() {
        use tidemark_core::bbox::tile_to_box;
        use tidemark_s52::symbols::SymbolData;
        let mut sym = SymbolData {
            width: 8,
            height: 8,
            min_dist: 4,
            ..SymbolData::default()
        };
        sym.buffer = Some(StdArc::new(vec![0xff00_0000u32; 64]));
        let sym = StdArc::new(sym);
        // adjacent tiles: offsets must differ by the tile size modulo raster
        let t1 = tile_to_box(10, 100, 50, 0);
        let t2 = tile_to_box(10, 101, 50, 0);
        let p1 = create_pattern_spec(&sym, &t1).unwrap();
        let p2 = create_pattern_spec(&sym, &t2).unwrap();
        let raster = 12;
        assert_eq!(
            (p1.xoffset + 256).rem_euclid(raster),
            p2.xoffset.rem_euclid(raster)
        );
        assert_eq!(p1.yoffset, p2.yoffset);
    }

    #[test]
    fn test_line_progress_places_and_fills() {
        let mut ctx = DrawingContext::new(64, 64);
        // no symbol cache entry: helper must fall back silently
        let data = s52();
        let tile = tidemark_core::bbox::tile_to_box(10, 0, 0, 0);
        render_symbol_line(
            &data,
            &mut ctx,
            &tile,
            WorldXy::new(tile.xmin, tile.ymin),
            WorldXy::new(tile.xmin + 1000, tile.ymin),
            "ls:NOPE",
        );
        // nothing drawn but also no panic
        assert!(!ctx.drawn());
    }
}
