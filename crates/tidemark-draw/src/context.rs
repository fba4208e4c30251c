//! The drawing context
//!
//! A fixed-size RGBA pixel buffer with the primitives the S-52 renderer
//! needs. The context is exclusive to its caller; nothing in here locks.

use crate::color::{blend, ColorAndAlpha, FACTORS};
use crate::dash::{Dash, DashHandler};
use crate::pattern::PatternSpec;
use tidemark_core::coord::{Pixel, PixelXy};

/// Which side of a line the extra thickness pixels go to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThicknessMode {
    /// Off-axis pixels towards the clockwise side
    Clockwise,
    /// Off-axis pixels towards the counter-clockwise side
    CounterClockwise,
}

/// A CPU pixel buffer with S-52 drawing primitives
pub struct DrawingContext {
    buffer: Vec<ColorAndAlpha>,
    width: i32,
    height: i32,
    has_drawn: bool,
    check_only: bool,
    /// Number of triangles submitted (statistics)
    pub num_triangles: u64,
}

impl DrawingContext {
    /// Create a zero-initialized context
    pub fn new(width: u32, height: u32) -> Self {
        DrawingContext {
            buffer: vec![0; (width * height) as usize],
            width: width as i32,
            height: height as i32,
            has_drawn: false,
            check_only: false,
            num_triangles: 0,
        }
    }

    /// Buffer width in pixels
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Buffer height in pixels
    pub fn height(&self) -> i32 {
        self.height
    }

    /// The raw pixel buffer, row major
    pub fn buffer(&self) -> &[ColorAndAlpha] {
        &self.buffer
    }

    /// The buffer serialized as RGBA bytes
    pub fn rgba_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.buffer.len() * 4);
        for px in &self.buffer {
            out.extend_from_slice(&px.to_le_bytes());
        }
        out
    }

    /// Whether any primitive produced an in-bounds pixel since the last reset
    pub fn drawn(&self) -> bool {
        self.has_drawn
    }

    /// Clear the drawn flag
    pub fn reset_drawn(&mut self) {
        self.has_drawn = false;
    }

    /// Switch check-only mode: primitives only set the drawn flag
    pub fn set_check_only(&mut self, v: bool) {
        self.check_only = v;
    }

    /// Fill the whole buffer with a color
    pub fn reset(&mut self, color: ColorAndAlpha) {
        self.buffer.fill(color);
        self.has_drawn = false;
    }

    /// Read a pixel, `None` outside the buffer
    pub fn pixel(&self, x: Pixel, y: Pixel) -> Option<ColorAndAlpha> {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return None;
        }
        Some(self.buffer[(y * self.width + x) as usize])
    }

    #[inline]
    fn put(&mut self, x: Pixel, y: Pixel, color: ColorAndAlpha, use_alpha: bool) {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return;
        }
        self.has_drawn = true;
        if self.check_only {
            return;
        }
        let idx = (y * self.width + x) as usize;
        if use_alpha {
            self.buffer[idx] = blend(self.buffer[idx], color);
        } else {
            self.buffer[idx] = color;
        }
    }

    /// Blend a color scaled by a coverage weight (0..=256)
    #[inline]
    fn put_weight(&mut self, x: Pixel, y: Pixel, color: ColorAndAlpha, weight: u32) {
        let alpha = ((color >> 24) & 0xff) * weight.min(256);
        let alpha = (alpha >> 8).min(255);
        let c = (color & 0x00ff_ffff) | (alpha << 24);
        self.put(x, y, c, true);
    }

    /// Set a single pixel
    pub fn set_pix(&mut self, x: Pixel, y: Pixel, color: ColorAndAlpha) {
        self.put(x, y, color, false);
    }

    /// Horizontal line between x0 and x1 (any order), clipped
    pub fn draw_hline(
        &mut self,
        y: Pixel,
        x0: Pixel,
        x1: Pixel,
        color: ColorAndAlpha,
        use_alpha: bool,
        dash: Option<&Dash>,
    ) {
        if y < 0 || y >= self.height {
            return;
        }
        let (mut x0, mut x1) = if x1 < x0 { (x1, x0) } else { (x0, x1) };
        x0 = x0.max(0);
        x1 = x1.min(self.width - 1);
        let mut dh = DashHandler::new(dash);
        for x in x0..=x1 {
            if dh.should_draw(x, y) {
                self.put(x, y, color, use_alpha);
            }
        }
    }

    /// Vertical line between y0 and y1 (any order), clipped
    pub fn draw_vline(
        &mut self,
        x: Pixel,
        y0: Pixel,
        y1: Pixel,
        color: ColorAndAlpha,
        use_alpha: bool,
        dash: Option<&Dash>,
    ) {
        if x < 0 || x >= self.width {
            return;
        }
        let (mut y0, mut y1) = if y1 < y0 { (y1, y0) } else { (y0, y1) };
        y0 = y0.max(0);
        y1 = y1.min(self.height - 1);
        let mut dh = DashHandler::new(dash);
        for y in y0..=y1 {
            if dh.should_draw(x, y) {
                self.put(x, y, color, use_alpha);
            }
        }
    }

    /// Axis-aligned rectangle outline
    pub fn draw_rect(&mut self, x0: Pixel, y0: Pixel, x1: Pixel, y1: Pixel, color: ColorAndAlpha) {
        self.draw_hline(y0, x0, x1, color, false, None);
        self.draw_hline(y1, x0, x1, color, false, None);
        self.draw_vline(x0, y0, y1, color, false, None);
        self.draw_vline(x1, y0, y1, color, false, None);
    }

    /// Bresenham line with optional alpha blending and dash stencil
    pub fn draw_line(
        &mut self,
        p0: PixelXy,
        p1: PixelXy,
        color: ColorAndAlpha,
        use_alpha: bool,
        dash: Option<&Dash>,
    ) {
        if p0.y == p1.y {
            return self.draw_hline(p0.y, p0.x, p1.x, color, use_alpha, dash);
        }
        if p0.x == p1.x {
            return self.draw_vline(p0.x, p0.y, p1.y, color, use_alpha, dash);
        }
        let dx = (p1.x - p0.x).abs();
        let sx = if p0.x < p1.x { 1 } else { -1 };
        let dy = -(p1.y - p0.y).abs();
        let sy = if p0.y < p1.y { 1 } else { -1 };
        let mut err = dx + dy;
        let mut x = p0.x;
        let mut y = p0.y;
        let mut dh = DashHandler::new(dash);
        loop {
            if dh.should_draw(x, y) {
                self.put(x, y, color, use_alpha);
            }
            if x == p1.x && y == p1.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Anti-aliased line (Wu), optional dash stencil
    pub fn draw_aa_line(
        &mut self,
        p0: PixelXy,
        p1: PixelXy,
        color: ColorAndAlpha,
        dash: Option<&Dash>,
    ) {
        let steep = (p1.y - p0.y).abs() > (p1.x - p0.x).abs();
        let (mut x0, mut y0, mut x1, mut y1) = if steep {
            (p0.y, p0.x, p1.y, p1.x)
        } else {
            (p0.x, p0.y, p1.x, p1.y)
        };
        if x0 > x1 {
            std::mem::swap(&mut x0, &mut x1);
            std::mem::swap(&mut y0, &mut y1);
        }
        let dx = (x1 - x0) as f64;
        let dy = (y1 - y0) as f64;
        let gradient = if dx == 0.0 { 1.0 } else { dy / dx };
        let mut intery = y0 as f64;
        let mut dh = DashHandler::new(dash);
        for x in x0..=x1 {
            let base = intery.floor() as Pixel;
            let frac = intery - intery.floor();
            let w_low = ((1.0 - frac) * 256.0) as u32;
            let w_high = (frac * 256.0) as u32;
            if dh.should_draw(x, base) {
                if steep {
                    self.put_weight(base, x, color, w_low);
                    self.put_weight(base + 1, x, color, w_high);
                } else {
                    self.put_weight(x, base, color, w_low);
                    self.put_weight(x, base + 1, color, w_high);
                }
            }
            intery += gradient;
        }
    }

    /// Fixed-width stroke.
    ///
    /// The thickness pixels are stacked on the minor axis; the mode picks
    /// the side they grow towards.
    pub fn draw_thick_line(
        &mut self,
        p0: PixelXy,
        p1: PixelXy,
        color: ColorAndAlpha,
        use_alpha: bool,
        dash: Option<&Dash>,
        thickness: u32,
        mode: ThicknessMode,
    ) {
        if thickness <= 1 {
            return self.draw_line(p0, p1, color, use_alpha, dash);
        }
        let dx = (p1.x - p0.x).abs();
        let dy = (p1.y - p0.y).abs();
        let dir = match mode {
            ThicknessMode::Clockwise => 1,
            ThicknessMode::CounterClockwise => -1,
        };
        for i in 0..thickness as i32 {
            let off = i * dir;
            let (o0, o1) = if dy > dx {
                // steep: stack in x
                (p0.shifted(off, 0), p1.shifted(off, 0))
            } else {
                (p0.shifted(0, off), p1.shifted(0, off))
            };
            self.draw_line(o0, o1, color, use_alpha, dash);
        }
    }

    /// Filled triangle, optionally stippled with a pattern.
    ///
    /// Fills by walking scanlines between the interpolated edges.
    pub fn draw_triangle(
        &mut self,
        p0: PixelXy,
        p1: PixelXy,
        p2: PixelXy,
        color: ColorAndAlpha,
        pattern: Option<&PatternSpec>,
    ) {
        self.num_triangles += 1;
        let mut v = [p0, p1, p2];
        v.sort_by_key(|p| p.y);
        let ymin = v[0].y.max(0);
        let ymax = v[2].y.min(self.height - 1);
        if ymin > ymax {
            return;
        }
        for y in ymin..=ymax {
            let mut xs: Option<(i32, i32)> = None;
            let edges = [(v[0], v[1]), (v[1], v[2]), (v[0], v[2])];
            for (a, b) in edges {
                if a.y == b.y {
                    if y == a.y {
                        let (lo, hi) = (a.x.min(b.x), a.x.max(b.x));
                        xs = Some(match xs {
                            None => (lo, hi),
                            Some((l, h)) => (l.min(lo), h.max(hi)),
                        });
                    }
                    continue;
                }
                let (top, bot) = if a.y < b.y { (a, b) } else { (b, a) };
                if y < top.y || y > bot.y {
                    continue;
                }
                let x = top.x as i64
                    + ((y - top.y) as i64 * (bot.x - top.x) as i64) / (bot.y - top.y) as i64;
                let x = x as i32;
                xs = Some(match xs {
                    None => (x, x),
                    Some((l, h)) => (l.min(x), h.max(x)),
                });
            }
            if let Some((lo, hi)) = xs {
                let lo = lo.max(0);
                let hi = hi.min(self.width - 1);
                for x in lo..=hi {
                    match pattern {
                        None => self.put(x, y, color, false),
                        Some(p) => {
                            if let Some(c) = p.lookup(x, y) {
                                if c & 0xff00_0000 != 0 {
                                    self.put(x, y, c, true);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Blit an RGBA sub-image with alpha blending, `p0` = upper left
    pub fn draw_symbol(&mut self, p0: PixelXy, width: i32, height: i32, buffer: &[ColorAndAlpha]) {
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                let Some(&c) = buffer.get(idx) else { continue };
                if c & 0xff00_0000 == 0 {
                    continue;
                }
                self.put(p0.x + x, p0.y + y, c, true);
            }
        }
    }

    /// Blit a grayscale coverage mask in the given color, `p0` = upper left
    pub fn draw_glyph(&mut self, p0: PixelXy, width: i32, height: i32, mask: &[u8], color: ColorAndAlpha) {
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                let Some(&w) = mask.get(idx) else { continue };
                if w == 0 {
                    continue;
                }
                self.put_weight(p0.x + x, p0.y + y, color, FACTORS[w as usize]);
            }
        }
    }

    /// Circular arc or ring segment.
    ///
    /// Angles are degrees with 0° = east, counter-clockwise positive.
    /// A negative `radius_inner` draws a one-pixel outline; otherwise the
    /// annulus between the radii is filled. `start == 0 && end == 360` is a
    /// full circle.
    pub fn draw_arc(
        &mut self,
        center: PixelXy,
        color: ColorAndAlpha,
        radius: i32,
        radius_inner: i32,
        start_angle: f64,
        end_angle: f64,
    ) {
        if radius <= 0 {
            return;
        }
        let inner = if radius_inner >= 0 {
            radius_inner
        } else {
            radius - 1
        };
        let r2 = (radius as i64) * (radius as i64);
        let i2 = (inner as i64) * (inner as i64);
        let full = (end_angle - start_angle).abs() >= 360.0;
        let (start, end) = (start_angle.rem_euclid(360.0), end_angle.rem_euclid(360.0));
        for dy in -radius..=radius {
            let y = center.y + dy;
            if y < 0 || y >= self.height {
                continue;
            }
            for dx in -radius..=radius {
                let x = center.x + dx;
                if x < 0 || x >= self.width {
                    continue;
                }
                let d2 = (dx as i64) * (dx as i64) + (dy as i64) * (dy as i64);
                if d2 > r2 || d2 <= i2 {
                    continue;
                }
                if !full {
                    // screen y grows downwards, angles grow CCW
                    let ang = (-(dy as f64)).atan2(dx as f64).to_degrees().rem_euclid(360.0);
                    let hit = if start <= end {
                        ang >= start && ang <= end
                    } else {
                        ang >= start || ang <= end
                    };
                    if !hit {
                        continue;
                    }
                }
                self.put(x, y, color, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::convert_color;

    const RED: ColorAndAlpha = convert_color(255, 0, 0, 255);

    #[test]
    fn test_line_clips_to_buffer() {
        let mut ctx = DrawingContext::new(256, 256);
        ctx.draw_line(PixelXy::new(-10, 20), PixelXy::new(500, 20), RED, false, None);
        assert_eq!(ctx.pixel(0, 20), Some(RED));
        assert_eq!(ctx.pixel(255, 20), Some(RED));
        assert_eq!(ctx.pixel(0, 21), Some(0));
        assert_eq!(ctx.pixel(255, 254), Some(0));
    }

    #[test]
    fn test_diagonal_line_endpoints() {
        let mut ctx = DrawingContext::new(64, 64);
        ctx.draw_line(PixelXy::new(3, 5), PixelXy::new(40, 30), RED, false, None);
        assert_eq!(ctx.pixel(3, 5), Some(RED));
        assert_eq!(ctx.pixel(40, 30), Some(RED));
    }

    #[test]
    fn test_out_of_bounds_never_panics() {
        let mut ctx = DrawingContext::new(16, 16);
        ctx.set_pix(-5, -5, RED);
        ctx.draw_hline(-1, -100, 100, RED, false, None);
        ctx.draw_vline(100, -100, 100, RED, false, None);
        ctx.draw_triangle(
            PixelXy::new(-50, -50),
            PixelXy::new(100, -20),
            PixelXy::new(8, 90),
            RED,
            None,
        );
        ctx.draw_arc(PixelXy::new(-4, -4), RED, 10, -1, 0.0, 360.0);
    }

    #[test]
    fn test_arc_extreme_points() {
        let mut ctx = DrawingContext::new(256, 256);
        ctx.draw_arc(PixelXy::new(100, 100), RED, 50, -1, 0.0, 360.0);
        assert_eq!(ctx.pixel(150, 100), Some(RED));
        assert_eq!(ctx.pixel(50, 100), Some(RED));
        assert_eq!(ctx.pixel(100, 150), Some(RED));
        assert_eq!(ctx.pixel(100, 50), Some(RED));
        // interior stays empty
        assert_eq!(ctx.pixel(100, 100), Some(0));
        assert_eq!(ctx.pixel(100, 51), Some(0));
    }

    #[test]
    fn test_arc_quadrant() {
        let mut ctx = DrawingContext::new(256, 256);
        // 0..90 degrees is the north-east quadrant on screen
        ctx.draw_arc(PixelXy::new(100, 100), RED, 50, -1, 0.0, 90.0);
        assert_eq!(ctx.pixel(150, 100), Some(RED));
        assert_eq!(ctx.pixel(100, 50), Some(RED));
        assert_eq!(ctx.pixel(50, 100), Some(0));
        assert_eq!(ctx.pixel(100, 150), Some(0));
    }

    #[test]
    fn test_triangle_fill_and_pattern_seam() {
        let mut ctx = DrawingContext::new(64, 64);
        ctx.draw_triangle(
            PixelXy::new(0, 0),
            PixelXy::new(63, 0),
            PixelXy::new(0, 63),
            RED,
            None,
        );
        assert_eq!(ctx.pixel(1, 1), Some(RED));
        assert_eq!(ctx.pixel(0, 63), Some(RED));
        assert_eq!(ctx.pixel(63, 63), Some(0));
    }

    #[test]
    fn test_check_only_sets_flag_without_ink() {
        let mut ctx = DrawingContext::new(32, 32);
        ctx.set_check_only(true);
        ctx.draw_line(PixelXy::new(0, 0), PixelXy::new(10, 10), RED, false, None);
        assert!(ctx.drawn());
        assert_eq!(ctx.pixel(0, 0), Some(0));
        ctx.reset_drawn();
        // fully outside: no flag
        ctx.draw_line(PixelXy::new(-10, -10), PixelXy::new(-5, -5), RED, false, None);
        assert!(!ctx.drawn());
    }

    #[test]
    fn test_glyph_blend() {
        let mut ctx = DrawingContext::new(8, 8);
        let mask = [0u8, 255, 128, 0];
        ctx.draw_glyph(PixelXy::new(0, 0), 2, 2, &mask, RED);
        assert_eq!(ctx.pixel(0, 0), Some(0));
        assert_eq!(ctx.pixel(1, 0), Some(RED));
        let half = ctx.pixel(0, 1).unwrap();
        assert!(crate::color::get_alpha(half) > 0);
    }

    #[test]
    fn test_thick_line_width() {
        let mut ctx = DrawingContext::new(32, 32);
        ctx.draw_thick_line(
            PixelXy::new(2, 10),
            PixelXy::new(28, 10),
            RED,
            false,
            None,
            3,
            ThicknessMode::Clockwise,
        );
        assert_eq!(ctx.pixel(10, 10), Some(RED));
        assert_eq!(ctx.pixel(10, 12), Some(RED));
        assert_eq!(ctx.pixel(10, 9), Some(0));
    }
}
