//! Symbol cache
//!
//! Symbols come in two flavours: raster symbols cropped from the symbol
//! sheet and vector symbols described in the HPGL mini-language. The
//! cache owns one base entry per symbol name plus an append-only list of
//! derived symbols (scaled and/or rotated); lookups match derivations
//! within a scale and rotation tolerance so slightly different requests
//! share one raster.
//!
//! Scaling uses bilinear resampling; rotation inverse-maps every target
//! pixel into the source with 1/16 sub-pixel accuracy and blends the four
//! neighbours. HPGL symbols are measured in a first pass, then drawn into
//! an RGBA buffer through the normal [`DrawingContext`] primitives.

use crate::error::{S52Error, S52Result};
use crate::rules::LS_PREFIX;
use dashmap::DashMap;
use image::imageops::FilterType;
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tidemark_core::bbox::PixelBox;
use tidemark_core::coord::{Pixel, PixelXy};
use tidemark_draw::{convert_color, set_alpha, ColorAndAlpha, DrawingContext, ThicknessMode};
use tracing::debug;

/// Resolves a 5-letter color token into a packed color
pub type GetColorFn<'a> = &'a dyn Fn(&str) -> ColorAndAlpha;

/// A rasterized symbol ready for blitting
#[derive(Debug, Clone)]
pub struct SymbolData {
    /// Raster width
    pub width: i32,
    /// Raster height
    pub height: i32,
    /// Minimum repeat distance (patterns, line symbols)
    pub min_dist: i32,
    /// Maximum repeat distance
    pub max_dist: i32,
    /// Pivot x inside the raster
    pub pivot_x: i32,
    /// Pivot y inside the raster
    pub pivot_y: i32,
    /// Rotation this raster was produced for
    pub rotation: i32,
    /// Scale this raster was produced for
    pub scale: f64,
    /// Stagger pattern rows
    pub stagger: bool,
    /// Default color for gap-fill lines of line symbols
    pub default_color: ColorAndAlpha,
    /// Symbol name
    pub name: String,
    /// Extent relative to the pivot
    pub relative_extent: PixelBox,
    /// The pixels, row major; `None` for unrasterized bases
    pub buffer: Option<Arc<Vec<ColorAndAlpha>>>,
}

/// Shared symbol pointer
pub type SymbolPtr = Arc<SymbolData>;

impl Default for SymbolData {
    fn default() -> Self {
        SymbolData {
            width: 0,
            height: 0,
            min_dist: 0,
            max_dist: 0,
            pivot_x: 0,
            pivot_y: 0,
            rotation: 0,
            scale: 1.0,
            stagger: true,
            default_color: convert_color(0, 0, 0, 255),
            name: String::new(),
            relative_extent: PixelBox::invalid(),
            buffer: None,
        }
    }
}

impl SymbolData {
    /// Recompute the pivot-relative extent from size and pivot
    pub fn compute_extent(&mut self) {
        self.relative_extent = PixelBox::new(
            -self.pivot_x,
            -self.pivot_y,
            self.width - self.pivot_x,
            self.height - self.pivot_y,
        );
    }

    /// Approximate memory use of this raster
    pub fn num_bytes(&self) -> u64 {
        let mut rt = std::mem::size_of::<SymbolData>() as u64;
        if let Some(b) = &self.buffer {
            rt += (b.len() * std::mem::size_of::<ColorAndAlpha>()) as u64;
        }
        rt
    }
}

/// Placement of a raster symbol on the symbol sheet
#[derive(Debug, Clone, Default)]
pub struct SymbolPosition {
    /// Minimum repeat distance
    pub min_dist: i32,
    /// Maximum repeat distance
    pub max_dist: i32,
    /// Pivot x in sheet coordinates
    pub pivot_x: i32,
    /// Pivot y in sheet coordinates
    pub pivot_y: i32,
    /// Bounding box width
    pub bnbox_w: i32,
    /// Bounding box height
    pub bnbox_h: i32,
    /// Bounding box upper-left x
    pub bnbox_x: i32,
    /// Bounding box upper-left y
    pub bnbox_y: i32,
    /// Graphics location x on the sheet
    pub glx: i32,
    /// Graphics location y on the sheet
    pub gly: i32,
    /// Staggered pattern fill
    pub stagger: bool,
}

/// A vector (HPGL) symbol definition
#[derive(Debug, Clone, Default)]
pub struct VectorSymbol {
    /// Minimum repeat distance (vector units)
    pub min_dist: i32,
    /// Maximum repeat distance (vector units)
    pub max_dist: i32,
    /// Pivot x in vector units
    pub pivot_x: i32,
    /// Pivot y in vector units
    pub pivot_y: i32,
    /// Bounding box width in vector units
    pub bnbox_w: i32,
    /// Bounding box height in vector units
    pub bnbox_h: i32,
    /// The HPGL program
    pub hpgl: String,
    /// Color letter to token mapping, 6 chars per entry
    pub color_ref: String,
    /// Staggered pattern fill
    pub stagger: bool,
}

// ---- rotation ----

#[derive(Debug, Clone, Default)]
struct RotationParam {
    rotation: i32,
    sina: f32,
    cosa: f32,
    width: i32,
    height: i32,
    pivot: PixelXy,
    pivot_in: PixelXy,
}

impl RotationParam {
    fn new(rotation: i32, pivot_in: PixelXy, w: i32, h: i32) -> Self {
        let mut p = RotationParam {
            rotation,
            sina: 0.0,
            cosa: 1.0,
            width: w,
            height: h,
            pivot: pivot_in,
            pivot_in,
        };
        if rotation == 0 {
            return p;
        }
        let angle = (rotation as f32).to_radians();
        p.sina = angle.sin();
        p.cosa = angle.cos();
        if w != 0 && h != 0 {
            p.compute_box();
        }
        p
    }

    fn rotf(&self, xy: PixelXy, origin: PixelXy) -> (f32, f32) {
        let x = origin.x as f32 + (xy.x - self.pivot_in.x) as f32 * self.cosa
            - (xy.y - self.pivot_in.y) as f32 * self.sina;
        let y = origin.y as f32
            + (xy.x - self.pivot_in.x) as f32 * self.sina
            + (xy.y - self.pivot_in.y) as f32 * self.cosa;
        (x, y)
    }

    fn compute_box(&mut self) {
        let corners = [
            PixelXy::new(0, 0),
            PixelXy::new(self.width, 0),
            PixelXy::new(0, self.height),
            PixelXy::new(self.width, self.height),
        ];
        let mut minx = f32::MAX;
        let mut maxx = f32::MIN;
        let mut miny = f32::MAX;
        let mut maxy = f32::MIN;
        for c in corners {
            let (x, y) = self.rotf(c, self.pivot);
            minx = minx.min(x);
            maxx = maxx.max(x);
            miny = miny.min(y);
            maxy = maxy.max(y);
        }
        self.width = (maxx.ceil() - minx.floor()) as i32 + 1;
        self.height = (maxy.ceil() - miny.floor()) as i32 + 1;
        // shift the pivot so minx/miny land at 0
        self.pivot = PixelXy::new(
            self.pivot_in.x - minx.ceil() as i32,
            self.pivot_in.y - miny.ceil() as i32,
        );
    }
}

/// Rotate a symbol raster, inverse-mapping with 1/16 sub-pixel accuracy.
fn rotate_symbol(input: &SymbolPtr, rotation_deg: i32) -> SymbolPtr {
    let rotation_deg = rotation_deg.rem_euclid(360);
    if rotation_deg == 0 {
        return input.clone();
    }
    let Some(src) = &input.buffer else {
        return input.clone();
    };
    let pivot = PixelXy::new(input.pivot_x, input.pivot_y);
    let rotp = RotationParam::new(rotation_deg, pivot, input.width, input.height);
    let mut rot = (**input).clone();
    rot.rotation = rotation_deg;
    rot.width = rotp.width;
    rot.height = rotp.height;
    rot.pivot_x = rotp.pivot.x;
    rot.pivot_y = rotp.pivot.y;
    rot.compute_extent();

    // inverse rotation in 1/16 pixel fixed point
    let rsin16 = -rotp.sina * 16.0;
    let rcos16 = rotp.cosa * 16.0;
    let pivot_r = PixelXy::new(rot.pivot_x, rot.pivot_y);
    let mut target = vec![0u32; (rot.width * rot.height) as usize];
    for y in 0..rot.height {
        for x in 0..rot.width {
            let fx16 = (pivot.x << 4) as f32 + (x - pivot_r.x) as f32 * rcos16
                - (y - pivot_r.y) as f32 * rsin16;
            let fy16 = (pivot.y << 4) as f32
                + (x - pivot_r.x) as f32 * rsin16
                + (y - pivot_r.y) as f32 * rcos16;
            let (ox16, oy16) = (fx16 as i32, fy16 as i32);
            let orix = ox16 >> 4;
            let oriy = oy16 >> 4;
            let dst = &mut target[(y * rot.width + x) as usize];
            if orix < 0 || orix >= input.width || oriy < 0 || oriy >= input.height {
                *dst = 0;
                continue;
            }
            let xf = (ox16 & 0xf) as u32;
            let yf = (oy16 & 0xf) as u32;
            let at = |xx: i32, yy: i32| -> u32 {
                if xx >= input.width || yy >= input.height {
                    0
                } else {
                    src[(yy * input.width + xx) as usize]
                }
            };
            let word00 = at(orix, oriy);
            let word10 = at(orix + 1, oriy);
            let word01 = at(orix, oriy + 1);
            let word11 = at(orix + 1, oriy + 1);
            let mut dv = 0u32;
            for shift in [0u32, 8, 16, 24] {
                let v = ((16 - xf) * (16 - yf) * ((word00 >> shift) & 0xff)
                    + xf * (16 - yf) * ((word10 >> shift) & 0xff)
                    + (16 - xf) * yf * ((word01 >> shift) & 0xff)
                    + xf * yf * ((word11 >> shift) & 0xff)
                    + 128)
                    / 256;
                dv |= (v & 0xff) << shift;
            }
            *dst = dv;
        }
    }
    rot.buffer = Some(Arc::new(target));
    Arc::new(rot)
}

fn scale_dim(v: i32, factor: f64) -> i32 {
    ((v as f64) * factor).round().max(1.0) as i32
}

/// Scale a symbol raster bilinearly; the pivot scales by the same factor.
fn resize_symbol(input: &SymbolPtr, factor: f64) -> SymbolPtr {
    let scaled_w = scale_dim(input.width, factor);
    let scaled_h = scale_dim(input.height, factor);
    if (1.0 - factor).abs() < 1e-3 || (scaled_w == input.width && scaled_h == input.height) {
        return input.clone();
    }
    let Some(src) = &input.buffer else {
        return input.clone();
    };
    let mut bytes = Vec::with_capacity(src.len() * 4);
    for px in src.iter() {
        bytes.extend_from_slice(&px.to_le_bytes());
    }
    let Some(img) = RgbaImage::from_raw(input.width as u32, input.height as u32, bytes) else {
        return input.clone();
    };
    let resized = image::imageops::resize(&img, scaled_w as u32, scaled_h as u32, FilterType::Triangle);
    let mut out = (**input).clone();
    out.scale = input.scale * factor;
    out.width = scaled_w;
    out.height = scaled_h;
    out.pivot_x = scale_dim(input.pivot_x, factor);
    out.pivot_y = scale_dim(input.pivot_y, factor);
    out.compute_extent();
    let raw = resized.into_raw();
    let buffer: Vec<ColorAndAlpha> = raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    out.buffer = Some(Arc::new(buffer));
    Arc::new(out)
}

// ---- HPGL ----

/// 810 HPGL units become 32 pixels at scale 1.0
fn hpgl_scale(v: f64, scale: f64) -> f64 {
    v * 32.0 * scale / 810.0
}

#[derive(Debug, Clone)]
struct HpglOp {
    op: String,
    param: String,
    point: Option<PixelXy>,
}

struct HpglRender {
    operations: Vec<HpglOp>,
    scale: f64,
    rotp: RotationParam,
    position: SymbolData,
    draw_offset: PixelXy,
    symbol: SymbolData,
}

impl HpglRender {
    fn new(position: SymbolData, rotation: i32, scale: f64) -> Self {
        let pivot = PixelXy::new(position.pivot_x, position.pivot_y);
        HpglRender {
            operations: Vec::new(),
            scale,
            rotp: RotationParam::new(rotation, pivot, 0, 0),
            symbol: position.clone(),
            position,
            draw_offset: PixelXy::new(0, 0),
        }
    }

    /// Rotate around the pivot, shift by the pivot, scale to pixels.
    fn compute_point(&self, orig: PixelXy) -> PixelXy {
        let (mut x, mut y) = self.rotp.rotf(orig, self.rotp.pivot_in);
        x -= self.position.pivot_x as f32;
        y -= self.position.pivot_y as f32;
        PixelXy::new(
            hpgl_scale(x as f64, self.scale).round() as Pixel,
            hpgl_scale(y as f64, self.scale).round() as Pixel,
        )
    }

    fn parse(&mut self, hpgl: &str) {
        for action in hpgl.split(';') {
            let action = action.trim();
            if action.len() < 2 {
                continue;
            }
            let (cmd, param) = action.split_at(2);
            match cmd {
                "SP" | "SW" | "ST" | "CI" | "PM" | "FP" | "EP" => {
                    self.operations.push(HpglOp {
                        op: cmd.to_string(),
                        param: param.to_string(),
                        point: None,
                    });
                }
                "PU" | "PD" => {
                    let coords: Vec<i32> = param
                        .split(',')
                        .filter_map(|s| s.trim().parse::<i32>().ok())
                        .collect();
                    if coords.len() < 2 {
                        // a PD without coordinates draws a dot at the pen
                        self.operations.push(HpglOp {
                            op: cmd.to_string(),
                            param: param.to_string(),
                            point: None,
                        });
                        continue;
                    }
                    // PD may carry a whole polyline; emit one op per point
                    for pair in coords.chunks_exact(2) {
                        let p = self.compute_point(PixelXy::new(pair[0], pair[1]));
                        self.operations.push(HpglOp {
                            op: cmd.to_string(),
                            param: String::new(),
                            point: Some(p),
                        });
                    }
                }
                _ => debug!(cmd, "unknown hpgl op"),
            }
        }
    }

    /// First pass: measure the drawn extent and size the buffer.
    fn compute_box(&mut self) {
        let mut last: Option<PixelXy> = None;
        let mut width: i32 = 1;
        let mut bounds = PixelBox::invalid();
        for op in self.operations.iter_mut() {
            if op.point.is_none() && op.op == "PD" {
                if let Some(lp) = last {
                    op.point = Some(lp.shifted(1, 0));
                }
            }
            if let Some(p) = op.point {
                last = Some(p);
                bounds.extend_point(p.shifted(-width, -width));
                bounds.extend_point(p.shifted(width, width));
            }
            if op.op == "SW" {
                width = op.param.trim().parse::<i32>().unwrap_or(1).max(1);
            }
        }
        // circles extend around the pen position
        let mut width: i32 = 1;
        let mut last: Option<PixelXy> = None;
        for op in &self.operations {
            if op.op == "SW" {
                width = op.param.trim().parse::<i32>().unwrap_or(1).max(1);
            }
            if let Some(p) = op.point {
                last = Some(p);
            }
            if op.op == "CI" {
                if let Some(lp) = last {
                    let radius =
                        hpgl_scale(op.param.trim().parse::<f64>().unwrap_or(0.0), self.scale)
                            .round() as i32;
                    bounds.extend_point(lp.shifted(-width - radius, -width - radius));
                    bounds.extend_point(lp.shifted(width + radius, width + radius));
                }
            }
        }
        if !bounds.valid {
            bounds = PixelBox::new(0, 0, 1, 1);
        }
        self.symbol.width = bounds.xmax - bounds.xmin;
        self.symbol.height = bounds.ymax - bounds.ymin;
        self.symbol.rotation = self.rotp.rotation;
        self.symbol.scale = self.scale;
        self.draw_offset = PixelXy::new(-bounds.xmin, -bounds.ymin);
        self.symbol.pivot_x = self.draw_offset.x;
        self.symbol.pivot_y = self.draw_offset.y;
        self.symbol.min_dist = hpgl_scale(self.position.min_dist as f64, self.scale).round() as i32;
        self.symbol.max_dist = hpgl_scale(self.position.max_dist as f64, self.scale).round() as i32;
        self.symbol.compute_extent();
    }

    /// Second pass: draw the program into the symbol buffer.
    fn draw(&mut self, color_get: GetColorFn, color_ref: &str) {
        let mut ctx = DrawingContext::new(self.symbol.width.max(1) as u32, self.symbol.height.max(1) as u32);
        let mut last: Option<PixelXy> = None;
        let mut polygon: Vec<PixelXy> = Vec::new();
        let mut pen_width: i32 = 1;
        let mut color = convert_color(0, 0, 0, 255);
        let mut in_polygon = false;
        for op in &self.operations {
            match op.op.as_str() {
                "SP" => {
                    let Some(letter) = op.param.chars().next() else {
                        debug!(param = %op.param, "invalid color ref");
                        continue;
                    };
                    let mut name = None;
                    let chars: Vec<char> = color_ref.chars().collect();
                    let mut i = 0;
                    while i + 5 < chars.len() {
                        if chars[i] == letter {
                            name = Some(chars[i + 1..i + 6].iter().collect::<String>());
                            break;
                        }
                        i += 6;
                    }
                    match name {
                        Some(n) => color = color_get(&n),
                        None => debug!(param = %op.param, color_ref, "color ref not found"),
                    }
                }
                "SW" => {
                    pen_width = op.param.trim().parse::<i32>().unwrap_or(1).max(1);
                }
                "ST" => {
                    let trans_index = op.param.trim().parse::<i32>().unwrap_or(0);
                    let transparency = ((4 - trans_index) * 64).clamp(0, 255);
                    color = set_alpha(color, transparency as u8);
                }
                "PU" => {
                    if let Some(p) = op.point {
                        last = Some(p.shifted_by(self.draw_offset));
                    }
                }
                "PD" => {
                    if let Some(p) = op.point {
                        let next = p.shifted_by(self.draw_offset);
                        if in_polygon {
                            polygon.push(next);
                        } else {
                            if let Some(lp) = last {
                                if pen_width > 1 {
                                    ctx.draw_thick_line(
                                        lp,
                                        next,
                                        color,
                                        true,
                                        None,
                                        pen_width as u32,
                                        ThicknessMode::Clockwise,
                                    );
                                } else {
                                    ctx.draw_line(lp, next, color, true, None);
                                }
                            }
                            last = Some(next);
                        }
                    }
                }
                "CI" => {
                    if let Some(lp) = last {
                        let radius =
                            hpgl_scale(op.param.trim().parse::<f64>().unwrap_or(0.0), self.scale)
                                .round() as i32;
                        if radius >= 1 {
                            let inner = if in_polygon { 0 } else { -1 };
                            ctx.draw_arc(lp, color, radius, inner, 0.0, 360.0);
                        }
                    }
                }
                "PM" => {
                    if op.param.trim() == "0" {
                        in_polygon = true;
                        polygon.clear();
                        if let Some(lp) = last {
                            polygon.push(lp);
                        }
                    } else {
                        in_polygon = false;
                    }
                }
                "FP" => {
                    // convex polygons are good enough for the S-52 set
                    if polygon.len() == 2 {
                        ctx.draw_line(polygon[0], polygon[1], color, true, None);
                    }
                    if polygon.len() >= 3 {
                        let start = polygon[0];
                        for i in 2..polygon.len() {
                            ctx.draw_triangle(start, polygon[i - 1], polygon[i], color, None);
                        }
                    }
                    polygon.clear();
                }
                _ => {}
            }
        }
        self.symbol.default_color = color;
        self.symbol.buffer = Some(Arc::new(ctx.buffer().to_vec()));
    }
}

// ---- cache ----

enum BaseKind {
    Raster,
    Vector { hpgl: String, color_ref: String },
}

struct SymbolBase {
    kind: BaseKind,
    base: Mutex<SymbolPtr>,
    derived: Mutex<Vec<SymbolPtr>>,
}

fn check_tolerance(expected: f64, found: f64, tolerance: f64) -> bool {
    expected < 0.0 || (expected - found).abs() < tolerance
}

fn snap_rotation(wanted: i32, tolerance: i32) -> i32 {
    let wanted = wanted.rem_euclid(360);
    if tolerance <= 1 {
        return wanted;
    }
    wanted - wanted % tolerance
}

impl SymbolBase {
    fn get_or_create(
        &self,
        color_get: GetColorFn,
        added_bytes: &mut u64,
        scale_tolerance: f64,
        rotation_tolerance: i32,
        rotation: i32,
        scale: f64,
    ) -> Option<SymbolPtr> {
        let base = self.base.lock().clone();
        // line symbols carry a native rotation of 90 degrees
        let rotation = if base.name.starts_with(LS_PREFIX) {
            rotation - 90
        } else {
            rotation
        };
        let requested_rot = snap_rotation(rotation, rotation_tolerance);
        if base.buffer.is_some()
            && base.rotation == requested_rot
            && check_tolerance(scale, base.scale, scale_tolerance)
        {
            return Some(base);
        }
        {
            let derived = self.derived.lock();
            for d in derived.iter() {
                if d.rotation == requested_rot && check_tolerance(scale, d.scale, scale_tolerance) {
                    return Some(d.clone());
                }
            }
        }
        let created = match &self.kind {
            BaseKind::Raster => {
                base.buffer.as_ref()?;
                let mut ns = base.clone();
                if !check_tolerance(scale, ns.scale, scale_tolerance) {
                    let cscale = scale / ns.scale;
                    if cscale < 1e-4 {
                        debug!(symbol = %base.name, cscale, "invalid scale request");
                        return None;
                    }
                    ns = resize_symbol(&ns, cscale);
                }
                if ns.rotation != requested_rot {
                    ns = rotate_symbol(&ns, requested_rot);
                }
                ns
            }
            BaseKind::Vector { hpgl, color_ref } => {
                let scale = if scale < 0.0 { base.scale } else { scale };
                let mut render = HpglRender::new((*base).clone(), requested_rot, scale);
                render.parse(hpgl);
                render.compute_box();
                render.draw(color_get, color_ref);
                let mut sym = render.symbol;
                sym.rotation = requested_rot;
                Arc::new(sym)
            }
        };
        *added_bytes += created.num_bytes();
        self.derived.lock().push(created.clone());
        Some(created)
    }
}

/// The shared symbol cache.
///
/// Base symbols are registered once while the S-52 data is built; derived
/// rasters appear on demand. Every SY/AP/CA expansion of every
/// concurrently rendering tile looks up here, so the base map is sharded
/// and memory accounting is atomic.
pub struct SymbolCache {
    scale_tolerance: f64,
    rotation_tolerance: i32,
    base_map: DashMap<String, Arc<SymbolBase>>,
    symbol_entries: AtomicU64,
    mem_usage: AtomicU64,
}

impl SymbolCache {
    /// Create with the derivation tolerances from the settings
    pub fn new(scale_tolerance: f64, rotation_tolerance: i32) -> Self {
        SymbolCache {
            scale_tolerance,
            rotation_tolerance: rotation_tolerance.max(1),
            base_map: DashMap::new(),
            symbol_entries: AtomicU64::new(0),
            mem_usage: AtomicU64::new(0),
        }
    }

    /// Register a raster symbol cropped from the symbol sheet
    pub fn fill_raster_symbol(
        &self,
        name: &str,
        position: &SymbolPosition,
        sheet: &RgbaImage,
        scale: f64,
    ) -> S52Result<()> {
        let w = position.bnbox_w.max(1) as u32;
        let h = position.bnbox_h.max(1) as u32;
        if position.glx < 0
            || position.gly < 0
            || position.glx as u32 + w > sheet.width()
            || position.gly as u32 + h > sheet.height()
        {
            return Err(S52Error::Other(format!(
                "symbol {} outside the sheet",
                name
            )));
        }
        let mut buffer = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let p = sheet.get_pixel(position.glx as u32 + x, position.gly as u32 + y);
                buffer.push(convert_color(p[0], p[1], p[2], p[3]));
            }
        }
        let mut data = SymbolData {
            width: w as i32,
            height: h as i32,
            min_dist: position.min_dist,
            max_dist: position.max_dist,
            pivot_x: position.pivot_x - position.bnbox_x,
            pivot_y: position.pivot_y - position.bnbox_y,
            stagger: position.stagger,
            name: name.to_string(),
            buffer: Some(Arc::new(buffer)),
            ..SymbolData::default()
        };
        data.compute_extent();
        let mut base = Arc::new(data);
        if (scale - 1.0).abs() > 1e-3 {
            base = resize_symbol(&base, scale);
        }
        self.mem_usage.fetch_add(base.num_bytes(), Ordering::Relaxed);
        self.symbol_entries.fetch_add(1, Ordering::Relaxed);
        self.base_map.insert(
            name.to_string(),
            Arc::new(SymbolBase {
                kind: BaseKind::Raster,
                base: Mutex::new(base),
                derived: Mutex::new(Vec::new()),
            }),
        );
        Ok(())
    }

    /// Register a vector symbol; it rasterizes lazily on first use
    pub fn fill_vector_symbol(
        &self,
        name: &str,
        vector: &VectorSymbol,
        scale: f64,
    ) -> S52Result<()> {
        if vector.hpgl.is_empty() {
            return Err(S52Error::InvalidHpgl {
                symbol: name.to_string(),
                detail: "empty program".to_string(),
            });
        }
        let data = SymbolData {
            min_dist: vector.min_dist,
            max_dist: vector.max_dist,
            pivot_x: vector.pivot_x,
            pivot_y: vector.pivot_y,
            width: vector.bnbox_w,
            height: vector.bnbox_h,
            stagger: vector.stagger,
            scale,
            name: name.to_string(),
            buffer: None,
            ..SymbolData::default()
        };
        self.symbol_entries.fetch_add(1, Ordering::Relaxed);
        self.base_map.insert(
            name.to_string(),
            Arc::new(SymbolBase {
                kind: BaseKind::Vector {
                    hpgl: vector.hpgl.clone(),
                    color_ref: vector.color_ref.clone(),
                },
                base: Mutex::new(Arc::new(data)),
                derived: Mutex::new(Vec::new()),
            }),
        );
        Ok(())
    }

    /// Look up a symbol, deriving a scaled/rotated raster when needed.
    ///
    /// A requested scale below zero means "whatever the base has".
    pub fn get_symbol(
        &self,
        name: &str,
        color_get: GetColorFn,
        rotation: i32,
        scale: f64,
    ) -> Option<SymbolPtr> {
        // a trailing ",rot" in the name is not part of the key
        let key = name.split(',').next().unwrap_or(name);
        let base = self.base_map.get(key)?.clone();
        let mut added = 0u64;
        let rt = base.get_or_create(
            color_get,
            &mut added,
            self.scale_tolerance,
            self.rotation_tolerance,
            rotation,
            scale,
        );
        if added > 0 {
            self.mem_usage.fetch_add(added, Ordering::Relaxed);
            self.symbol_entries.fetch_add(1, Ordering::Relaxed);
        }
        rt
    }

    /// Whether a symbol name resolves; returns the usable name
    pub fn check_symbol(&self, name: &str) -> Option<String> {
        let key = name.split(',').next().unwrap_or(name);
        if self.base_map.contains_key(key) {
            Some(key.to_string())
        } else {
            None
        }
    }

    /// Current memory accounted to symbol rasters
    pub fn mem_usage(&self) -> u64 {
        self.mem_usage.load(Ordering::Relaxed)
    }

    /// Number of rasters (bases + derivations)
    pub fn entries(&self) -> u64 {
        self.symbol_entries.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black(_: &str) -> ColorAndAlpha {
        convert_color(0, 0, 0, 255)
    }

    fn raster_cache() -> SymbolCache {
        let cache = SymbolCache::new(0.1, 10);
        let mut sheet = RgbaImage::new(16, 16);
        for p in sheet.pixels_mut() {
            *p = image::Rgba([10, 20, 30, 255]);
        }
        let position = SymbolPosition {
            bnbox_w: 8,
            bnbox_h: 4,
            glx: 0,
            gly: 0,
            pivot_x: 4,
            pivot_y: 2,
            ..SymbolPosition::default()
        };
        cache
            .fill_raster_symbol("BOYLAT23", &position, &sheet, 1.0)
            .unwrap();
        cache
    }

    #[test]
    fn test_raster_lookup_and_identity() {
        let cache = raster_cache();
        let s = cache.get_symbol("BOYLAT23", &black, 0, -1.0).unwrap();
        assert_eq!((s.width, s.height), (8, 4));
        assert_eq!((s.pivot_x, s.pivot_y), (4, 2));
        assert!(cache.check_symbol("BOYLAT23,135").is_some());
        assert!(cache.check_symbol("NOPE").is_none());
    }

    #[test]
    fn test_rotation_within_tolerance_shares_raster() {
        let cache = raster_cache();
        let a = cache.get_symbol("BOYLAT23", &black, 92, -1.0).unwrap();
        let b = cache.get_symbol("BOYLAT23", &black, 95, -1.0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.rotation, 90);
    }

    #[test]
    fn test_rotation_90_swaps_dimensions() {
        let cache = raster_cache();
        let s = cache.get_symbol("BOYLAT23", &black, 90, -1.0).unwrap();
        // 8x4 becomes roughly 4x8 (plus the rounding border)
        assert!(s.height >= 8 && s.height <= 10, "height {}", s.height);
        assert!(s.width >= 4 && s.width <= 6, "width {}", s.width);
    }

    #[test]
    fn test_scaling_scales_pivot() {
        let cache = raster_cache();
        let s = cache.get_symbol("BOYLAT23", &black, 0, 2.0).unwrap();
        assert_eq!((s.width, s.height), (16, 8));
        assert_eq!((s.pivot_x, s.pivot_y), (8, 4));
        assert!(cache.mem_usage() > 0);
    }

    #[test]
    fn test_vector_symbol_rasterizes() {
        let cache = SymbolCache::new(0.1, 10);
        let vector = VectorSymbol {
            pivot_x: 0,
            pivot_y: 0,
            bnbox_w: 405,
            bnbox_h: 405,
            hpgl: "SPA;SW1;PU0,0;PD405,405".to_string(),
            color_ref: "ACHBLK".to_string(),
            ..VectorSymbol::default()
        };
        cache.fill_vector_symbol("ls:TESTLN", &vector, 1.0).unwrap();
        // line symbols subtract their native 90 degree rotation
        let s = cache.get_symbol("ls:TESTLN", &black, 90, -1.0).unwrap();
        assert!(s.buffer.is_some());
        assert!(s.width > 0 && s.height > 0);
        let buf = s.buffer.as_ref().unwrap();
        assert!(buf.iter().any(|p| *p != 0), "something must be drawn");
    }

    #[test]
    fn test_vector_circle_extends_box() {
        let cache = SymbolCache::new(0.1, 10);
        let vector = VectorSymbol {
            hpgl: "SPA;SW1;PU200,200;CI150".to_string(),
            color_ref: "ACHBLK".to_string(),
            bnbox_w: 400,
            bnbox_h: 400,
            ..VectorSymbol::default()
        };
        cache.fill_vector_symbol("CIRCLE01", &vector, 1.0).unwrap();
        let s = cache.get_symbol("CIRCLE01", &black, 0, -1.0).unwrap();
        // 150 units radius -> ~6 px; the box must cover the circle
        assert!(s.width >= 12, "width {}", s.width);
    }
}
