//! Per-feature render objects
//!
//! A [`RenderObject`] wraps an immutable feature and caches everything
//! symbology resolution produces for it: the bound look-up, the expanded
//! conditional sub-rule lists (memoized by the CS rule's key), measured
//! text strings, sector arcs, and the pixel extent used for overlap
//! checks. Expansion happens once per S-52 snapshot; rendering is
//! read-only and may run concurrently for different tiles.

use crate::context::RenderContext;
use crate::font::{FontBook, FontType};
use crate::helper;
use std::collections::HashMap;
use std::sync::Arc;
use tidemark_core::bbox::{world_extent_to_pixel, PixelBox, TileBox};
use tidemark_draw::{Dash, DrawingContext};
use tidemark_s52::attributes::attr;
use tidemark_s52::lup::LupRecord;
use tidemark_s52::rules::{
    LineStyle, Rule, RuleConditions, RuleCreator, RuleList, RuleVariant, SymbolRotation, LS_PREFIX,
    PT_PREFIX,
};
use tidemark_s52::settings::RenderSettings;
use tidemark_s52::text;
use tidemark_s52::types::{objclass, prio, DisCat, DisplayString, GeoPrimitive, RenderStep, SectorArc};
use tidemark_s52::S52Data;
use tidemark_s57::object::EdgeStore;
use tidemark_s57::S57Object;
use tracing::debug;

/// Anchor related feature classes gated by the anchor-info toggle
/// (anchor berth/area, submarine cables and pipelines, tunnels, seabed)
const ANCHOR_FEATURES: &[u16] = &[3, 4, 22, 94, 151, 121];

/// A feature with its resolved symbology
pub struct RenderObject {
    /// The wrapped feature
    pub object: Arc<S57Object>,
    lup: Option<Arc<LupRecord>>,
    cond_rules: HashMap<u32, RuleList>,
    expanded_texts: HashMap<u32, DisplayString>,
    arcs: HashMap<u32, SectorArc>,
    pixel_extent: PixelBox,
    xmargin: i32,
    ymargin: i32,
    display_category: DisCat,
}

impl RenderObject {
    /// Wrap a feature; call [`RenderObject::expand`] before rendering
    pub fn new(object: Arc<S57Object>) -> Self {
        RenderObject {
            object,
            lup: None,
            cond_rules: HashMap::new(),
            expanded_texts: HashMap::new(),
            arcs: HashMap::new(),
            pixel_extent: PixelBox::invalid(),
            xmargin: 0,
            ymargin: 0,
            display_category: DisCat::Undefined,
        }
    }

    /// Bind the look-up record
    pub fn set_lup(&mut self, lup: Arc<LupRecord>) {
        self.lup = Some(lup);
    }

    /// The bound look-up
    pub fn lup(&self) -> Option<&Arc<LupRecord>> {
        self.lup.as_ref()
    }

    /// Display priority of the bound look-up
    pub fn display_priority(&self) -> i32 {
        self.lup
            .as_ref()
            .map(|l| l.display_priority)
            .unwrap_or(prio::NONE)
    }

    /// Resolve all rules against the runtime conditions.
    ///
    /// Conditional rules compile through `creator` and are stored under
    /// their CS rule's key; text and arc rules pre-measure their pixel
    /// extents. Failures inside one rule skip only that rule.
    pub fn expand(
        &mut self,
        s52: &S52Data,
        fonts: Option<&Arc<FontBook>>,
        creator: &mut RuleCreator,
        conditions: &RuleConditions,
    ) {
        self.cond_rules.clear();
        self.expanded_texts.clear();
        self.arcs.clear();
        self.pixel_extent = PixelBox::invalid();
        let Some(lup) = self.lup.clone() else {
            return;
        };
        for rule in &lup.rule_list {
            match &rule.variant {
                RuleVariant::Conditional { .. } => {
                    let expanded = s52.compile_with_conditions(
                        &lup.obj_class,
                        &rule.parameter,
                        creator,
                        conditions,
                    );
                    for sub in &expanded {
                        self.expand_rule(s52, fonts, sub);
                    }
                    self.cond_rules.insert(rule.key, expanded);
                }
                _ => self.expand_rule(s52, fonts, rule),
            }
        }
    }

    fn expand_rule(&mut self, s52: &S52Data, fonts: Option<&Arc<FontBook>>, rule: &Rule) {
        match &rule.variant {
            RuleVariant::TextTx { options } | RuleVariant::TextTe { options } => {
                let Some(fonts) = fonts else { return };
                let value = match &rule.variant {
                    RuleVariant::TextTx { .. } => text::expand_tx(
                        options,
                        &self.object.attributes,
                        |name| s52.attribute_code(name),
                    ),
                    _ => text::expand_te(
                        options,
                        &self.object.attributes,
                        |name| s52.attribute_code(name),
                    ),
                };
                let Some(value) = value else { return };
                let font_size = options.font_size();
                let fm = fonts.manager(FontType::Text, font_size);
                let measured = fm.measure(&value);
                // offsets are in character units
                let char_w = fm.text_width("0").max(1);
                let char_h = fm.line_height();
                let pivot_x = options.xoffs * char_w
                    + match options.hjust {
                        1 => -measured.xmax / 2,
                        2 => -measured.xmax,
                        _ => 0,
                    };
                let pivot_y = options.yoffs * char_h
                    + match options.vjust {
                        3 => char_h,
                        2 => char_h / 2,
                        _ => 0,
                    };
                let mut relative_extent = measured;
                relative_extent.shift(pivot_x, pivot_y);
                let display = DisplayString {
                    value,
                    pivot_x,
                    pivot_y,
                    valid: true,
                    color: s52.convert_color(&options.color),
                    relative_extent,
                    font_size,
                    group: options.group,
                };
                self.pixel_extent.extend(&relative_extent);
                self.expanded_texts.insert(rule.key, display);
            }
            RuleVariant::Symbol { name, rotation } => {
                let rot = self.symbol_rotation(s52, rotation);
                if let Some(symbol) = s52.symbol(name, rot, -1.0) {
                    if symbol.relative_extent.valid {
                        self.pixel_extent.extend(&symbol.relative_extent);
                    }
                }
            }
            RuleVariant::SingleSounding => {
                if let Some(fonts) = fonts {
                    let fm = fonts.manager(FontType::Sounding, crate::font::SOUNDING_FONT_SIZE);
                    let width = fm.text_width(helper::SOUNDINGS_MAX);
                    let height = fm.line_height();
                    self.pixel_extent.extend(&PixelBox::new(
                        -width / 2,
                        -height,
                        width / 2,
                        height,
                    ));
                }
            }
            RuleVariant::MultipointSounding => {
                if let Some(fonts) = fonts {
                    let fm = fonts.manager(FontType::Sounding, crate::font::SOUNDING_FONT_SIZE);
                    self.xmargin = fm.text_width(helper::SOUNDINGS_MAX);
                    self.ymargin = fm.line_height();
                }
            }
            RuleVariant::Arc { payload } => {
                let arc = SectorArc {
                    c_outline: s52.convert_color(&payload.outline_color),
                    outline_width: payload.outline_width,
                    c_arc: s52.convert_color(&payload.arc_color),
                    arc_width: payload.arc_width,
                    sectr1: payload.sectr1,
                    sectr2: payload.sectr2,
                    arc_radius: payload.arc_radius.round() as i32,
                    sector_radius: payload.sector_radius.round() as i32,
                    relative_extent: {
                        let half = (payload.arc_radius.max(payload.sector_radius) as i32
                            + payload.outline_width)
                            + 5;
                        PixelBox::new(-half, -half, half, half)
                    },
                    valid: true,
                };
                self.pixel_extent.extend(&arc.relative_extent);
                self.arcs.insert(rule.key, arc);
            }
            RuleVariant::SetDisplayCategory => {
                self.display_category = DisCat::DisplayBase;
            }
            _ => {}
        }
    }

    fn symbol_rotation(&self, s52: &S52Data, rotation: &SymbolRotation) -> i32 {
        match rotation {
            SymbolRotation::None => self
                .object
                .attributes
                .get_double(attr::ORIENT)
                .map(|v| v as i32)
                .unwrap_or(0),
            SymbolRotation::Degrees(d) => *d,
            SymbolRotation::Attribute(name) => s52
                .attribute_code(name)
                .and_then(|id| self.object.attributes.get_double(id))
                .map(|v| v as i32)
                .unwrap_or(0),
        }
    }

    /// Effective display category (rule override wins over the look-up)
    pub fn display_cat(&self) -> DisCat {
        if self.display_category != DisCat::Undefined {
            return self.display_category;
        }
        self.lup
            .as_ref()
            .map(|l| l.display_category)
            .unwrap_or(DisCat::Undefined)
    }

    /// Category gate: active display category, meta filter, per-feature
    /// toggles and MarinersStandard overrides.
    pub fn should_render_cat(&self, settings: &RenderSettings) -> bool {
        let cat = self.display_cat();
        if cat == DisCat::Undefined {
            return false;
        }
        let Some(lup) = self.lup.as_ref() else {
            return false;
        };
        let code = self.object.feature_type_code;
        let mut rt = true;
        if settings.display_category == DisCat::Other {
            if cat == DisCat::Other
                && code == objclass::M_QUAL
                && !settings.show_meta
            {
                rt = false;
            }
        } else if lup.obj_class.starts_with("M_") && !settings.show_meta {
            rt = false;
        }
        match settings.display_category {
            DisCat::MarinersStandard => {
                if self.display_category != DisCat::DisplayBase {
                    rt = settings.feature_visible(&lup.obj_class);
                }
            }
            DisCat::Other => {
                if !matches!(cat, DisCat::DisplayBase | DisCat::Standard | DisCat::Other) {
                    rt = false;
                }
            }
            DisCat::Standard => {
                if !matches!(cat, DisCat::DisplayBase | DisCat::Standard) {
                    rt = false;
                }
            }
            DisCat::DisplayBase => {
                if cat != DisCat::DisplayBase {
                    rt = false;
                }
            }
            _ => {}
        }
        if code == objclass::M_QUAL {
            rt = settings.show_quality;
        }
        if code == objclass::SOUNDG {
            rt = settings.show_soundings;
        }
        if code == objclass::LIGHTS {
            rt = settings.show_lights;
        }
        if ANCHOR_FEATURES.contains(&code) && !settings.show_anchor_info {
            return false;
        }
        rt
    }

    /// SCAMIN gate: display-base and group-1 features always draw.
    pub fn should_render_scale(&self, settings: &RenderSettings, scale: i32) -> bool {
        if !settings.use_scamin {
            return true;
        }
        if self.display_cat() == DisCat::DisplayBase
            || self.display_priority() == prio::GROUP1
        {
            return true;
        }
        !(self.object.scamin > 0 && scale > self.object.scamin)
    }

    /// Whether the feature would appear inside a pixel box of the tile
    pub fn intersects(&self, pixel_box: &PixelBox, tile: &TileBox) -> bool {
        match self.object.geo_primitive {
            GeoPrimitive::Area | GeoPrimitive::Line => self.object.extent.intersects(&tile.extent()),
            GeoPrimitive::Point => {
                if self.object.is_multipoint() {
                    let ext = world_extent_to_pixel(&self.object.extent, tile);
                    pixel_box.intersects(&ext)
                } else {
                    let draw_point = tile.world_to_pixel(self.object.point);
                    if self.pixel_extent.valid {
                        pixel_box
                            .intersects(&self.pixel_extent.shifted(draw_point.x, draw_point.y))
                    } else {
                        pixel_box.contains_point(draw_point)
                    }
                }
            }
            GeoPrimitive::Unset => false,
        }
    }

    /// Render the rules matching one step.
    ///
    /// The area color and pattern steps run for every look-up; the other
    /// steps only when they match the look-up's own step.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        dc: &mut DrawingContext,
        tile: &TileBox,
        edges: &EdgeStore,
        step: RenderStep,
    ) {
        let Some(lup) = self.lup.as_ref() else {
            return;
        };
        if !self.should_render_scale(ctx.s52.settings(), ctx.scale) {
            return;
        }
        if !matches!(step, RenderStep::Areas1 | RenderStep::AreasSym) && lup.step() != step {
            return;
        }
        for rule in &lup.rule_list {
            if let RuleVariant::Conditional { .. } = rule.variant {
                let Some(expanded) = self.cond_rules.get(&rule.key) else {
                    continue;
                };
                for sub in expanded {
                    if self.step_matches(&sub.variant, step) {
                        self.render_single_rule(ctx, dc, tile, edges, sub);
                    }
                }
            } else if self.step_matches(&rule.variant, step) {
                self.render_single_rule(ctx, dc, tile, edges, rule);
            }
        }
    }

    fn step_matches(&self, variant: &RuleVariant, step: RenderStep) -> bool {
        match step {
            RenderStep::Areas1 => matches!(variant, RuleVariant::AreaColor { .. }),
            RenderStep::AreasSym => matches!(variant, RuleVariant::AreaPattern { .. }),
            _ => !matches!(
                variant,
                RuleVariant::AreaColor { .. } | RuleVariant::AreaPattern { .. }
            ),
        }
    }

    /// Draw one rule (see the drawer table in the module docs)
    pub fn render_single_rule(
        &self,
        ctx: &mut RenderContext,
        dc: &mut DrawingContext,
        tile: &TileBox,
        edges: &EdgeStore,
        rule: &Rule,
    ) {
        let settings = ctx.s52.settings().clone();
        match &rule.variant {
            RuleVariant::AreaColor { color, .. } => {
                for vl in &self.object.area {
                    for (a, b, c) in vl.triangles() {
                        dc.draw_triangle(
                            tile.world_to_pixel(a),
                            tile.world_to_pixel(b),
                            tile.world_to_pixel(c),
                            *color,
                            None,
                        );
                    }
                }
            }
            RuleVariant::AreaPattern { symbol } => {
                let Some(sym) = ctx.s52.symbol(&format!("{}{}", PT_PREFIX, symbol), 0, -1.0)
                else {
                    return;
                };
                let Some(pattern) = helper::create_pattern_spec(&sym, tile) else {
                    return;
                };
                for vl in &self.object.area {
                    for (a, b, c) in vl.triangles() {
                        dc.draw_triangle(
                            tile.world_to_pixel(a),
                            tile.world_to_pixel(b),
                            tile.world_to_pixel(c),
                            0,
                            Some(&pattern),
                        );
                    }
                }
            }
            RuleVariant::Symbol { name, rotation } => {
                let rot = self.symbol_rotation(&ctx.s52, rotation);
                let Some(symbol) = ctx.s52.symbol(name, rot, -1.0) else {
                    return;
                };
                let Some(buffer) = symbol.buffer.as_ref() else {
                    return;
                };
                let mut pp = tile.world_to_pixel(self.object.point);
                pp.x -= symbol.pivot_x;
                pp.y -= symbol.pivot_y;
                if self.object.geo_primitive == GeoPrimitive::Area {
                    // centred area symbols stay inside their area box
                    let symbol_ext = symbol.relative_extent.shifted(pp.x, pp.y);
                    let area_ext = world_extent_to_pixel(&self.object.extent, tile);
                    if !area_ext.includes(&symbol_ext) {
                        return;
                    }
                }
                dc.draw_symbol(pp, symbol.width, symbol.height, buffer);
            }
            RuleVariant::TextTx { options } | RuleVariant::TextTe { options } => {
                let Some(text) = self.expanded_texts.get(&rule.key) else {
                    return;
                };
                if !text.valid {
                    return;
                }
                let pp = tile.world_to_pixel(self.object.point);
                let our_extent = text.relative_extent.shifted(pp.x, pp.y);
                if settings.declutter_text && ctx.text_overlaps(&our_extent) {
                    return;
                }
                if !settings.text_group_visible(options.group) {
                    return;
                }
                let Some(fonts) = ctx.fonts.clone() else {
                    return;
                };
                let fm = fonts.manager(FontType::Text, text.font_size);
                let placed = helper::draw_display_string(&fm, dc, text, pp);
                ctx.text_boxes.push(placed);
            }
            RuleVariant::MultipointSounding => {
                let Some(fonts) = ctx.fonts.clone() else {
                    return;
                };
                helper::render_soundings(
                    &ctx.s52,
                    &fonts,
                    dc,
                    tile,
                    &self.object.soundings.points,
                );
            }
            RuleVariant::SingleSounding => {
                let Some(fonts) = ctx.fonts.clone() else {
                    return;
                };
                let depth: f32 = rule.parameter.trim().parse().unwrap_or(-1.0);
                let single = [tidemark_s57::object::Sounding {
                    point: self.object.point,
                    depth,
                }];
                helper::render_soundings(&ctx.s52, &fonts, dc, tile, &single);
            }
            RuleVariant::Arc { .. } => {
                if let Some(arc) = self.arcs.get(&rule.key) {
                    helper::render_arc(&ctx.s52, dc, arc, tile.world_to_pixel(self.object.point));
                }
            }
            RuleVariant::SimpleLine {
                style,
                width,
                color,
                ..
            } => {
                let width = (*width).max(1);
                let dash = match style {
                    LineStyle::Dott => Some(Dash::new(width, width)),
                    LineStyle::Dash => Some(Dash::new(3 * width, width)),
                    LineStyle::Solid => None,
                };
                for polygon in &self.object.polygons {
                    self.iterate_polygon(polygon, edges, |start, end| {
                        helper::render_line(dc, tile, *color, start, end, width, dash.as_ref());
                    });
                }
                if self.object.polygons.is_empty() {
                    for line in &self.object.lines {
                        line.iterate_segments(edges, |start, end, _| {
                            helper::render_line(dc, tile, *color, start, end, width, dash.as_ref());
                        });
                    }
                }
            }
            RuleVariant::SymbolLine { symbol } => {
                let name = format!("{}{}", LS_PREFIX, symbol);
                for polygon in &self.object.polygons {
                    self.iterate_polygon(polygon, edges, |start, end| {
                        helper::render_symbol_line(&ctx.s52, dc, tile, start, end, &name);
                    });
                }
                if self.object.polygons.is_empty() {
                    for line in &self.object.lines {
                        line.iterate_segments(edges, |start, end, _| {
                            helper::render_symbol_line(&ctx.s52, dc, tile, start, end, &name);
                        });
                    }
                }
            }
            RuleVariant::Conditional { name } => {
                debug!(rule = name, "unexpanded conditional rule at render");
            }
            RuleVariant::SetDisplayCategory => {}
        }
    }

    fn iterate_polygon(
        &self,
        polygon: &tidemark_s57::object::Polygon,
        edges: &EdgeStore,
        mut f: impl FnMut(tidemark_core::coord::WorldXy, tidemark_core::coord::WorldXy),
    ) {
        for idx in polygon.start_index..=polygon.end_index {
            if let Some(line) = self.object.lines.get(idx) {
                line.iterate_segments(edges, |start, end, _| f(start, end));
            }
        }
    }

    /// Whether any rule fills the area (used by the feature-info
    /// point-in-polygon fallback)
    pub fn has_area_fill(&self) -> bool {
        let Some(lup) = self.lup.as_ref() else {
            return false;
        };
        let check = |list: &RuleList| {
            list.iter().any(|r| {
                matches!(
                    r.variant,
                    RuleVariant::AreaColor { .. } | RuleVariant::AreaPattern { .. }
                )
            })
        };
        if check(&lup.rule_list) {
            return true;
        }
        self.cond_rules.values().any(check)
    }

    /// The extra pixel margins of multipoint labels
    pub fn margins(&self) -> (i32, i32) {
        (self.xmargin, self.ymargin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tidemark_s52::attributes::Attribute;
    use tidemark_s52::types::{LupTable, RadPrio};
    use tidemark_s52::RenderSettings;

    fn s52_with(settings: RenderSettings) -> Arc<S52Data> {
        let mut data = S52Data::new(settings.into_shared());
        let mut table = tidemark_s52::data::ColorTable {
            name: "DAY_BRIGHT".to_string(),
            colors: Default::default(),
        };
        table
            .colors
            .insert("DEPVS".into(), tidemark_s52::types::RgbColor::new(1, 2, 3));
        data.add_color_table(table).unwrap();
        data.add_lup(lup_record(1, 42, "CS(DEPARE02)", DisCat::Standard))
            .unwrap();
        data.build_rules().unwrap();
        Arc::new(data)
    }

    fn lup_record(rcid: i32, code: u16, instruction: &str, cat: DisCat) -> LupRecord {
        LupRecord {
            rcid,
            obj_class: "DEPARE".into(),
            feature_type_code: code,
            table: LupTable::PlainBoundaries,
            display_priority: 3,
            radar_priority: RadPrio::Over,
            attributes: BTreeMap::new(),
            instruction: instruction.to_string(),
            display_category: cat,
            comment_group: 0,
            sequence: rcid,
            rule_list: RuleList::default(),
        }
    }

    fn depth_area(drval1: f64, drval2: f64) -> Arc<S57Object> {
        use tidemark_s57::object::{TriangleType, VertexList};
        let mut obj = S57Object::new(1, 42, 3);
        obj.attributes.insert(Attribute::double(attr::DRVAL1, drval1));
        obj.attributes.insert(Attribute::double(attr::DRVAL2, drval2));
        let tile = tidemark_core::bbox::tile_to_box(10, 100, 100, 0);
        let pts = vec![
            tidemark_core::coord::WorldXy::new(tile.xmin, tile.ymin),
            tidemark_core::coord::WorldXy::new(tile.xmax, tile.ymin),
            tidemark_core::coord::WorldXy::new(tile.xmax, tile.ymax),
            tidemark_core::coord::WorldXy::new(tile.xmin, tile.ymax),
        ];
        let vl = VertexList::new(TriangleType::Fan, pts);
        obj.extent = vl.extent;
        obj.area.push(vl);
        obj.finalize();
        Arc::new(obj)
    }

    fn expanded_object(s52: &Arc<S52Data>, obj: Arc<S57Object>) -> RenderObject {
        let mut ro = RenderObject::new(obj);
        let lup = s52
            .find_lup(LupTable::PlainBoundaries, 42, Some(&ro.object.attributes))
            .unwrap()
            .clone();
        ro.set_lup(lup);
        let attrs = ro.object.attributes.clone();
        let conditions = RuleConditions {
            geo_primitive: ro.object.geo_primitive,
            has_floating_base: false,
            attributes: Some(&attrs),
            next_safety_contour: 1e6,
            feature_type_code: ro.object.feature_type_code,
        };
        let mut creator = RuleCreator::new(7);
        ro.expand(s52, None, &mut creator, &conditions);
        ro
    }

    #[test]
    fn test_conditional_expansion_memoized() {
        let s52 = s52_with(RenderSettings::default());
        let ro = expanded_object(&s52, depth_area(3.0, 4.0));
        assert_eq!(ro.cond_rules.len(), 1);
        let list = ro.cond_rules.values().next().unwrap();
        assert_eq!(list.len(), 1);
        assert!(matches!(list[0].variant, RuleVariant::AreaColor { .. }));
        assert!(ro.has_area_fill());
    }

    #[test]
    fn test_depth_area_renders_in_area_pass() {
        let s52 = s52_with(RenderSettings::default());
        let ro = expanded_object(&s52, depth_area(3.0, 4.0));
        let tile = tidemark_core::bbox::tile_to_box(10, 100, 100, 0);
        let mut ctx = RenderContext::new(s52.clone(), 50_000, None);
        let mut dc = DrawingContext::new(256, 256);
        let edges = EdgeStore::default();
        ro.render(&mut ctx, &mut dc, &tile, &edges, RenderStep::Areas1);
        assert!(dc.drawn());
        // the fill covers the tile centre
        assert_ne!(dc.pixel(128, 128), Some(0));
        // the line pass draws nothing for this rule set
        let mut dc2 = DrawingContext::new(256, 256);
        ro.render(&mut ctx, &mut dc2, &tile, &edges, RenderStep::Lines);
        assert!(!dc2.drawn());
    }

    #[test]
    fn test_scamin_gate() {
        let s52 = s52_with(RenderSettings::default());
        let obj = {
            let mut o = (*depth_area(3.0, 4.0)).clone();
            o.attributes
                .insert(Attribute::double(attr::SCAMIN, 20_000.0));
            o.finalize();
            Arc::new(o)
        };
        let ro = expanded_object(&s52, obj);
        let settings = s52.settings();
        assert!(ro.should_render_scale(settings, 10_000));
        assert!(!ro.should_render_scale(settings, 50_000));
        let mut no_scamin = RenderSettings::default();
        no_scamin.use_scamin = false;
        assert!(ro.should_render_scale(&no_scamin, 50_000));
    }

    #[test]
    fn test_category_gates() {
        let s52 = s52_with(RenderSettings::default());
        let ro = expanded_object(&s52, depth_area(3.0, 4.0));
        let mut settings = RenderSettings::default();
        assert!(ro.should_render_cat(&settings));
        settings.display_category = DisCat::DisplayBase;
        assert!(!ro.should_render_cat(&settings));
        // mariners standard honors per-feature overrides
        settings.display_category = DisCat::MarinersStandard;
        assert!(ro.should_render_cat(&settings));
        settings
            .feature_overrides
            .insert("DEPARE".to_string(), false);
        assert!(!ro.should_render_cat(&settings));
    }

    #[test]
    fn test_point_intersects_uses_pixel_extent() {
        let s52 = s52_with(RenderSettings::default());
        let tile = tidemark_core::bbox::tile_to_box(10, 100, 100, 0);
        let mut obj = S57Object::new(2, 75, 1);
        obj.point = tidemark_core::coord::WorldXy::new(tile.xmin + 100, tile.ymin + 100);
        obj.extent.extend_point(obj.point);
        obj.finalize();
        let ro = expanded_object(&s52, Arc::new(obj));
        let full = PixelBox::new(0, 0, 255, 255);
        assert!(ro.intersects(&full, &tile));
        let elsewhere = PixelBox::new(200, 200, 240, 240);
        assert!(!ro.intersects(&elsewhere, &tile));
    }
}
