//! Render-ready charts
//!
//! [`RenderChart`] couples immutable chart content with the render data
//! derived for one S-52 snapshot: look-up bindings, expanded conditional
//! rules, measured texts and arcs, in display priority order. When the
//! snapshot changes, the render data is rebuilt lazily on the next
//! prepare; renders already running keep the old data.

use crate::context::RenderContext;
use crate::description::ObjectDescription;
use crate::font::FontBook;
use crate::object::RenderObject;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tidemark_cache::CacheValue;
use tidemark_core::bbox::{world_extent_to_pixel, PixelBox, TileBox};
use tidemark_core::coord::WorldXy;
use tidemark_draw::DrawingContext;
use tidemark_s52::rules::{RuleConditions, RuleCreator};
use tidemark_s52::types::{objclass, GeoPrimitive, LupTable, RenderStep};
use tidemark_s52::S52Data;
use tidemark_s57::object::is_floating_class;
use tidemark_s57::ChartData;
use tracing::debug;

/// Distinct creator key spaces across all prepared charts
static CREATOR_IDS: AtomicU32 = AtomicU32::new(1);

/// The render data derived from one S-52 snapshot
pub struct PreparedRender {
    /// Digest of the snapshot this data was built for
    pub s52_md5: tidemark_s52::types::Md5Name,
    /// Render objects in display priority order
    pub objects: Vec<RenderObject>,
}

/// A chart plus its prepared render data
pub struct RenderChart {
    /// The parsed chart content
    pub chart: Arc<ChartData>,
    prepared: RwLock<Option<Arc<PreparedRender>>>,
}

impl RenderChart {
    /// Wrap parsed chart content
    pub fn new(chart: Arc<ChartData>) -> Self {
        RenderChart {
            chart,
            prepared: RwLock::new(None),
        }
    }

    /// Number of render passes of a tile
    pub fn render_passes(&self) -> usize {
        RenderStep::ALL.len()
    }

    /// Native scale of the chart
    pub fn native_scale(&self) -> i32 {
        self.chart.native_scale
    }

    /// Make sure render data exists for the given snapshot.
    ///
    /// Cheap when the snapshot is unchanged; safe to call concurrently
    /// with running renders (they keep their `Arc` to the old data).
    pub fn prepare(&self, s52: &Arc<S52Data>, fonts: Option<&Arc<FontBook>>) -> Arc<PreparedRender> {
        let md5 = s52.md5();
        if let Some(prepared) = self.prepared.read().as_ref() {
            if prepared.s52_md5 == md5 {
                return prepared.clone();
            }
        }
        let prepared = Arc::new(self.build_render_data(s52, fonts));
        *self.prepared.write() = Some(prepared.clone());
        prepared
    }

    fn build_render_data(&self, s52: &Arc<S52Data>, fonts: Option<&Arc<FontBook>>) -> PreparedRender {
        let settings = s52.settings();
        let point_table = if settings.simplified_points {
            LupTable::Simplified
        } else {
            LupTable::PaperChart
        };
        let area_table = if settings.symbolized_boundaries {
            LupTable::SymbolizedBoundaries
        } else {
            LupTable::PlainBoundaries
        };
        // positions of floating features give topmarks their floating base
        let floating: HashSet<WorldXy> = self
            .chart
            .objects
            .iter()
            .filter(|o| is_floating_class(o.feature_type_code))
            .map(|o| o.point)
            .collect();
        let next_safety_contour = self.chart.next_safety_contour(settings.safety_contour);
        let mut creator = RuleCreator::new(CREATOR_IDS.fetch_add(1, Ordering::Relaxed));
        let mut objects: Vec<RenderObject> = Vec::with_capacity(self.chart.objects.len());
        for object in &self.chart.objects {
            let mut ro = RenderObject::new(object.clone());
            let table = match object.geo_primitive {
                GeoPrimitive::Point => point_table,
                GeoPrimitive::Line => LupTable::Lines,
                GeoPrimitive::Area => area_table,
                GeoPrimitive::Unset => {
                    objects.push(ro);
                    continue;
                }
            };
            let Some(lup) = s52.find_lup(
                table,
                object.feature_type_code,
                Some(&object.attributes),
            ) else {
                debug!(
                    chart = %self.chart.file_name,
                    type_code = object.feature_type_code,
                    "no look-up for feature"
                );
                objects.push(ro);
                continue;
            };
            ro.set_lup(lup.clone());
            let conditions = RuleConditions {
                geo_primitive: object.geo_primitive,
                has_floating_base: object.feature_type_code == objclass::TOPMAR
                    && floating.contains(&object.point),
                attributes: Some(&object.attributes),
                next_safety_contour,
                feature_type_code: object.feature_type_code,
            };
            ro.expand(s52, fonts, &mut creator, &conditions);
            objects.push(ro);
        }
        // stable order: display priority, then encounter order
        objects.sort_by_key(|o| o.display_priority());
        PreparedRender {
            s52_md5: s52.md5(),
            objects,
        }
    }

    /// Render one pass of this chart into a tile.
    ///
    /// `prepare` must have run for the active snapshot; a pass index
    /// maps to one [`RenderStep`].
    pub fn render(
        &self,
        pass: usize,
        ctx: &mut RenderContext,
        dc: &mut DrawingContext,
        tile: &TileBox,
    ) {
        let Some(step) = RenderStep::ALL.get(pass).copied() else {
            return;
        };
        let prepared = self.prepare(&ctx.s52, ctx.fonts.as_ref());
        let settings = ctx.s52.settings().clone();
        let check_box = ctx.tile_extent.expanded(ctx.boundary, ctx.boundary);
        for object in &prepared.objects {
            if !object.should_render_cat(&settings) {
                continue;
            }
            let (xm, ym) = object.margins();
            let object_box = check_box.expanded(xm, ym);
            if !object.intersects(&object_box, tile) {
                continue;
            }
            object.render(ctx, dc, tile, &self.chart.edge_store, step);
        }
    }

    /// Describe the features that would draw inside a click box.
    ///
    /// Uses the rasterizer in check-only mode over all render steps; an
    /// area feature without a fill rule falls back to a point-in-polygon
    /// test against the click point.
    pub fn feature_info(
        &self,
        ctx: &mut RenderContext,
        dc: &mut DrawingContext,
        tile: &TileBox,
        overview: bool,
    ) -> Vec<ObjectDescription> {
        let prepared = self.prepare(&ctx.s52, ctx.fonts.as_ref());
        let settings = ctx.s52.settings().clone();
        let click_point = tile.rel_pixel_to_world(tidemark_core::coord::PixelXy::new(
            (ctx.tile_extent.xmax + 1) / 2,
            (ctx.tile_extent.ymax + 1) / 2,
        ));
        let mut rt = Vec::new();
        for object in &prepared.objects {
            if !object.should_render_cat(&settings) {
                continue;
            }
            if !object.should_render_scale(&settings, ctx.scale) {
                continue;
            }
            if !object.intersects(&ctx.tile_extent, tile) {
                continue;
            }
            let mut hit = false;
            dc.reset_drawn();
            for step in RenderStep::ALL {
                object.render(ctx, dc, tile, &self.chart.edge_store, step);
                if dc.drawn() {
                    hit = true;
                    break;
                }
            }
            if !hit
                && object.object.geo_primitive == GeoPrimitive::Area
                && !object.has_area_fill()
            {
                hit = object.object.polygons.iter().any(|p| {
                    p.contains(&object.object, &self.chart.edge_store, click_point)
                });
            }
            if !hit {
                continue;
            }
            let mut addons = BTreeMap::new();
            if object.object.is_multipoint() {
                // only the nearest sounding in the box is reported
                if let Some(nearest) = object
                    .object
                    .soundings
                    .points
                    .iter()
                    .filter(|s| tile.extent().contains_point(s.point))
                    .min_by_key(|s| {
                        let dx = (s.point.x - click_point.x) as i64;
                        let dy = (s.point.y - click_point.y) as i64;
                        dx * dx + dy * dy
                    })
                {
                    addons.insert(
                        "nearestSounding".to_string(),
                        format!("{:.1}", nearest.depth),
                    );
                }
            }
            let mut description =
                ObjectDescription::build(&object.object, &ctx.s52, overview, addons);
            description.compute_distance(object.object.point, click_point);
            rt.push(description);
        }
        rt
    }

    /// Pixel extent of the chart within a tile
    pub fn pixel_extent(&self, tile: &TileBox) -> PixelBox {
        world_extent_to_pixel(&self.chart.extent, tile)
    }
}

impl CacheValue for RenderChart {
    fn size_kb(&self) -> usize {
        self.chart.size_kb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_s52::attributes::attr;
    use tidemark_s52::data::ColorTable;
    use tidemark_s52::lup::LupRecord;
    use tidemark_s52::rules::RuleList;
    use tidemark_s52::types::{DisCat, RadPrio, RgbColor};
    use tidemark_s52::RenderSettings;
    use tidemark_s57::senc::StreamWriter;
    use tidemark_s57::ChartType;

    fn lup(rcid: i32, class: &str, code: u16, table: LupTable, instruction: &str) -> LupRecord {
        LupRecord {
            rcid,
            obj_class: class.into(),
            feature_type_code: code,
            table,
            display_priority: 3,
            radar_priority: RadPrio::Over,
            attributes: Default::default(),
            instruction: instruction.to_string(),
            display_category: DisCat::Standard,
            comment_group: 0,
            sequence: rcid,
            rule_list: RuleList::default(),
        }
    }

    fn s52() -> Arc<S52Data> {
        let mut data = S52Data::new(RenderSettings::default().into_shared());
        let mut table = ColorTable {
            name: "DAY_BRIGHT".into(),
            colors: Default::default(),
        };
        for (name, c) in [
            ("DEPVS", RgbColor::new(180, 220, 240)),
            ("DEPMS", RgbColor::new(150, 200, 230)),
            ("DEPMD", RgbColor::new(120, 180, 220)),
            ("DEPDW", RgbColor::new(100, 160, 210)),
            ("DEPIT", RgbColor::new(200, 220, 170)),
            ("CHBLK", RgbColor::new(0, 0, 0)),
            ("DEPSC", RgbColor::new(90, 90, 90)),
            ("DEPCN", RgbColor::new(120, 120, 120)),
            ("SNDG1", RgbColor::new(125, 137, 140)),
            ("SNDG2", RgbColor::new(7, 7, 7)),
        ] {
            table.colors.insert(name.into(), c);
        }
        data.add_color_table(table).unwrap();
        data.add_lup(lup(1, "DEPARE", 42, LupTable::PlainBoundaries, "CS(DEPARE02)"))
            .unwrap();
        data.add_lup(lup(2, "DEPCNT", 43, LupTable::Lines, "CS(DEPCNT02)"))
            .unwrap();
        data.build_rules().unwrap();
        Arc::new(data)
    }

    fn test_chart() -> RenderChart {
        // a depth area covering the whole cell plus a contour line
        let mut w = StreamWriter::new();
        w.version(200)
            .cell_name("T1")
            .extent(54.0, 11.0, 55.0, 12.0)
            .native_scale(25000)
            .edge_table(&[(1, vec![(-20000.0, 0.0), (20000.0, 0.0)])])
            .node_table(&[(1, -30000.0, -10.0), (2, 30000.0, 10.0)])
            .feature(42, 1, 3)
            .attr_double(attr::DRVAL1, 3.0)
            .attr_double(attr::DRVAL2, 4.0)
            .area(
                &[(
                    6,
                    vec![
                        (-40000.0, -40000.0),
                        (40000.0, -40000.0),
                        (40000.0, 40000.0),
                        (-40000.0, 40000.0),
                    ],
                )],
                &[],
            )
            .feature(43, 2, 2)
            .attr_double(attr::VALDCO, 10.0)
            .line(&[[1, 1, 2, 0]]);
        let data = tidemark_s57::senc::read_stream(
            &w.finish(),
            "set1",
            "T1.oesu",
            ChartType::Oesu,
            false,
        )
        .unwrap();
        RenderChart::new(Arc::new(data))
    }

    fn center_tile(chart: &RenderChart) -> TileBox {
        let mid = chart.chart.extent.mid_point();
        let tile = tidemark_core::bbox::world_point_to_tile(
            WorldXy::new(mid.x, mid.y),
            12,
        );
        tidemark_core::bbox::tile_to_box(tile.zoom, tile.x, tile.y, 0)
    }

    #[test]
    fn test_prepare_binds_and_caches() {
        let s52 = s52();
        let chart = test_chart();
        let p1 = chart.prepare(&s52, None);
        let p2 = chart.prepare(&s52, None);
        assert!(Arc::ptr_eq(&p1, &p2));
        assert_eq!(p1.objects.len(), 2);
        assert!(p1.objects.iter().all(|o| o.lup().is_some()));
    }

    #[test]
    fn test_prepare_rebuilds_on_snapshot_change() {
        let chart = test_chart();
        let p1 = chart.prepare(&s52(), None);
        let mut settings = RenderSettings::default();
        settings.safety_contour = 8.0;
        let mut data = S52Data::new(settings.into_shared());
        data.add_lup(lup(1, "DEPARE", 42, LupTable::PlainBoundaries, "CS(DEPARE02)"))
            .unwrap();
        data.build_rules().unwrap();
        let p2 = chart.prepare(&Arc::new(data), None);
        assert!(!Arc::ptr_eq(&p1, &p2));
    }

    #[test]
    fn test_render_fills_area_pass() {
        let s52 = s52();
        let chart = test_chart();
        let tile = center_tile(&chart);
        let mut ctx = RenderContext::new(s52.clone(), 25_000, None);
        let mut dc = DrawingContext::new(256, 256);
        chart.render(0, &mut ctx, &mut dc, &tile);
        // DEPARE02 with drval 3..4 fills medium shallow
        let expected = s52.convert_color("DEPMS");
        assert_eq!(dc.pixel(128, 128), Some(expected));
    }

    #[test]
    fn test_feature_info_finds_area() {
        let s52 = s52();
        let chart = test_chart();
        let tile = center_tile(&chart);
        let click = PixelBox::new(0, 0, 32, 32);
        let mut ctx = RenderContext::with_extent(s52, 25_000, None, click);
        let mut dc = DrawingContext::new(33, 33);
        dc.set_check_only(true);
        let descriptions = chart.feature_info(&mut ctx, &mut dc, &tile, false);
        assert!(descriptions.iter().any(|d| d.class == "DEPARE"));
        // check-only left the buffer untouched
        assert!(dc.pixel(10, 10) == Some(0));
    }

    #[test]
    fn test_cache_value_size() {
        let chart = test_chart();
        assert!(chart.size_kb() >= 1);
    }
}
