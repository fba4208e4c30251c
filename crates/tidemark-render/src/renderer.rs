//! The tile renderer
//!
//! One `render_tile` call owns its drawing buffer and runs single
//! threaded; concurrency comes from the HTTP workers calling it in
//! parallel. Charts of equal native scale form groups; within a group
//! every render pass runs over all group members before the next pass,
//! so overlapping charts of the same scale composite consistently.

use crate::chart::RenderChart;
use crate::context::RenderContext;
use crate::description::{dedupe_and_sort, ObjectDescription};
use crate::error::{RenderError, RenderResult};
use crate::font::FontBook;
use crate::helper;
use crate::png;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tidemark_cache::{CacheError, CacheResult, ChartCache, OpenOutcome, OpenerPool, TileCache, TileCacheKey};
use tidemark_catalog::{Catalog, ChartInfo};
use tidemark_core::bbox::{tile_id_to_box, world_extent_to_pixel, PixelBox, TileId};
use tidemark_core::coord::{PixelXy, TILE_SIZE};
use tidemark_core::scale::ZoomLevelScales;
use tidemark_draw::DrawingContext;
use tidemark_s52::S52Data;
use tidemark_s57::senc;
use tracing::{debug, error, info, warn};

/// Renderer configuration
#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    /// Draw a tile outline and the tile address
    pub render_debug: bool,
}

/// The renderer; one instance serves all tile and feature-info requests.
pub struct Renderer {
    catalog: Arc<Catalog>,
    chart_cache: Arc<ChartCache<RenderChart>>,
    tile_cache: Arc<TileCache>,
    opener: Option<Arc<OpenerPool>>,
    s52: RwLock<Arc<S52Data>>,
    fonts: Option<Arc<FontBook>>,
    config: RendererConfig,
}

impl Renderer {
    /// Wire up the renderer
    pub fn new(
        catalog: Arc<Catalog>,
        chart_cache: Arc<ChartCache<RenderChart>>,
        tile_cache: Arc<TileCache>,
        opener: Option<Arc<OpenerPool>>,
        s52: Arc<S52Data>,
        fonts: Option<Arc<FontBook>>,
        config: RendererConfig,
    ) -> Self {
        Renderer {
            catalog,
            chart_cache,
            tile_cache,
            opener,
            s52: RwLock::new(s52),
            fonts,
            config,
        }
    }

    /// The active S-52 snapshot
    pub fn s52(&self) -> Arc<S52Data> {
        self.s52.read().clone()
    }

    /// The catalog in use
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The tile cache in use
    pub fn tile_cache(&self) -> &Arc<TileCache> {
        &self.tile_cache
    }

    /// The chart cache in use
    pub fn chart_cache(&self) -> &Arc<ChartCache<RenderChart>> {
        &self.chart_cache
    }

    /// Publish a new S-52 snapshot (settings change).
    ///
    /// Running renders keep the old snapshot; tiles rendered for older
    /// sequences are dropped from the tile cache.
    pub fn update_s52(&self, s52: Arc<S52Data>) {
        let sequence = s52.sequence();
        *self.s52.write() = s52;
        let removed = self.tile_cache.clean_by_settings(sequence);
        info!(sequence, removed, "published new s52 snapshot");
    }

    /// Open a chart through the cache, loading it on a miss.
    pub async fn open_chart(
        &self,
        set_key: &str,
        info: &Arc<ChartInfo>,
        wait: bool,
    ) -> CacheResult<OpenOutcome<RenderChart>> {
        let key = ChartCache::<RenderChart>::key(set_key, &info.file_name);
        let loader = self.make_loader(set_key, info);
        let rt = self.chart_cache.open(&key, wait, loader).await;
        match &rt {
            Ok(_) => info.record_open_ok(),
            Err(e) => {
                let errors = info.record_open_error();
                if errors >= 2 {
                    debug!(key, error = %e, errors, "chart open failed again");
                } else {
                    error!(key, error = %e, "chart open failed");
                }
            }
        }
        rt
    }

    /// Open a chart addressed by set key and file name
    pub async fn open_chart_by_name(
        &self,
        set_key: &str,
        chart_name: &str,
        wait: bool,
    ) -> CacheResult<OpenOutcome<RenderChart>> {
        let set = self
            .catalog
            .set(set_key)
            .ok_or_else(|| CacheError::Internal(format!("unknown set {}", set_key)))?;
        let info = set
            .chart(chart_name)
            .ok_or_else(|| CacheError::FileMissing(chart_name.to_string()))?
            .clone();
        self.open_chart(set_key, &info, wait).await
    }

    /// Close one chart; returns whether an entry was removed
    pub fn close_chart(&self, set_key: &str, chart_name: &str) -> bool {
        self.chart_cache
            .close(&ChartCache::<RenderChart>::key(set_key, chart_name))
    }

    /// A chart set was added, removed or replaced: drop everything
    /// cached for it. The install/upload collaborators call this after
    /// mutating the catalog.
    pub fn set_changed(&self, set_key: &str) {
        let tiles = self.tile_cache.clean_set(set_key);
        let charts = self.chart_cache.close_set(set_key);
        info!(set_key, tiles, charts, "dropped caches for changed set");
    }

    fn make_loader(
        &self,
        set_key: &str,
        info: &Arc<ChartInfo>,
    ) -> impl FnOnce() -> std::pin::Pin<
        Box<dyn std::future::Future<Output = CacheResult<RenderChart>> + Send>,
    > {
        let catalog = self.catalog.clone();
        let opener = self.opener.clone();
        let s52 = self.s52();
        let fonts = self.fonts.clone();
        let set_key = set_key.to_string();
        let info = info.clone();
        move || {
            Box::pin(async move {
                load_chart(catalog, opener, s52, fonts, set_key, info).await
            })
        }
    }

    /// Render one tile to PNG.
    ///
    /// Consults the tile cache first; a [`RenderError::NoCharts`] means
    /// the tile lies outside the set and maps to the empty-tile
    /// response.
    pub async fn render_tile(&self, set_key: &str, tile: TileId) -> RenderResult<Bytes> {
        let s52 = self.s52();
        let settings = s52.settings().clone();
        let set = self
            .catalog
            .set(set_key)
            .ok_or_else(|| RenderError::UnknownSet(set_key.to_string()))?;
        let cache_key = TileCacheKey {
            set_key: set_key.to_string(),
            set_token: set.token.clone(),
            settings_sequence: s52.sequence(),
            tile,
        };
        if let Some(png) = self.tile_cache.get(&cache_key) {
            return Ok(png);
        }

        let tile_box = tile_id_to_box(tile, 0);
        let render_charts = self.catalog.find_charts_for_tile(&settings, tile, false);
        if render_charts.is_empty() && !tile_box.intersects(&set.extent) {
            return Err(RenderError::NoCharts(tile));
        }

        let scales = ZoomLevelScales::new(settings.scale);
        let mut ctx = RenderContext::new(s52.clone(), scales.scale_for_zoom(tile.zoom), self.fonts.clone());
        let mut drawing = DrawingContext::new(TILE_SIZE, TILE_SIZE);

        // warm-open everything through the pool without blocking
        let mut open: Vec<Option<Arc<RenderChart>>> = Vec::with_capacity(render_charts.len());
        if self.opener.is_some() {
            for wc in &render_charts {
                match self.open_chart(&wc.set_key, &wc.info, false).await {
                    Ok(OpenOutcome::Ready(c)) => open.push(Some(c)),
                    _ => open.push(None),
                }
            }
        } else {
            open.resize_with(render_charts.len(), || None);
        }

        // walk the weighted list, grouping consecutive equal scales
        let mut idx = 0;
        while idx < render_charts.len() {
            let group_scale = render_charts[idx].weight;
            let mut group: Vec<(usize, Arc<RenderChart>)> = Vec::new();
            while idx < render_charts.len() && render_charts[idx].weight == group_scale {
                let wc = &render_charts[idx];
                let chart = match open[idx].take() {
                    Some(c) => Some(c),
                    None => match self.open_chart(&wc.set_key, &wc.info, true).await {
                        Ok(OpenOutcome::Ready(c)) => Some(c),
                        // pending or failed (already logged): skip the chart
                        _ => None,
                    },
                };
                if let Some(chart) = chart {
                    group.push((idx, chart));
                }
                idx += 1;
            }
            let max_passes = group
                .iter()
                .map(|(_, c)| c.render_passes())
                .max()
                .unwrap_or(0);
            for pass in 0..max_passes {
                for (chart_idx, chart) in &group {
                    chart.render(pass, &mut ctx, &mut drawing, &render_charts[*chart_idx].tile);
                }
            }
            // declutter stays deterministic per tile: reset between groups
            ctx.text_boxes.clear();
        }

        if settings.show_chart_bounds {
            self.draw_chart_bounds(&mut drawing, &s52, set_key, &tile_box);
        }
        if self.config.render_debug {
            self.draw_debug_frame(&mut drawing, &tile);
        }

        let encoded = png::encode(&drawing)?;
        // a settings bump while rendering must not leave a stale-keyed tile
        if self.s52().sequence() == cache_key.settings_sequence {
            self.tile_cache.put(cache_key, encoded.clone());
        }
        Ok(encoded)
    }

    fn draw_chart_bounds(
        &self,
        drawing: &mut DrawingContext,
        s52: &S52Data,
        set_key: &str,
        tile_box: &tidemark_core::bbox::TileBox,
    ) {
        let bounding_color = s52.convert_color("XACBND");
        for extent in self.catalog.set_extents(set_key, true) {
            let pixel_extent = world_extent_to_pixel(&extent, tile_box);
            drawing.draw_hline(pixel_extent.ymin, pixel_extent.xmin, pixel_extent.xmax, bounding_color, false, None);
            drawing.draw_hline(pixel_extent.ymax, pixel_extent.xmin, pixel_extent.xmax, bounding_color, false, None);
            drawing.draw_vline(pixel_extent.xmin, pixel_extent.ymin, pixel_extent.ymax, bounding_color, false, None);
            drawing.draw_vline(pixel_extent.xmax, pixel_extent.ymin, pixel_extent.ymax, bounding_color, false, None);
        }
    }

    fn draw_debug_frame(&self, drawing: &mut DrawingContext, tile: &TileId) {
        let c = tidemark_draw::convert_color(255, 0, 0, 255);
        let max = TILE_SIZE as i32 - 1;
        drawing.draw_hline(0, 0, max, c, false, None);
        drawing.draw_hline(max, 0, max, c, false, None);
        drawing.draw_vline(0, 0, max, c, false, None);
        drawing.draw_vline(max, 0, max, c, false, None);
        if let Some(fonts) = &self.fonts {
            let fm = fonts.manager(crate::font::FontType::Text, crate::font::DEFAULT_FONT_SIZE);
            helper::draw_text(
                &fm,
                drawing,
                &tile.to_string(),
                PixelXy::new(20, max - 3),
                c,
            );
        }
    }

    /// Describe the features under a click box.
    ///
    /// Iterates charts from coarsest to finest (the reverse of the
    /// render order) so detail charts refine what base charts report.
    pub async fn feature_info(
        &self,
        set_key: &str,
        tile: TileId,
        click_box: PixelBox,
        overview: bool,
    ) -> RenderResult<Vec<ObjectDescription>> {
        let s52 = self.s52();
        let settings = s52.settings().clone();
        let render_charts = self.catalog.find_charts_for_tile(&settings, tile, true);
        if render_charts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(tile = %tile, charts = render_charts.len(), "feature info");
        let scales = ZoomLevelScales::new(settings.scale);
        let tile_box = tile_id_to_box(tile, 0);
        let click_tile = click_tile_box(&tile_box, &click_box);
        let width = (click_box.xmax - click_box.xmin + 1).max(1);
        let height = (click_box.ymax - click_box.ymin + 1).max(1);
        let local_extent = PixelBox::new(0, 0, width - 1, height - 1);
        let mut rt = Vec::new();
        for wc in render_charts.iter().rev() {
            let chart = match self.open_chart(&wc.set_key, &wc.info, true).await {
                Ok(OpenOutcome::Ready(c)) => c,
                Ok(OpenOutcome::Pending) => continue,
                Err(e) => {
                    warn!(chart = %wc.info.file_name, error = %e, "feature info: unable to open chart");
                    continue;
                }
            };
            let mut ctx = RenderContext::with_extent(
                s52.clone(),
                scales.scale_for_zoom(tile.zoom),
                self.fonts.clone(),
                local_extent,
            );
            let mut dc = DrawingContext::new(width as u32, height as u32);
            dc.set_check_only(true);
            // keep the chart's antimeridian adjusted variant
            let shifted = click_tile.shifted(wc.tile.xmin - tile_box.xmin, 0);
            rt.extend(chart.feature_info(&mut ctx, &mut dc, &shifted, overview));
        }
        Ok(dedupe_and_sort(rt))
    }
}

/// The world box of a click region inside a tile, tagged with the tile's
/// zoom so per-pixel conversions keep working.
fn click_tile_box(
    tile_box: &tidemark_core::bbox::TileBox,
    click_box: &PixelBox,
) -> tidemark_core::bbox::TileBox {
    let min = tile_box.rel_pixel_to_world(PixelXy::new(click_box.xmin, click_box.ymin));
    let max = tile_box.rel_pixel_to_world(PixelXy::new(click_box.xmax + 1, click_box.ymax + 1));
    tidemark_core::bbox::TileBox {
        zoom: tile_box.zoom,
        xmin: min.x,
        ymin: min.y,
        xmax: max.x - 1,
        ymax: max.y - 1,
    }
}

/// Load one chart: read the bytes (through the opener for encrypted
/// formats), parse the stream, derive render data, and feed fresh header
/// values back into the catalog.
async fn load_chart(
    catalog: Arc<Catalog>,
    opener: Option<Arc<OpenerPool>>,
    s52: Arc<S52Data>,
    fonts: Option<Arc<FontBook>>,
    set_key: String,
    info: Arc<ChartInfo>,
) -> CacheResult<RenderChart> {
    let set = catalog
        .set(&set_key)
        .ok_or_else(|| CacheError::Internal(format!("unknown set {}", set_key)))?;
    let path = set.info.directory.join(&info.file_name);
    if !path.exists() {
        return Err(CacheError::FileMissing(path.display().to_string()));
    }
    let data = match (&opener, info.chart_type.needs_opener()) {
        (Some(pool), true) => {
            pool.read_chart(info.chart_type.open_full_cmd(), &path.display().to_string())
                .await?
        }
        (None, true) => {
            return Err(CacheError::MissingKey(format!(
                "no opener pool for encrypted chart {}",
                info.file_name
            )))
        }
        _ => tokio::fs::read(&path)
            .await
            .map_err(|e| CacheError::Internal(e.to_string()))?,
    };
    let chart = senc::read_stream(
        &data,
        &set_key,
        &info.file_name,
        info.chart_type,
        false,
    )
    .map_err(|e| annotate(e, &info.file_name))?;
    debug!(
        chart = %info.file_name,
        objects = chart.objects.len(),
        scale = chart.native_scale,
        "chart parsed"
    );
    if !info.is_complete() {
        let _ = catalog.update_chart_info(
            &set_key,
            &info.file_name,
            chart.native_scale,
            chart.extent,
        );
    }
    let render_chart = RenderChart::new(Arc::new(chart));
    render_chart.prepare(&s52, fonts.as_ref());
    Ok(render_chart)
}

fn annotate(e: tidemark_s57::S57Error, file_name: &str) -> CacheError {
    use tidemark_s57::S57Error;
    match e {
        S57Error::VersionMismatch(_) => CacheError::VersionMismatch(file_name.to_string()),
        S57Error::LicenceExpired => CacheError::LicenceExpired(file_name.to_string()),
        S57Error::DecryptError(_) => CacheError::DecryptError(file_name.to_string()),
        other => CacheError::InvalidChart(file_name.to_string(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_cache::ChartCacheConfig;
    use tidemark_catalog::chart_set::SetState;
    use tidemark_s52::attributes::attr;
    use tidemark_s52::data::ColorTable;
    use tidemark_s52::lup::LupRecord;
    use tidemark_s52::rules::RuleList;
    use tidemark_s52::types::{DisCat, LupTable, RadPrio, RgbColor};
    use tidemark_s52::RenderSettings;
    use tidemark_s57::senc::StreamWriter;

    fn s52(sequence: u64) -> Arc<S52Data> {
        let mut settings = RenderSettings::default();
        settings.sequence = sequence;
        let mut data = S52Data::new(settings.into_shared());
        let mut table = ColorTable {
            name: "DAY_BRIGHT".into(),
            colors: Default::default(),
        };
        table.colors.insert("DEPMS".into(), RgbColor::new(150, 200, 230));
        table.colors.insert("DEPVS".into(), RgbColor::new(180, 220, 240));
        table.colors.insert("DEPMD".into(), RgbColor::new(120, 180, 220));
        table.colors.insert("DEPDW".into(), RgbColor::new(100, 160, 210));
        table.colors.insert("DEPIT".into(), RgbColor::new(200, 220, 170));
        data.add_color_table(table).unwrap();
        data.add_lup(LupRecord {
            rcid: 1,
            obj_class: "DEPARE".into(),
            feature_type_code: 42,
            table: LupTable::PlainBoundaries,
            display_priority: 3,
            radar_priority: RadPrio::Over,
            attributes: Default::default(),
            instruction: "CS(DEPARE02)".into(),
            display_category: DisCat::Standard,
            comment_group: 0,
            sequence: 1,
            rule_list: RuleList::default(),
        })
        .unwrap();
        data.build_rules().unwrap();
        Arc::new(data)
    }

    fn write_chart(dir: &std::path::Path, name: &str) {
        let mut w = StreamWriter::new();
        w.version(200)
            .cell_name("T1")
            .extent(54.0, 11.0, 55.0, 12.0)
            .native_scale(25000)
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
            );
        std::fs::write(dir.join(name), w.finish()).unwrap();
    }

    async fn renderer_with_chart() -> (Renderer, TileId, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        write_chart(dir.path(), "T1.senc");
        let catalog = Arc::new(Catalog::new());
        let set = catalog.scan_directory(dir.path()).unwrap();
        // header values come from the info cache path in production
        catalog
            .update_chart_info(
                &set.key,
                "T1.senc",
                25000,
                tidemark_core::bbox::LatLonBox {
                    w_lon: 11.0,
                    e_lon: 12.0,
                    s_lat: 54.0,
                    n_lat: 55.0,
                }
                .to_world(),
            )
            .unwrap();
        catalog.set_state(&set.key, SetState::Ready).unwrap();
        let renderer = Renderer::new(
            catalog,
            Arc::new(ChartCache::new(ChartCacheConfig::default())),
            Arc::new(TileCache::new(16 * 1024 * 1024)),
            None,
            s52(1),
            None,
            RendererConfig::default(),
        );
        let tile = tidemark_core::bbox::world_point_to_tile(
            tidemark_core::coord::lat_lon_to_world(54.5, 11.5),
            11,
        );
        (renderer, tile, dir)
    }

    #[tokio::test]
    async fn test_render_tile_produces_png_and_caches() {
        let (renderer, tile, _dir) = renderer_with_chart().await;
        let set_key = renderer.catalog().sets()[0].key.clone();
        let png = renderer.render_tile(&set_key, tile).await.unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
        let (hits_before, _) = renderer.tile_cache().stats();
        let png2 = renderer.render_tile(&set_key, tile).await.unwrap();
        assert_eq!(png, png2);
        let (hits_after, _) = renderer.tile_cache().stats();
        assert_eq!(hits_after, hits_before + 1);
    }

    #[tokio::test]
    async fn test_render_tile_outside_set_is_no_charts() {
        let (renderer, _tile, _dir) = renderer_with_chart().await;
        let set_key = renderer.catalog().sets()[0].key.clone();
        let far = tidemark_core::bbox::world_point_to_tile(
            tidemark_core::coord::lat_lon_to_world(-30.0, -120.0),
            11,
        );
        let err = renderer.render_tile(&set_key, far).await.unwrap_err();
        assert!(matches!(err, RenderError::NoCharts(_)));
    }

    #[tokio::test]
    async fn test_settings_bump_invalidates_tiles() {
        let (renderer, tile, _dir) = renderer_with_chart().await;
        let set_key = renderer.catalog().sets()[0].key.clone();
        let _ = renderer.render_tile(&set_key, tile).await.unwrap();
        assert_eq!(renderer.tile_cache().len(), 1);
        renderer.update_s52(s52(2));
        assert_eq!(renderer.tile_cache().len(), 0);
        let _ = renderer.render_tile(&set_key, tile).await.unwrap();
        assert_eq!(renderer.tile_cache().len(), 1);
    }

    #[tokio::test]
    async fn test_feature_info_returns_descriptions() {
        let (renderer, tile, _dir) = renderer_with_chart().await;
        let set_key = renderer.catalog().sets()[0].key.clone();
        let click = PixelBox::new(0, 0, 32, 32);
        let list = renderer
            .feature_info(&set_key, tile, click, false)
            .await
            .unwrap();
        assert!(!list.is_empty());
        assert_eq!(list[0].class, "DEPARE");
    }

    #[tokio::test]
    async fn test_unknown_set_errors() {
        let (renderer, tile, _dir) = renderer_with_chart().await;
        let err = renderer.render_tile("nope", tile).await.unwrap_err();
        assert!(matches!(err, RenderError::UnknownSet(_)));
    }
}
