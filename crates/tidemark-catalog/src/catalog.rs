//! The chart set catalog and tile-to-chart lookup

use crate::chart_info::ChartInfo;
use crate::chart_set::{ChartSet, SetState};
use crate::error::{CatalogError, CatalogResult};
use crate::set_info::ChartSetInfo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tidemark_core::bbox::{tile_id_to_box, Extent, TileBox, TileId};
use tidemark_core::coord::Limits;
use tidemark_core::scale::ZoomLevelScales;
use tidemark_s52::RenderSettings;
use tidemark_s57::ChartType;
use tracing::{debug, info, warn};

/// Pixel border used when matching charts against a tile, so features
/// slightly outside still draw their overhanging symbology
pub const TILE_PIXEL_BORDER: i32 = 50;

/// How much coarser than the tile scale a chart may be before it is
/// dropped from normal rendering (feature info keeps all of them)
const COARSE_SCALE_FACTOR: f64 = 4.0;

/// One chart selected for a tile
#[derive(Debug, Clone)]
pub struct WeightedChart {
    /// Sort weight (the chart's native scale)
    pub weight: i32,
    /// Key of the owning set
    pub set_key: String,
    /// The chart header info
    pub info: Arc<ChartInfo>,
    /// The tile box to use for this chart; shifted by a whole earth for
    /// charts crossing the antimeridian
    pub tile: TileBox,
}

/// The catalog of installed chart sets.
///
/// The map of sets is guarded by a lock held only for the swap; all
/// heavy work happens on snapshots outside the lock.
#[derive(Default)]
pub struct Catalog {
    sets: RwLock<HashMap<String, Arc<ChartSet>>>,
}

/// Derive the stable set key from an absolute directory path.
///
/// The last two path components are joined and non key-safe characters
/// are mapped away, which keeps the key stable across re-installs into
/// the same location.
pub fn key_from_directory(directory: &Path) -> String {
    let mut parts: Vec<String> = directory
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(p) => Some(p.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    let tail: Vec<String> = parts.split_off(parts.len().saturating_sub(2));
    tail.join("-")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

impl Catalog {
    /// An empty catalog
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Scan one set directory and register (or replace) its set.
    ///
    /// Chart headers are not read here; infos start incomplete and are
    /// filled by the chart manager (or the persisted info cache).
    pub fn scan_directory(&self, directory: &Path) -> CatalogResult<Arc<ChartSet>> {
        let key = key_from_directory(directory);
        let set_info = ChartSetInfo::parse(directory, &key)?;
        let mut set = ChartSet::new(key.clone(), set_info);
        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if ChartType::from_file_name(&name) == ChartType::Unknown {
                continue;
            }
            let meta = entry.metadata()?;
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            set.charts
                .push(Arc::new(ChartInfo::new(name, meta.len(), mtime)));
        }
        set.recompute();
        info!(key, charts = set.num_charts(), "scanned chart set");
        let set = Arc::new(set);
        self.sets.write().insert(key, set.clone());
        Ok(set)
    }

    /// Look up a set snapshot
    pub fn set(&self, key: &str) -> Option<Arc<ChartSet>> {
        self.sets.read().get(key).cloned()
    }

    /// All set snapshots
    pub fn sets(&self) -> Vec<Arc<ChartSet>> {
        self.sets.read().values().cloned().collect()
    }

    /// Remove a set; returns whether it existed
    pub fn remove_set(&self, key: &str) -> bool {
        let removed = self.sets.write().remove(key).is_some();
        if removed {
            info!(key, "removed chart set");
        }
        removed
    }

    /// Replace a set snapshot produced by a mutation
    pub fn replace_set(&self, set: ChartSet) -> Arc<ChartSet> {
        let mut set = set;
        set.sequence += 1;
        set.recompute();
        let arc = Arc::new(set);
        self.sets.write().insert(arc.key.clone(), arc.clone());
        arc
    }

    /// Update one chart info inside a set (after a header read) and swap
    /// in the new snapshot.
    pub fn update_chart_info(
        &self,
        set_key: &str,
        file_name: &str,
        native_scale: i32,
        extent: Extent,
    ) -> CatalogResult<()> {
        let current = self
            .set(set_key)
            .ok_or_else(|| CatalogError::UnknownSet(set_key.to_string()))?;
        let mut set = (*current).clone();
        let mut found = false;
        for c in set.charts.iter_mut() {
            if c.file_name == file_name {
                let mut info = (**c).clone();
                info.native_scale = native_scale;
                info.extent = extent;
                *c = Arc::new(info);
                found = true;
                break;
            }
        }
        if !found {
            warn!(set_key, file_name, "chart info update for unknown chart");
            return Ok(());
        }
        if set.state == SetState::Init && set.charts.iter().all(|c| c.is_complete()) {
            set.state = SetState::Ready;
        }
        self.replace_set(set);
        Ok(())
    }

    /// Drop chart infos whose file vanished from disk.
    ///
    /// Used after a start from the persisted info cache: entries read
    /// back for files that are gone must not linger. Returns the number
    /// of removed charts.
    pub fn remove_unverified(&self) -> usize {
        let mut removed = 0;
        for current in self.sets() {
            let missing: Vec<String> = current
                .charts
                .iter()
                .filter(|c| !current.info.directory.join(&c.file_name).exists())
                .map(|c| c.file_name.clone())
                .collect();
            if missing.is_empty() {
                continue;
            }
            let mut set = (*current).clone();
            set.charts.retain(|c| !missing.contains(&c.file_name));
            removed += missing.len();
            warn!(set = %set.key, removed = missing.len(), "removed vanished charts");
            self.replace_set(set);
        }
        removed
    }

    /// Mark a set's lifecycle state
    pub fn set_state(&self, set_key: &str, state: SetState) -> CatalogResult<()> {
        let current = self
            .set(set_key)
            .ok_or_else(|| CatalogError::UnknownSet(set_key.to_string()))?;
        let mut set = (*current).clone();
        set.state = state;
        self.replace_set(set);
        Ok(())
    }

    /// The extents of a set (member extents, optionally prefixed with
    /// the set union)
    pub fn set_extents(&self, set_key: &str, include_set: bool) -> Vec<Extent> {
        let Some(set) = self.set(set_key) else {
            return Vec::new();
        };
        let mut rt = Vec::new();
        if include_set && set.extent.valid {
            rt.push(set.extent);
        }
        for c in &set.charts {
            if c.extent.valid {
                rt.push(c.extent);
            }
        }
        rt
    }

    /// Find the charts to render for a tile.
    ///
    /// Returns the weighted list sorted ascending by (native scale,
    /// chart name): the largest-scale charts come first. Charts crossing
    /// the antimeridian are matched against the tile box shifted by a
    /// whole earth east and west and carry the shifted box that
    /// intersected.
    ///
    /// Rendering drops charts that are much coarser than the tile's
    /// nominal scale; `all_lower` keeps them (feature info iterates from
    /// the coarse end).
    pub fn find_charts_for_tile(
        &self,
        settings: &RenderSettings,
        tile: TileId,
        all_lower: bool,
    ) -> Vec<WeightedChart> {
        let tile_box = tile_id_to_box(tile, TILE_PIXEL_BORDER);
        let scales = ZoomLevelScales::new(settings.scale);
        let zoom_scale = scales.scale_for_zoom(tile.zoom) as f64;
        let max_scale = (zoom_scale * COARSE_SCALE_FACTOR) as i32;
        let mut rt: Vec<WeightedChart> = Vec::new();
        for set in self.sets.read().values() {
            if !set.is_active() {
                continue;
            }
            if !tile_box.intersects(&set.extent)
                && !tile_box
                    .shifted(Limits::WORLD_SHIFT, 0)
                    .intersects(&set.extent)
                && !tile_box
                    .shifted(-Limits::WORLD_SHIFT, 0)
                    .intersects(&set.extent)
            {
                continue;
            }
            for chart in &set.charts {
                if !chart.is_complete() {
                    continue;
                }
                if !all_lower && chart.native_scale > max_scale {
                    continue;
                }
                let variant = [
                    tile_box,
                    tile_box.shifted(Limits::WORLD_SHIFT, 0),
                    tile_box.shifted(-Limits::WORLD_SHIFT, 0),
                ]
                .into_iter()
                .find(|tb| tb.intersects(&chart.extent));
                if let Some(tb) = variant {
                    rt.push(WeightedChart {
                        weight: chart.native_scale,
                        set_key: set.key.clone(),
                        info: chart.clone(),
                        tile: tb,
                    });
                }
            }
        }
        rt.sort_by(|a, b| {
            a.weight
                .cmp(&b.weight)
                .then_with(|| a.info.file_name.cmp(&b.info.file_name))
        });
        debug!(
            tile = %tile,
            charts = rt.len(),
            all_lower,
            "tile chart lookup"
        );
        rt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::bbox::world_point_to_tile;
    use tidemark_core::coord::lat_lon_to_world;

    fn catalog_with_set(key: &str, charts: &[(&str, i32, f64, f64, f64, f64)]) -> Catalog {
        let catalog = Catalog::new();
        let mut set = ChartSet::new(key, ChartSetInfo::default());
        for (name, scale, w_lon, s_lat, e_lon, n_lat) in charts {
            let mut info = ChartInfo::new(format!("{}.oesu", name), 10, 1);
            info.native_scale = *scale;
            info.extent = tidemark_core::bbox::LatLonBox {
                w_lon: *w_lon,
                s_lat: *s_lat,
                e_lon: *e_lon,
                n_lat: *n_lat,
            }
            .to_world();
            set.charts.push(Arc::new(info));
        }
        set.state = SetState::Ready;
        set.recompute();
        catalog.sets.write().insert(key.to_string(), Arc::new(set));
        catalog
    }

    fn tile_at(lat: f64, lon: f64, zoom: u32) -> TileId {
        world_point_to_tile(lat_lon_to_world(lat, lon), zoom)
    }

    #[test]
    fn test_key_from_directory() {
        assert_eq!(
            key_from_directory(Path::new("/data/charts/oesu-db/DE_Set1")),
            "oesu-db-DE_Set1"
        );
        assert_eq!(
            key_from_directory(Path::new("/a b/c$d")),
            "a_b-c_d"
        );
    }

    #[test]
    fn test_find_orders_by_scale_then_name() {
        let catalog = catalog_with_set(
            "s1",
            &[
                ("coarse", 90000, 10.0, 53.0, 13.0, 56.0),
                ("fine_b", 12000, 11.0, 54.0, 12.0, 55.0),
                ("fine_a", 12000, 11.0, 54.0, 12.0, 55.0),
            ],
        );
        let settings = RenderSettings::default();
        let tile = tile_at(54.5, 11.5, 12);
        let found = catalog.find_charts_for_tile(&settings, tile, false);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].info.file_name, "fine_a.oesu");
        assert_eq!(found[1].info.file_name, "fine_b.oesu");
        assert_eq!(found[2].info.file_name, "coarse.oesu");
    }

    #[test]
    fn test_find_filters_inactive_and_coarse() {
        let catalog = catalog_with_set(
            "s1",
            &[
                ("fine", 12000, 11.0, 54.0, 12.0, 55.0),
                ("very_coarse", 5_000_000, 0.0, 40.0, 30.0, 60.0),
            ],
        );
        let settings = RenderSettings::default();
        let tile = tile_at(54.5, 11.5, 14);
        let found = catalog.find_charts_for_tile(&settings, tile, false);
        assert_eq!(found.len(), 1);
        // feature info keeps the coarse chart
        let all = catalog.find_charts_for_tile(&settings, tile, true);
        assert_eq!(all.len(), 2);
        // a disabled set returns nothing
        catalog.set_state("s1", SetState::Disabled).unwrap();
        assert!(catalog
            .find_charts_for_tile(&settings, tile, false)
            .is_empty());
    }

    #[test]
    fn test_update_chart_info_promotes_set() {
        let catalog = Catalog::new();
        let mut set = ChartSet::new("s1", ChartSetInfo::default());
        set.charts.push(Arc::new(ChartInfo::new("a.oesu", 10, 1)));
        set.recompute();
        catalog.sets.write().insert("s1".into(), Arc::new(set));
        assert_eq!(catalog.set("s1").unwrap().state, SetState::Init);
        catalog
            .update_chart_info(
                "s1",
                "a.oesu",
                25000,
                Extent::new(0, 0, 1000, 1000),
            )
            .unwrap();
        let set = catalog.set("s1").unwrap();
        assert_eq!(set.state, SetState::Ready);
        assert_eq!(set.min_scale, 25000);
        assert!(set.sequence > 0);
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let catalog = catalog_with_set("s1", &[("fine", 12000, 11.0, 54.0, 12.0, 55.0)]);
        let settings = RenderSettings::default();
        let tile = tile_at(54.5, 11.5, 12);
        let found = catalog.find_charts_for_tile(&settings, tile, false);
        assert!(catalog.remove_set("s1"));
        // the returned snapshot stays intact
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].info.file_name, "fine.oesu");
    }
}
