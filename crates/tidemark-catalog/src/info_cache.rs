//! Persisted chart-info cache
//!
//! Header parsing of every chart on startup is expensive (each parse
//! goes through an opener helper). The catalog therefore persists the
//! header results keyed by file size and mtime; on the next start only
//! changed files need a real parse.

use crate::catalog::Catalog;
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tidemark_core::bbox::Extent;
use tracing::{debug, info};

/// One cached chart header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedChartInfo {
    /// File name inside the set
    pub file_name: String,
    /// File size the header was read for
    pub file_size: u64,
    /// Modification time the header was read for
    pub mtime: i64,
    /// Native scale
    pub native_scale: i32,
    /// Chart extent
    pub extent: Extent,
}

/// The cache file content: cached headers per set key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartInfoCache {
    /// Format version
    pub version: u32,
    /// Cached infos per set
    pub sets: HashMap<String, Vec<CachedChartInfo>>,
}

const CACHE_VERSION: u32 = 1;

impl ChartInfoCache {
    /// Collect the current state of a catalog
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut sets = HashMap::new();
        for set in catalog.sets() {
            let entries: Vec<CachedChartInfo> = set
                .charts
                .iter()
                .filter(|c| c.is_complete())
                .map(|c| CachedChartInfo {
                    file_name: c.file_name.clone(),
                    file_size: c.file_size,
                    mtime: c.mtime,
                    native_scale: c.native_scale,
                    extent: c.extent,
                })
                .collect();
            if !entries.is_empty() {
                sets.insert(set.key.clone(), entries);
            }
        }
        ChartInfoCache {
            version: CACHE_VERSION,
            sets,
        }
    }

    /// Write the cache file
    pub fn write(&self, path: &Path) -> CatalogResult<()> {
        let encoded = serde_json::to_vec_pretty(self)
            .map_err(|e| CatalogError::InfoCache(e.to_string()))?;
        std::fs::write(path, encoded)?;
        info!(path = %path.display(), sets = self.sets.len(), "wrote chart info cache");
        Ok(())
    }

    /// Read a cache file
    pub fn read(path: &Path) -> CatalogResult<ChartInfoCache> {
        let data = std::fs::read(path)?;
        let cache: ChartInfoCache =
            serde_json::from_slice(&data).map_err(|e| CatalogError::InfoCache(e.to_string()))?;
        if cache.version != CACHE_VERSION {
            return Err(CatalogError::InfoCache(format!(
                "unsupported cache version {}",
                cache.version
            )));
        }
        Ok(cache)
    }

    /// Apply cached headers to a catalog.
    ///
    /// Only entries whose size and mtime still match are used; returns
    /// the number of charts that still need a real header parse.
    pub fn apply(&self, catalog: &Catalog) -> usize {
        let mut missing = 0;
        for set in catalog.sets() {
            let cached = self.sets.get(&set.key);
            for chart in &set.charts {
                if chart.is_complete() {
                    continue;
                }
                let hit = cached.and_then(|entries| {
                    entries.iter().find(|e| {
                        e.file_name == chart.file_name
                            && e.file_size == chart.file_size
                            && e.mtime == chart.mtime
                    })
                });
                match hit {
                    Some(e) => {
                        let _ = catalog.update_chart_info(
                            &set.key,
                            &e.file_name,
                            e.native_scale,
                            e.extent,
                        );
                        debug!(set = %set.key, chart = %e.file_name, "chart info from cache");
                    }
                    None => missing += 1,
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_info::ChartInfo;
    use crate::chart_set::{ChartSet, SetState};
    use crate::set_info::ChartSetInfo;
    use std::sync::Arc;

    fn catalog_with_incomplete() -> Catalog {
        let catalog = Catalog::new();
        let mut set = ChartSet::new("s1", ChartSetInfo::default());
        set.charts.push(Arc::new(ChartInfo::new("a.oesu", 100, 5)));
        set.charts.push(Arc::new(ChartInfo::new("b.oesu", 200, 6)));
        set.recompute();
        catalog.replace_set(set);
        catalog
    }

    #[test]
    fn test_round_trip_and_apply() {
        let catalog = catalog_with_incomplete();
        catalog
            .update_chart_info("s1", "a.oesu", 12000, Extent::new(0, 0, 10, 10))
            .unwrap();
        catalog
            .update_chart_info("s1", "b.oesu", 50000, Extent::new(0, 0, 20, 20))
            .unwrap();
        let cache = ChartInfoCache::from_catalog(&catalog);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chartinfo.json");
        cache.write(&path).unwrap();

        let fresh = catalog_with_incomplete();
        let read = ChartInfoCache::read(&path).unwrap();
        let missing = read.apply(&fresh);
        assert_eq!(missing, 0);
        let set = fresh.set("s1").unwrap();
        assert_eq!(set.state, SetState::Ready);
        assert_eq!(set.chart("a.oesu").unwrap().native_scale, 12000);
    }

    #[test]
    fn test_changed_file_needs_reparse() {
        let catalog = catalog_with_incomplete();
        catalog
            .update_chart_info("s1", "a.oesu", 12000, Extent::new(0, 0, 10, 10))
            .unwrap();
        let cache = ChartInfoCache::from_catalog(&catalog);

        // same names, but b has a different mtime now
        let fresh = Catalog::new();
        let mut set = ChartSet::new("s1", ChartSetInfo::default());
        set.charts.push(Arc::new(ChartInfo::new("a.oesu", 100, 5)));
        set.charts.push(Arc::new(ChartInfo::new("b.oesu", 200, 99)));
        set.recompute();
        fresh.replace_set(set);
        let missing = cache.apply(&fresh);
        assert_eq!(missing, 1);
        assert_eq!(fresh.set("s1").unwrap().chart("a.oesu").unwrap().native_scale, 12000);
    }
}
