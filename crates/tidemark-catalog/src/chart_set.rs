//! Chart set snapshots

use crate::chart_info::ChartInfo;
use crate::set_info::ChartSetInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tidemark_core::bbox::Extent;

/// Lifecycle state of a chart set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetState {
    /// Created, chart headers not read yet
    Init,
    /// Usable for rendering
    Ready,
    /// Excluded from rendering (by config or by errors)
    Disabled,
}

/// An immutable snapshot of one chart set.
///
/// Built by the catalog thread; every mutation produces a new snapshot
/// with a bumped sequence, so concurrent readers keep a consistent view
/// for as long as they hold the `Arc`.
#[derive(Debug, Clone)]
pub struct ChartSet {
    /// Stable set key (derived from the directory)
    pub key: String,
    /// Parsed set metadata
    pub info: ChartSetInfo,
    /// Lifecycle state
    pub state: SetState,
    /// Member charts
    pub charts: Vec<Arc<ChartInfo>>,
    /// Union of the member extents
    pub extent: Extent,
    /// Smallest native scale value (= largest scale chart)
    pub min_scale: i32,
    /// Largest native scale value (= coarsest chart)
    pub max_scale: i32,
    /// Token over the member list, used for tile cache invalidation
    pub token: String,
    /// Snapshot sequence, bumped on every rebuild
    pub sequence: u64,
}

impl ChartSet {
    /// Create an empty set in `Init` state
    pub fn new(key: impl Into<String>, info: ChartSetInfo) -> Self {
        ChartSet {
            key: key.into(),
            info,
            state: SetState::Init,
            charts: Vec::new(),
            extent: Extent::invalid(),
            min_scale: i32::MAX,
            max_scale: 0,
            token: String::new(),
            sequence: 0,
        }
    }

    /// Recompute extent, scale range and token from the member list.
    ///
    /// Call after the member list changed; keeps the charts sorted by
    /// file name so the token and tie-breaking stay stable.
    pub fn recompute(&mut self) {
        self.charts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        self.extent = Extent::invalid();
        self.min_scale = i32::MAX;
        self.max_scale = 0;
        let mut md5 = md5::Context::new();
        for c in &self.charts {
            if c.extent.valid {
                self.extent.extend(&c.extent);
            }
            if c.native_scale > 0 {
                self.min_scale = self.min_scale.min(c.native_scale);
                self.max_scale = self.max_scale.max(c.native_scale);
            }
            md5.consume(c.file_name.as_bytes());
            md5.consume(c.file_size.to_le_bytes());
            md5.consume(c.mtime.to_le_bytes());
        }
        self.token = hex::encode(md5.compute().0);
    }

    /// Whether the set takes part in rendering
    pub fn is_active(&self) -> bool {
        self.state == SetState::Ready
    }

    /// Whether every member chart is currently failing.
    ///
    /// A fully failing set is degraded (reported, not removed).
    pub fn is_degraded(&self) -> bool {
        !self.charts.is_empty() && self.charts.iter().all(|c| c.is_broken())
    }

    /// Number of member charts
    pub fn num_charts(&self) -> usize {
        self.charts.len()
    }

    /// Find a member by file name
    pub fn chart(&self, file_name: &str) -> Option<&Arc<ChartInfo>> {
        self.charts.iter().find(|c| c.file_name == file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::bbox::Extent;

    fn chart(name: &str, scale: i32, x0: i32, x1: i32) -> Arc<ChartInfo> {
        let mut info = ChartInfo::new(format!("{}.oesu", name), 100, 1);
        info.native_scale = scale;
        info.extent = Extent::new(x0, 0, x1, 100);
        Arc::new(info)
    }

    #[test]
    fn test_recompute_union_and_token() {
        let mut set = ChartSet::new("set1", ChartSetInfo::default());
        set.charts.push(chart("b", 50000, 50, 150));
        set.charts.push(chart("a", 12000, 0, 100));
        set.recompute();
        assert_eq!(set.charts[0].file_name, "a.oesu");
        assert_eq!(set.extent, Extent::new(0, 0, 150, 100));
        assert_eq!(set.min_scale, 12000);
        assert_eq!(set.max_scale, 50000);
        let token1 = set.token.clone();
        assert!(!token1.is_empty());
        // removing a member changes the token
        set.charts.pop();
        set.recompute();
        assert_ne!(set.token, token1);
    }

    #[test]
    fn test_degraded_detection() {
        let mut set = ChartSet::new("set1", ChartSetInfo::default());
        set.charts.push(chart("a", 12000, 0, 100));
        set.recompute();
        assert!(!set.is_degraded());
        set.charts[0].record_open_error();
        set.charts[0].record_open_error();
        assert!(set.is_degraded());
    }
}
