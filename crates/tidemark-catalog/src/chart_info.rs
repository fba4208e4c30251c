//! Per-chart header information

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tidemark_core::bbox::Extent;
use tidemark_s57::ChartType;

/// Consecutive failures after which a chart is reported broken
pub const ERROR_THRESHOLD: u32 = 2;

/// Lightweight header data of one chart file.
///
/// Owned by its chart set; two infos refer to the same physical file iff
/// their file names match inside the set. The error counter tracks
/// consecutive open failures and is the only mutable part.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChartInfo {
    /// File name inside the set directory
    pub file_name: String,
    /// File size in bytes
    pub file_size: u64,
    /// Modification time (unix seconds)
    pub mtime: i64,
    /// Container format
    #[serde(skip, default = "default_type")]
    pub chart_type: ChartType,
    /// Native scale, -1 until the header was read
    pub native_scale: i32,
    /// Chart extent, invalid until the header was read
    pub extent: Extent,
    /// Consecutive open failures
    #[serde(skip)]
    error_count: AtomicU32,
}

fn default_type() -> ChartType {
    ChartType::Unknown
}

impl Clone for ChartInfo {
    fn clone(&self) -> Self {
        ChartInfo {
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            mtime: self.mtime,
            chart_type: self.chart_type,
            native_scale: self.native_scale,
            extent: self.extent,
            error_count: AtomicU32::new(self.error_count.load(Ordering::Relaxed)),
        }
    }
}

impl ChartInfo {
    /// Create from directory enumeration data
    pub fn new(file_name: impl Into<String>, file_size: u64, mtime: i64) -> Self {
        let file_name = file_name.into();
        ChartInfo {
            chart_type: ChartType::from_file_name(&file_name),
            file_name,
            file_size,
            mtime,
            native_scale: -1,
            extent: Extent::invalid(),
            error_count: AtomicU32::new(0),
        }
    }

    /// Whether scale and extent are known
    pub fn is_complete(&self) -> bool {
        self.native_scale > 0 && self.extent.valid
    }

    /// Record a successful open, clearing the failure streak
    pub fn record_open_ok(&self) {
        self.error_count.store(0, Ordering::Relaxed);
    }

    /// Record a failed open; returns the new consecutive failure count
    pub fn record_open_error(&self) -> u32 {
        self.error_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current consecutive failure count
    pub fn errors(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Whether the chart failed often enough to count as broken
    pub fn is_broken(&self) -> bool {
        self.errors() >= ERROR_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_streak() {
        let info = ChartInfo::new("DE5.oesu", 1000, 0);
        assert!(!info.is_broken());
        assert_eq!(info.record_open_error(), 1);
        assert_eq!(info.record_open_error(), 2);
        assert!(info.is_broken());
        info.record_open_ok();
        assert!(!info.is_broken());
    }

    #[test]
    fn test_type_from_name() {
        let info = ChartInfo::new("DE5.oesu", 1, 0);
        assert_eq!(info.chart_type, ChartType::Oesu);
        assert!(!info.is_complete());
    }
}
