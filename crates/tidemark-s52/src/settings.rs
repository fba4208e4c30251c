//! Mariner render settings
//!
//! An immutable snapshot of everything a mariner can configure. Settings
//! carry a stable MD5 over their content and a monotonic sequence number;
//! both are used as cache keys, so any change must produce a new snapshot
//! with a bumped sequence.

use crate::types::{DisCat, Md5Name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Unit used to display depth values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthUnit {
    /// Metres (chart native)
    Meters,
    /// Feet
    Feet,
    /// Fathoms
    Fathoms,
}

/// An immutable settings snapshot.
///
/// Construct with [`RenderSettings::default`], adjust fields and freeze by
/// wrapping in an [`Arc`]; the sequence is assigned by the settings
/// manager on publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Active color table name
    pub color_scheme: String,
    /// Mariner safety contour in metres
    pub safety_contour: f64,
    /// Shallow water contour in metres
    pub shallow_contour: f64,
    /// Deep water contour in metres
    pub deep_contour: f64,
    /// Two depth shades instead of four
    pub two_shades: bool,
    /// Symbolized instead of plain area boundaries
    pub symbolized_boundaries: bool,
    /// Simplified instead of paper-chart point symbols
    pub simplified_points: bool,
    /// Active display category
    pub display_category: DisCat,
    /// Suppress overlapping text
    pub declutter_text: bool,
    /// Draw text at all
    pub show_text: bool,
    /// Text group codes to draw; empty = all groups
    pub show_text_groups: Vec<i32>,
    /// Draw soundings
    pub show_soundings: bool,
    /// Draw lights
    pub show_lights: bool,
    /// Draw anchoring information
    pub show_anchor_info: bool,
    /// Draw quality-of-data symbology
    pub show_quality: bool,
    /// Draw meta objects (M_* classes)
    pub show_meta: bool,
    /// Overlay chart set bounding boxes
    pub show_chart_bounds: bool,
    /// Honor the SCAMIN attribute
    pub use_scamin: bool,
    /// Depth display unit
    pub depth_unit: DepthUnit,
    /// Per-feature visibility overrides for MarinersStandard, keyed by
    /// object class acronym
    pub feature_overrides: BTreeMap<String, bool>,
    /// Scale factor applied to all symbols
    pub symbol_scale: f64,
    /// Scale tolerance for derived symbol lookup
    pub symbol_scale_tolerance: f64,
    /// Rotation tolerance in degrees for derived symbol lookup
    pub symbol_rotation_tolerance: i32,
    /// Zoom-to-scale stretch factor
    pub scale: f64,
    /// Monotonic sequence assigned on publish
    pub sequence: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            color_scheme: "DAY_BRIGHT".to_string(),
            safety_contour: 5.0,
            shallow_contour: 2.0,
            deep_contour: 10.0,
            two_shades: false,
            symbolized_boundaries: false,
            simplified_points: true,
            display_category: DisCat::Standard,
            declutter_text: true,
            show_text: true,
            show_text_groups: Vec::new(),
            show_soundings: true,
            show_lights: true,
            show_anchor_info: true,
            show_quality: false,
            show_meta: false,
            show_chart_bounds: false,
            use_scamin: true,
            depth_unit: DepthUnit::Meters,
            feature_overrides: BTreeMap::new(),
            symbol_scale: 1.0,
            symbol_scale_tolerance: 0.1,
            symbol_rotation_tolerance: 10,
            scale: 1.0,
            sequence: 0,
        }
    }
}

impl RenderSettings {
    /// Shared pointer alias used throughout the pipeline
    pub fn into_shared(self) -> Arc<RenderSettings> {
        Arc::new(self)
    }

    /// Stable digest over the whole snapshot (excluding the sequence)
    pub fn md5(&self) -> Md5Name {
        let mut copy = self.clone();
        copy.sequence = 0;
        let encoded = serde_json::to_vec(&copy).unwrap_or_default();
        Md5Name::digest(&encoded)
    }

    /// Convert a depth in metres into the display unit.
    ///
    /// The conversion only applies for attribute id 0 (free-standing
    /// sounding values); depth attributes keep their chart value, matching
    /// the behavior observed in the reference data sets.
    pub fn convert_sounding(&self, val_meters: f64, attrid: u16) -> f64 {
        if !self.depth_unit_applies(attrid) {
            return val_meters;
        }
        match self.depth_unit {
            DepthUnit::Meters => val_meters,
            DepthUnit::Feet => val_meters / 0.3048,
            DepthUnit::Fathoms => val_meters / 1.8288,
        }
    }

    /// Whether the depth unit conversion applies for an attribute id
    pub fn depth_unit_applies(&self, attrid: u16) -> bool {
        attrid == 0
    }

    /// Whether a text group code passes the show-text-groups gate
    pub fn text_group_visible(&self, group: i32) -> bool {
        if !self.show_text {
            return false;
        }
        self.show_text_groups.is_empty() || self.show_text_groups.contains(&group)
    }

    /// Whether a feature class is visible under MarinersStandard overrides
    pub fn feature_visible(&self, acronym: &str) -> bool {
        if self.display_category != DisCat::MarinersStandard {
            return true;
        }
        *self.feature_overrides.get(acronym).unwrap_or(&true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_ignores_sequence() {
        let mut a = RenderSettings::default();
        let mut b = RenderSettings::default();
        a.sequence = 1;
        b.sequence = 99;
        assert_eq!(a.md5(), b.md5());
    }

    #[test]
    fn test_md5_changes_with_content() {
        let a = RenderSettings::default();
        let mut b = RenderSettings::default();
        b.safety_contour = 7.0;
        assert_ne!(a.md5(), b.md5());
    }

    #[test]
    fn test_sounding_conversion_gated_by_attrid() {
        let mut s = RenderSettings::default();
        s.depth_unit = DepthUnit::Feet;
        assert!((s.convert_sounding(3.048, 0) - 10.0).abs() < 1e-9);
        // depth attributes stay in metres
        assert_eq!(s.convert_sounding(3.048, crate::attributes::attr::VALSOU), 3.048);
    }

    #[test]
    fn test_text_groups() {
        let mut s = RenderSettings::default();
        assert!(s.text_group_visible(23));
        s.show_text_groups = vec![10, 23];
        assert!(s.text_group_visible(23));
        assert!(!s.text_group_visible(31));
        s.show_text = false;
        assert!(!s.text_group_visible(23));
    }
}
