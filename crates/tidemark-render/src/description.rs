//! Feature-info object descriptions

use serde::Serialize;
use std::collections::BTreeMap;
use tidemark_core::coord::{world_x_to_lon, world_y_to_lat, WorldXy};
use tidemark_s52::attributes::attr;
use tidemark_s52::types::{objclass, GeoPrimitive, Md5Builder, Md5Name};
use tidemark_s52::S52Data;
use tidemark_s57::S57Object;

/// Attributes that differ between charts carrying the same real-world
/// feature; ignored for the identity digest so duplicates collapse.
const IGNORED_ATTRIBUTES: &[u16] = &[attr::SCAMIN, attr::SORIND, attr::SORDAT, attr::SIGSEQ];

/// One described feature at the query point
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDescription {
    /// Identity over the feature's stable payload
    #[serde(skip)]
    pub md5: Md5Name,
    /// Points beat lines beat areas; lights beat other points
    #[serde(skip)]
    pub score: i32,
    /// Distance from the click point (world units)
    #[serde(skip)]
    pub distance: f64,
    /// Whether the feature is a true point
    pub is_point: bool,
    /// Object class acronym (or the numeric code when unknown)
    pub class: String,
    /// Feature type code
    pub type_code: u16,
    /// Feature position
    pub lat: f64,
    /// Feature position
    pub lon: f64,
    /// Attribute acronym to display value
    pub attributes: BTreeMap<String, String>,
}

impl ObjectDescription {
    /// Describe a feature, stamping the identity digest.
    ///
    /// `addons` carries extras like the nearest sounding depth; they are
    /// displayed but excluded from the identity.
    pub fn build(
        object: &S57Object,
        s52: &S52Data,
        overview: bool,
        addons: BTreeMap<String, String>,
    ) -> Self {
        let is_point = object.geo_primitive == GeoPrimitive::Point && !object.is_multipoint();
        let score = if is_point {
            if object.feature_type_code == objclass::LIGHTS {
                3
            } else {
                2
            }
        } else {
            1
        };
        let mut md5 = Md5Builder::new();
        md5.add_u32(object.geo_primitive as u32);
        md5.add_u32(object.feature_type_code as u32);
        md5.add_i32(object.point.x);
        md5.add_i32(object.point.y);
        for (id, attribute) in object.attributes.iter() {
            if IGNORED_ATTRIBUTES.contains(id) {
                continue;
            }
            md5.add_u32(*id as u32);
            attribute.add_to_md5(&mut md5);
        }
        let mut attributes = BTreeMap::new();
        if !overview {
            for (id, attribute) in object.attributes.iter() {
                let name = s52
                    .attribute_name(*id)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| id.to_string());
                attributes.insert(name, attribute.to_display());
            }
        }
        for (k, v) in addons {
            attributes.insert(k, v);
        }
        let class = s52
            .object_class_acronym(object.feature_type_code)
            .map(|s| s.to_string())
            .unwrap_or_else(|| object.feature_type_code.to_string());
        ObjectDescription {
            md5: md5.finish(),
            score,
            distance: 0.0,
            is_point,
            class,
            type_code: object.feature_type_code,
            lat: world_y_to_lat(object.point.y),
            lon: world_x_to_lon(object.point.x, true),
            attributes,
        }
    }

    /// Set the distance from a query point
    pub fn compute_distance(&mut self, object_point: WorldXy, query: WorldXy) {
        let dx = (object_point.x - query.x) as f64;
        let dy = (object_point.y - query.y) as f64;
        self.distance = (dx * dx + dy * dy).sqrt();
    }
}

/// Deduplicate by identity and sort (score desc, distance asc, class).
///
/// Features present in overlapping charts collapse to one entry.
pub fn dedupe_and_sort(mut list: Vec<ObjectDescription>) -> Vec<ObjectDescription> {
    list.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.class.cmp(&b.class))
    });
    let mut seen = std::collections::HashSet::new();
    list.retain(|d| seen.insert(d.md5));
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_s52::attributes::Attribute;
    use tidemark_s52::RenderSettings;

    fn s52() -> S52Data {
        let mut data = S52Data::new(RenderSettings::default().into_shared());
        data.build_rules().unwrap();
        data
    }

    fn light(scamin: Option<f64>) -> S57Object {
        let mut o = S57Object::new(7, objclass::LIGHTS, 1);
        o.point = WorldXy::new(1000, 2000);
        o.attributes.insert(Attribute::int(attr::CATLIT, 4));
        if let Some(s) = scamin {
            o.attributes.insert(Attribute::double(attr::SCAMIN, s));
        }
        o.finalize();
        o
    }

    #[test]
    fn test_identity_ignores_scamin() {
        let data = s52();
        let a = ObjectDescription::build(&light(None), &data, false, BTreeMap::new());
        let b = ObjectDescription::build(&light(Some(50_000.0)), &data, false, BTreeMap::new());
        assert_eq!(a.md5, b.md5);
        // a different position is a different feature
        let mut other = light(None);
        other.point = WorldXy::new(1001, 2000);
        let c = ObjectDescription::build(&other, &data, false, BTreeMap::new());
        assert_ne!(a.md5, c.md5);
    }

    #[test]
    fn test_dedupe_and_order() {
        let data = s52();
        let l = ObjectDescription::build(&light(None), &data, false, BTreeMap::new());
        let l_dup = ObjectDescription::build(&light(Some(1.0)), &data, false, BTreeMap::new());
        let mut area = S57Object::new(9, objclass::DEPARE, 3);
        area.finalize();
        let mut a = ObjectDescription::build(&area, &data, false, BTreeMap::new());
        a.distance = 1.0;
        let sorted = dedupe_and_sort(vec![a, l.clone(), l_dup]);
        assert_eq!(sorted.len(), 2);
        // the light wins over the area
        assert_eq!(sorted[0].class, "LIGHTS");
        assert_eq!(sorted[1].class, "DEPARE");
    }

    #[test]
    fn test_addons_displayed_not_hashed() {
        let data = s52();
        let mut addons = BTreeMap::new();
        addons.insert("depth".to_string(), "12.4".to_string());
        let with = ObjectDescription::build(&light(None), &data, false, addons);
        let without = ObjectDescription::build(&light(None), &data, false, BTreeMap::new());
        assert_eq!(with.md5, without.md5);
        assert_eq!(with.attributes.get("depth").map(|s| s.as_str()), Some("12.4"));
    }
}
