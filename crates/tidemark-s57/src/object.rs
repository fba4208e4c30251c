//! S-57 feature objects and their geometry

use std::collections::HashMap;
use tidemark_core::bbox::Extent;
use tidemark_core::coord::WorldXy;
use tidemark_s52::attributes::{attr, AttributeMap};
use tidemark_s52::types::GeoPrimitive;

/// Triangle vertex list type codes (matching the chart stream)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleType {
    /// Independent triangles
    List,
    /// Triangle strip
    Strip,
    /// Triangle fan
    Fan,
}

impl TriangleType {
    /// Map the stream type code (4 = list, 5 = strip, 6 = fan)
    pub fn from_code(code: u8) -> TriangleType {
        match code {
            5 => TriangleType::Strip,
            6 => TriangleType::Fan,
            _ => TriangleType::List,
        }
    }
}

/// One tessellation primitive of an area object
#[derive(Debug, Clone)]
pub struct VertexList {
    /// How the points form triangles
    pub triangle_type: TriangleType,
    /// The vertices in world coordinates
    pub points: Vec<WorldXy>,
    /// Extent of the vertices
    pub extent: Extent,
}

impl VertexList {
    /// Build from points, computing the extent
    pub fn new(triangle_type: TriangleType, points: Vec<WorldXy>) -> Self {
        let mut extent = Extent::invalid();
        for p in &points {
            extent.extend_point(*p);
        }
        VertexList {
            triangle_type,
            points,
            extent,
        }
    }

    /// Iterate the triangles of this primitive
    pub fn triangles(&self) -> impl Iterator<Item = (WorldXy, WorldXy, WorldXy)> + '_ {
        let pts = &self.points;
        let ty = self.triangle_type;
        (0..pts.len().saturating_sub(2)).filter_map(move |i| match ty {
            TriangleType::List => {
                if i % 3 == 0 && i + 2 < pts.len() {
                    Some((pts[i], pts[i + 1], pts[i + 2]))
                } else {
                    None
                }
            }
            TriangleType::Strip => Some((pts[i], pts[i + 1], pts[i + 2])),
            TriangleType::Fan => Some((pts[0], pts[i + 1], pts[i + 2])),
        })
    }
}

/// One sounding of a multipoint object
#[derive(Debug, Clone, Copy)]
pub struct Sounding {
    /// Position
    pub point: WorldXy,
    /// Depth in metres
    pub depth: f32,
}

/// The soundings of a multipoint object with their depth range
#[derive(Debug, Clone, Default)]
pub struct Soundings {
    /// All soundings
    pub points: Vec<Sounding>,
    /// Shallowest depth
    pub min: f32,
    /// Deepest depth
    pub max: f32,
}

impl Soundings {
    /// Add a sounding, keeping the range current
    pub fn add(&mut self, s: Sounding) {
        if self.points.is_empty() {
            self.min = s.depth;
            self.max = s.depth;
        } else {
            self.min = self.min.min(s.depth);
            self.max = self.max.max(s.depth);
        }
        self.points.push(s);
    }

    /// Number of soundings
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no soundings
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Shared vector edges and connected nodes of a chart.
///
/// Line geometry references these tables by index instead of owning the
/// points, so edges shared between features exist once.
#[derive(Debug, Clone, Default)]
pub struct EdgeStore {
    /// Vector edges by index
    pub edges: HashMap<u32, Vec<WorldXy>>,
    /// Connected nodes by index
    pub nodes: HashMap<u32, WorldXy>,
}

impl EdgeStore {
    /// Approximate heap usage
    pub fn num_bytes(&self) -> usize {
        let mut rt = 0;
        for e in self.edges.values() {
            rt += e.len() * std::mem::size_of::<WorldXy>() + 16;
        }
        rt + self.nodes.len() * (std::mem::size_of::<WorldXy>() + 8)
    }
}

/// A line piece referencing the chart's edge tables.
///
/// A line runs from a connected start node over an optional vector edge
/// to a connected end node; `forward` gives the edge direction.
#[derive(Debug, Clone, Copy)]
pub struct LineIndex {
    /// Connected node index of the start
    pub start_node: u32,
    /// Vector edge index, 0 = none
    pub edge: u32,
    /// Connected node index of the end
    pub end_node: u32,
    /// Edge traversal direction
    pub forward: bool,
}

impl LineIndex {
    /// Build from the four-int record of the chart stream.
    ///
    /// Streams of version 200 and above carry the direction in the
    /// fourth slot; older ones encode it in the sign of the edge index.
    pub fn from_record(buffer: [i32; 4], above200: bool) -> Self {
        let forward = if above200 {
            buffer[3] == 0
        } else {
            buffer[1] >= 0
        };
        LineIndex {
            start_node: buffer[0].max(0) as u32,
            edge: buffer[1].unsigned_abs(),
            end_node: buffer[2].max(0) as u32,
            forward,
        }
    }

    /// The points of this piece in traversal order
    pub fn points(&self, store: &EdgeStore) -> Vec<WorldXy> {
        let mut rt = Vec::new();
        if let Some(p) = store.nodes.get(&self.start_node) {
            rt.push(*p);
        }
        if self.edge != 0 {
            if let Some(edge) = store.edges.get(&self.edge) {
                if self.forward {
                    rt.extend(edge.iter().copied());
                } else {
                    rt.extend(edge.iter().rev().copied());
                }
            }
        }
        if let Some(p) = store.nodes.get(&self.end_node) {
            rt.push(*p);
        }
        rt
    }

    /// Call `f(first, last, is_first)` for every segment of this piece
    pub fn iterate_segments(&self, store: &EdgeStore, mut f: impl FnMut(WorldXy, WorldXy, bool)) {
        let pts = self.points(store);
        for (i, pair) in pts.windows(2).enumerate() {
            f(pair[0], pair[1], i == 0);
        }
    }
}

/// Winding of a polygon outline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    /// Not known
    Unknown,
    /// Clockwise
    Clockwise,
    /// Counter-clockwise
    CounterClockwise,
}

/// A polygon referencing a range of the owning object's line list.
///
/// The object is borrowed for the duration of any query; the polygon
/// itself holds nothing but indices.
#[derive(Debug, Clone, Copy)]
pub struct Polygon {
    /// First line index (inclusive)
    pub start_index: usize,
    /// Last line index (inclusive)
    pub end_index: usize,
    /// Whether the outline closes itself; an incomplete polygon is
    /// closed with a segment from the last to the first point
    pub complete: bool,
    /// Outline winding
    pub winding: Winding,
}

impl Polygon {
    /// Even-odd point-in-polygon test over the outline segments
    pub fn contains(&self, object: &S57Object, store: &EdgeStore, p: WorldXy) -> bool {
        let mut crossings = 0u32;
        let mut first: Option<WorldXy> = None;
        let mut last: Option<WorldXy> = None;
        let mut test = |a: WorldXy, b: WorldXy| {
            if (a.y > p.y) != (b.y > p.y) {
                let dy = (b.y - a.y) as f64;
                if dy != 0.0 {
                    let t = (p.y - a.y) as f64 / dy;
                    let x = a.x as f64 + t * (b.x - a.x) as f64;
                    if (p.x as f64) < x {
                        crossings += 1;
                    }
                }
            }
        };
        for line in object
            .lines
            .iter()
            .skip(self.start_index)
            .take(self.end_index.saturating_sub(self.start_index) + 1)
        {
            let pts = line.points(store);
            for pair in pts.windows(2) {
                test(pair[0], pair[1]);
            }
            if first.is_none() {
                first = pts.first().copied();
            }
            if let Some(l) = pts.last() {
                last = Some(*l);
            }
        }
        if let (Some(f), Some(l)) = (first, last) {
            if !self.complete && f != l {
                test(l, f);
            }
        }
        crossings % 2 == 1
    }
}

/// One S-57 feature with its geometry
#[derive(Debug, Clone)]
pub struct S57Object {
    /// Feature record id
    pub feature_id: u16,
    /// Object class code
    pub feature_type_code: u16,
    /// Raw primitive code from the stream
    pub feature_primitive: u8,
    /// Derived primitive
    pub geo_primitive: GeoPrimitive,
    /// Representative point (points, symbol anchors)
    pub point: WorldXy,
    /// Feature extent in world coordinates
    pub extent: Extent,
    /// Attributes
    pub attributes: AttributeMap,
    /// Area tessellation
    pub area: Vec<VertexList>,
    /// Multipoint soundings
    pub soundings: Soundings,
    /// Line references into the chart's edge store
    pub lines: Vec<LineIndex>,
    /// Polygon ranges over `lines`
    pub polygons: Vec<Polygon>,
    /// Cached SCAMIN attribute, -1 when absent
    pub scamin: i32,
    /// Whether the feature is an aid to navigation
    pub is_aton: bool,
}

impl S57Object {
    /// Create an empty feature
    pub fn new(feature_id: u16, feature_type_code: u16, feature_primitive: u8) -> Self {
        S57Object {
            feature_id,
            feature_type_code,
            feature_primitive,
            geo_primitive: GeoPrimitive::from_code(feature_primitive),
            point: WorldXy::new(0, 0),
            extent: Extent::invalid(),
            attributes: AttributeMap::new(),
            area: Vec::new(),
            soundings: Soundings::default(),
            lines: Vec::new(),
            polygons: Vec::new(),
            scamin: -1,
            is_aton: false,
        }
    }

    /// Whether the feature carries multipoint soundings
    pub fn is_multipoint(&self) -> bool {
        !self.soundings.is_empty()
    }

    /// Derive cached fields once all attributes and geometry are read
    pub fn finalize(&mut self) {
        self.scamin = self
            .attributes
            .get_double(attr::SCAMIN)
            .map(|v| v as i32)
            .unwrap_or(-1);
        self.is_aton = is_aton_class(self.feature_type_code);
    }

    /// Approximate heap usage
    pub fn num_bytes(&self) -> usize {
        let mut rt = std::mem::size_of::<S57Object>();
        for a in &self.area {
            rt += a.points.len() * std::mem::size_of::<WorldXy>();
        }
        rt += self.soundings.len() * std::mem::size_of::<Sounding>();
        rt += self.lines.len() * std::mem::size_of::<LineIndex>();
        rt += self.attributes.len() * 32;
        rt
    }
}

/// Buoys, beacons and floating lights count as aids to navigation
pub fn is_aton_class(code: u16) -> bool {
    matches!(code, 5..=9 | 14..=19 | 76 | 77)
}

/// Floating classes that give a topmark a floating base
pub fn is_floating_class(code: u16) -> bool {
    matches!(code, 14..=19 | 76 | 77)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_square() -> (S57Object, EdgeStore) {
        let mut store = EdgeStore::default();
        store.nodes.insert(1, WorldXy::new(0, 0));
        store.nodes.insert(2, WorldXy::new(100, 0));
        store
            .edges
            .insert(1, vec![WorldXy::new(100, 100), WorldXy::new(0, 100)]);
        let mut obj = S57Object::new(1, 42, 3);
        // square: node1 -> node2 (top), node2 -> edge1 -> node1 (right, bottom, left)
        obj.lines.push(LineIndex {
            start_node: 1,
            edge: 0,
            end_node: 2,
            forward: true,
        });
        obj.lines.push(LineIndex {
            start_node: 2,
            edge: 1,
            end_node: 1,
            forward: true,
        });
        obj.polygons.push(Polygon {
            start_index: 0,
            end_index: 1,
            complete: true,
            winding: Winding::Unknown,
        });
        (obj, store)
    }

    #[test]
    fn test_line_points_direction() {
        let (_, store) = store_with_square();
        let li = LineIndex {
            start_node: 2,
            edge: 1,
            end_node: 1,
            forward: true,
        };
        let pts = li.points(&store);
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], WorldXy::new(100, 0));
        assert_eq!(pts[3], WorldXy::new(0, 0));
        let li_rev = LineIndex { forward: false, ..li };
        let pts_rev = li_rev.points(&store);
        assert_eq!(pts_rev[1], WorldXy::new(0, 100));
    }

    #[test]
    fn test_point_in_polygon() {
        let (obj, store) = store_with_square();
        let poly = obj.polygons[0];
        assert!(poly.contains(&obj, &store, WorldXy::new(50, 50)));
        assert!(!poly.contains(&obj, &store, WorldXy::new(150, 50)));
        assert!(!poly.contains(&obj, &store, WorldXy::new(-10, -10)));
    }

    #[test]
    fn test_triangle_iteration() {
        let fan = VertexList::new(
            TriangleType::Fan,
            vec![
                WorldXy::new(0, 0),
                WorldXy::new(10, 0),
                WorldXy::new(10, 10),
                WorldXy::new(0, 10),
            ],
        );
        let tris: Vec<_> = fan.triangles().collect();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0].0, WorldXy::new(0, 0));
        assert_eq!(tris[1].0, WorldXy::new(0, 0));

        let strip = VertexList::new(
            TriangleType::Strip,
            vec![
                WorldXy::new(0, 0),
                WorldXy::new(10, 0),
                WorldXy::new(0, 10),
                WorldXy::new(10, 10),
            ],
        );
        assert_eq!(strip.triangles().count(), 2);

        let list = VertexList::new(
            TriangleType::List,
            vec![
                WorldXy::new(0, 0),
                WorldXy::new(10, 0),
                WorldXy::new(0, 10),
            ],
        );
        assert_eq!(list.triangles().count(), 1);
    }

    #[test]
    fn test_soundings_range() {
        let mut s = Soundings::default();
        s.add(Sounding {
            point: WorldXy::new(0, 0),
            depth: 5.5,
        });
        s.add(Sounding {
            point: WorldXy::new(1, 1),
            depth: 2.0,
        });
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 5.5);
    }

    #[test]
    fn test_finalize_scamin_and_aton() {
        use tidemark_s52::attributes::Attribute;
        let mut obj = S57Object::new(1, 17, 1);
        obj.attributes
            .insert(Attribute::double(attr::SCAMIN, 50000.0));
        obj.finalize();
        assert_eq!(obj.scamin, 50000);
        assert!(obj.is_aton);
    }
}
