//! Decrypted chart stream reader
//!
//! The opener helper delivers charts as a flat little-endian record
//! stream: each record is a 16-bit type, a 32-bit total length
//! (including the 6 byte header) and the payload. Feature records open a
//! new feature; attribute and geometry records apply to the open one.
//! Unknown record types are skipped, which keeps the reader forward
//! compatible.
//!
//! Geometry positions come as Mercator metres relative to the cell's
//! reference point and are converted to world coordinates on the fly.

use crate::chart::{ChartData, ChartType};
use crate::error::{S57Error, S57Result};
use crate::object::{
    EdgeStore, LineIndex, Polygon, S57Object, Sounding, TriangleType, VertexList, Winding,
};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tidemark_core::bbox::{Extent, LatLonBox};
use tidemark_core::coord::{lat_lon_to_world, world_from_sm, WorldXy};
use tracing::{debug, trace};

/// Record type ids of the chart stream
pub mod record {
    /// Stream version (u16)
    pub const HEADER_SENC_VERSION: u16 = 1;
    /// Cell name (string)
    pub const HEADER_CELL_NAME: u16 = 2;
    /// Cell edition (u16)
    pub const HEADER_CELL_EDITION: u16 = 4;
    /// Cell extent (4 x f64: sw lat, sw lon, ne lat, ne lon)
    pub const CELL_EXTENT_RECORD: u16 = 14;
    /// Native scale (u32)
    pub const CELL_NATIVESCALE_RECORD: u16 = 15;
    /// New feature (u16 type code, u16 id, u8 primitive)
    pub const FEATURE_ID_RECORD: u16 = 64;
    /// Feature attribute (u16 code, u8 value type, value)
    pub const FEATURE_ATTRIBUTE_RECORD: u16 = 65;
    /// Point geometry (f64 lat, f64 lon)
    pub const FEATURE_GEOMETRY_RECORD_POINT: u16 = 80;
    /// Area geometry (triangles + line references)
    pub const FEATURE_GEOMETRY_RECORD_AREA: u16 = 81;
    /// Line geometry (line references)
    pub const FEATURE_GEOMETRY_RECORD_LINE: u16 = 82;
    /// Multipoint soundings (x, y, depth triplets)
    pub const FEATURE_GEOMETRY_RECORD_MULTIPOINT: u16 = 83;
    /// Vector edge table
    pub const VECTOR_EDGE_NODE_TABLE_RECORD: u16 = 96;
    /// Connected node table
    pub const VECTOR_CONNECTED_NODE_TABLE_RECORD: u16 = 97;
    /// Server status (licence / decrypt state)
    pub const SERVER_STATUS_RECORD: u16 = 200;
}

/// Attribute value type codes inside attribute records
mod attr_type {
    pub const INT: u8 = 0;
    pub const DOUBLE: u8 = 2;
    pub const STRING: u8 = 4;
}

const MIN_SUPPORTED_VERSION: u16 = 200;
const RECORD_HEADER_LEN: u32 = 6;

/// Read a decrypted chart stream into chart content.
///
/// With `header_only` parsing stops after the header records, which is
/// enough to learn scale and extent for the catalog.
pub fn read_stream(
    input: &[u8],
    set_key: &str,
    file_name: &str,
    chart_type: ChartType,
    header_only: bool,
) -> S57Result<ChartData> {
    let mut reader = Cursor::new(input);
    let mut version: u16 = 0;
    let mut cell_name = String::new();
    let mut edition: u16 = 0;
    let mut native_scale: i32 = -1;
    let mut extent = Extent::invalid();
    let mut ref_point = WorldXy::new(0, 0);
    let mut have_ref = false;
    let mut edge_store = EdgeStore::default();
    let mut objects: Vec<Arc<S57Object>> = Vec::new();
    let mut current: Option<S57Object> = None;

    loop {
        let record_type = match reader.read_u16::<LittleEndian>() {
            Ok(t) => t,
            Err(_) => break,
        };
        let record_len = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| S57Error::UnexpectedEof(record_type))?;
        if record_len < RECORD_HEADER_LEN {
            return Err(S57Error::InvalidChart(format!(
                "record {} with bad length {}",
                record_type, record_len
            )));
        }
        let payload_len = (record_len - RECORD_HEADER_LEN) as usize;
        let mut payload = vec![0u8; payload_len];
        reader
            .read_exact(&mut payload)
            .map_err(|_| S57Error::UnexpectedEof(record_type))?;
        let mut p = Cursor::new(payload.as_slice());

        match record_type {
            record::HEADER_SENC_VERSION => {
                version = p.read_u16::<LittleEndian>().unwrap_or(0);
                if version < MIN_SUPPORTED_VERSION {
                    return Err(S57Error::VersionMismatch(version));
                }
            }
            record::SERVER_STATUS_RECORD => {
                let _server = p.read_u16::<LittleEndian>().unwrap_or(0);
                let decrypt = p.read_u16::<LittleEndian>().unwrap_or(1);
                let expire = p.read_u16::<LittleEndian>().unwrap_or(0);
                if expire != 0 {
                    return Err(S57Error::LicenceExpired);
                }
                if decrypt == 0 {
                    return Err(S57Error::DecryptError(decrypt));
                }
            }
            record::HEADER_CELL_NAME => {
                cell_name = read_string(&payload);
            }
            record::HEADER_CELL_EDITION => {
                edition = p.read_u16::<LittleEndian>().unwrap_or(0);
            }
            record::CELL_EXTENT_RECORD => {
                let sw_lat = p.read_f64::<LittleEndian>().unwrap_or(0.0);
                let sw_lon = p.read_f64::<LittleEndian>().unwrap_or(0.0);
                let ne_lat = p.read_f64::<LittleEndian>().unwrap_or(0.0);
                let ne_lon = p.read_f64::<LittleEndian>().unwrap_or(0.0);
                let llb = LatLonBox {
                    w_lon: sw_lon,
                    e_lon: ne_lon,
                    s_lat: sw_lat,
                    n_lat: ne_lat,
                };
                extent = llb.to_world();
                let mid = llb.mid_point();
                ref_point = lat_lon_to_world(mid.y, mid.x);
                have_ref = true;
            }
            record::CELL_NATIVESCALE_RECORD => {
                native_scale = p.read_u32::<LittleEndian>().unwrap_or(0) as i32;
            }
            record::FEATURE_ID_RECORD => {
                if header_only {
                    break;
                }
                if let Some(finished) = current.take() {
                    objects.push(Arc::new(finish_object(finished)));
                }
                let type_code = p.read_u16::<LittleEndian>().unwrap_or(0);
                let id = p.read_u16::<LittleEndian>().unwrap_or(0);
                let primitive = p.read_u8().unwrap_or(0);
                current = Some(S57Object::new(id, type_code, primitive));
            }
            record::FEATURE_ATTRIBUTE_RECORD => {
                let Some(obj) = current.as_mut() else {
                    debug!("attribute record outside feature");
                    continue;
                };
                read_attribute(&mut p, &payload, obj);
            }
            record::FEATURE_GEOMETRY_RECORD_POINT => {
                let Some(obj) = current.as_mut() else {
                    continue;
                };
                let lat = p.read_f64::<LittleEndian>().unwrap_or(0.0);
                let lon = p.read_f64::<LittleEndian>().unwrap_or(0.0);
                obj.point = lat_lon_to_world(lat, lon);
                obj.extent.extend_point(obj.point);
            }
            record::FEATURE_GEOMETRY_RECORD_MULTIPOINT => {
                let Some(obj) = current.as_mut() else {
                    continue;
                };
                if !have_ref {
                    return Err(S57Error::InvalidChart(
                        "multipoint before cell extent".to_string(),
                    ));
                }
                let count = p.read_u32::<LittleEndian>().unwrap_or(0);
                for _ in 0..count {
                    let x = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                    let y = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                    let depth = p.read_f32::<LittleEndian>().unwrap_or(0.0);
                    let point = world_from_sm(x, y, ref_point);
                    obj.extent.extend_point(point);
                    obj.soundings.add(Sounding { point, depth });
                }
                if let Some(first) = obj.soundings.points.first() {
                    obj.point = first.point;
                }
            }
            record::FEATURE_GEOMETRY_RECORD_LINE => {
                let Some(obj) = current.as_mut() else {
                    continue;
                };
                read_line_refs(&mut p, obj, version);
            }
            record::FEATURE_GEOMETRY_RECORD_AREA => {
                let Some(obj) = current.as_mut() else {
                    continue;
                };
                if !have_ref {
                    return Err(S57Error::InvalidChart(
                        "area before cell extent".to_string(),
                    ));
                }
                let n_prims = p.read_u32::<LittleEndian>().unwrap_or(0);
                for _ in 0..n_prims {
                    let ttype = p.read_u8().unwrap_or(4);
                    let nvert = p.read_u32::<LittleEndian>().unwrap_or(0);
                    let mut points = Vec::with_capacity(nvert as usize);
                    for _ in 0..nvert {
                        let x = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                        let y = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                        points.push(world_from_sm(x, y, ref_point));
                    }
                    let vl = VertexList::new(TriangleType::from_code(ttype), points);
                    if vl.extent.valid {
                        obj.extent.extend(&vl.extent);
                    }
                    obj.area.push(vl);
                }
                let line_start = obj.lines.len();
                read_line_refs(&mut p, obj, version);
                if obj.lines.len() > line_start {
                    obj.polygons.push(Polygon {
                        start_index: line_start,
                        end_index: obj.lines.len() - 1,
                        complete: false,
                        winding: Winding::Unknown,
                    });
                }
            }
            record::VECTOR_EDGE_NODE_TABLE_RECORD => {
                if !have_ref {
                    return Err(S57Error::InvalidChart(
                        "edge table before cell extent".to_string(),
                    ));
                }
                let count = p.read_u32::<LittleEndian>().unwrap_or(0);
                for _ in 0..count {
                    let index = p.read_u32::<LittleEndian>().unwrap_or(0);
                    let n_points = p.read_u32::<LittleEndian>().unwrap_or(0);
                    let mut pts = Vec::with_capacity(n_points as usize);
                    for _ in 0..n_points {
                        let x = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                        let y = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                        pts.push(world_from_sm(x, y, ref_point));
                    }
                    edge_store.edges.insert(index, pts);
                }
            }
            record::VECTOR_CONNECTED_NODE_TABLE_RECORD => {
                if !have_ref {
                    return Err(S57Error::InvalidChart(
                        "node table before cell extent".to_string(),
                    ));
                }
                let count = p.read_u32::<LittleEndian>().unwrap_or(0);
                for _ in 0..count {
                    let index = p.read_u32::<LittleEndian>().unwrap_or(0);
                    let x = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                    let y = p.read_f32::<LittleEndian>().unwrap_or(0.0) as f64;
                    edge_store.nodes.insert(index, world_from_sm(x, y, ref_point));
                }
            }
            other => {
                trace!(record = other, len = payload_len, "skipping record");
            }
        }
    }
    if let Some(finished) = current.take() {
        objects.push(Arc::new(finish_object(finished)));
    }
    if version == 0 {
        return Err(S57Error::InvalidChart("missing version record".to_string()));
    }
    if !extent.valid {
        return Err(S57Error::InvalidChart("missing cell extent".to_string()));
    }

    // line features derive their extent from the referenced edges
    let objects = objects
        .into_iter()
        .map(|o| {
            if o.extent.valid {
                return o;
            }
            let mut oo = (*o).clone();
            for line in &oo.lines {
                for pt in line.points(&edge_store) {
                    oo.extent.extend_point(pt);
                }
            }
            if !oo.extent.valid {
                oo.extent = extent;
            }
            Arc::new(oo)
        })
        .collect();

    Ok(ChartData {
        set_key: set_key.to_string(),
        file_name: file_name.to_string(),
        chart_type,
        cell_name,
        edition,
        native_scale,
        extent,
        ref_point,
        objects,
        edge_store,
        header_only,
    })
}

fn finish_object(mut obj: S57Object) -> S57Object {
    obj.finalize();
    obj
}

fn read_string(payload: &[u8]) -> String {
    let end = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).to_string()
}

fn read_attribute(p: &mut Cursor<&[u8]>, payload: &[u8], obj: &mut S57Object) {
    use tidemark_s52::attributes::Attribute;
    let code = p.read_u16::<LittleEndian>().unwrap_or(0);
    let vtype = p.read_u8().unwrap_or(attr_type::STRING);
    match vtype {
        attr_type::INT => {
            let v = p.read_i32::<LittleEndian>().unwrap_or(0);
            obj.attributes.insert(Attribute::int(code, v));
        }
        attr_type::DOUBLE => {
            let v = p.read_f64::<LittleEndian>().unwrap_or(0.0);
            obj.attributes.insert(Attribute::double(code, v));
        }
        _ => {
            let start = p.position() as usize;
            let s = read_string(&payload[start..]);
            obj.attributes.insert(Attribute::string(code, s));
        }
    }
}

fn read_line_refs(p: &mut Cursor<&[u8]>, obj: &mut S57Object, version: u16) {
    let count = p.read_u32::<LittleEndian>().unwrap_or(0);
    for _ in 0..count {
        let mut buffer = [0i32; 4];
        for b in buffer.iter_mut() {
            *b = p.read_i32::<LittleEndian>().unwrap_or(0);
        }
        obj.lines
            .push(LineIndex::from_record(buffer, version >= 200));
    }
}

/// Builds chart streams record by record; the write-side twin of
/// [`read_stream`], used by the chart test surface and the test suites.
#[derive(Default)]
pub struct StreamWriter {
    out: Vec<u8>,
}

impl StreamWriter {
    /// Start an empty stream
    pub fn new() -> Self {
        StreamWriter::default()
    }

    fn record(&mut self, record_type: u16, payload: &[u8]) -> &mut Self {
        self.out.extend_from_slice(&record_type.to_le_bytes());
        self.out
            .extend_from_slice(&((payload.len() as u32 + RECORD_HEADER_LEN).to_le_bytes()));
        self.out.extend_from_slice(payload);
        self
    }

    /// Version record
    pub fn version(&mut self, v: u16) -> &mut Self {
        self.record(record::HEADER_SENC_VERSION, &v.to_le_bytes())
    }

    /// Cell name record
    pub fn cell_name(&mut self, name: &str) -> &mut Self {
        let mut p = name.as_bytes().to_vec();
        p.push(0);
        self.record(record::HEADER_CELL_NAME, &p)
    }

    /// Cell edition record
    pub fn edition(&mut self, e: u16) -> &mut Self {
        self.record(record::HEADER_CELL_EDITION, &e.to_le_bytes())
    }

    /// Cell extent record
    pub fn extent(&mut self, sw_lat: f64, sw_lon: f64, ne_lat: f64, ne_lon: f64) -> &mut Self {
        let mut p = Vec::new();
        for v in [sw_lat, sw_lon, ne_lat, ne_lon] {
            p.extend_from_slice(&v.to_le_bytes());
        }
        self.record(record::CELL_EXTENT_RECORD, &p)
    }

    /// Native scale record
    pub fn native_scale(&mut self, scale: u32) -> &mut Self {
        self.record(record::CELL_NATIVESCALE_RECORD, &scale.to_le_bytes())
    }

    /// Server status record
    pub fn server_status(&mut self, decrypt_ok: bool, expired: bool) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&1u16.to_le_bytes());
        p.extend_from_slice(&(if decrypt_ok { 1u16 } else { 0 }).to_le_bytes());
        p.extend_from_slice(&(if expired { 1u16 } else { 0 }).to_le_bytes());
        self.record(record::SERVER_STATUS_RECORD, &p)
    }

    /// Open a new feature
    pub fn feature(&mut self, type_code: u16, id: u16, primitive: u8) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&type_code.to_le_bytes());
        p.extend_from_slice(&id.to_le_bytes());
        p.push(primitive);
        self.record(record::FEATURE_ID_RECORD, &p)
    }

    /// Integer attribute
    pub fn attr_int(&mut self, code: u16, v: i32) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&code.to_le_bytes());
        p.push(attr_type::INT);
        p.extend_from_slice(&v.to_le_bytes());
        self.record(record::FEATURE_ATTRIBUTE_RECORD, &p)
    }

    /// Double attribute
    pub fn attr_double(&mut self, code: u16, v: f64) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&code.to_le_bytes());
        p.push(attr_type::DOUBLE);
        p.extend_from_slice(&v.to_le_bytes());
        self.record(record::FEATURE_ATTRIBUTE_RECORD, &p)
    }

    /// String attribute
    pub fn attr_string(&mut self, code: u16, v: &str) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&code.to_le_bytes());
        p.push(attr_type::STRING);
        p.extend_from_slice(v.as_bytes());
        p.push(0);
        self.record(record::FEATURE_ATTRIBUTE_RECORD, &p)
    }

    /// Point geometry
    pub fn point(&mut self, lat: f64, lon: f64) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&lat.to_le_bytes());
        p.extend_from_slice(&lon.to_le_bytes());
        self.record(record::FEATURE_GEOMETRY_RECORD_POINT, &p)
    }

    /// Multipoint soundings as (easting, northing, depth) triplets
    pub fn multipoint(&mut self, points: &[(f32, f32, f32)]) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&(points.len() as u32).to_le_bytes());
        for (x, y, d) in points {
            p.extend_from_slice(&x.to_le_bytes());
            p.extend_from_slice(&y.to_le_bytes());
            p.extend_from_slice(&d.to_le_bytes());
        }
        self.record(record::FEATURE_GEOMETRY_RECORD_MULTIPOINT, &p)
    }

    /// Line geometry from (start_node, edge, end_node, direction) records
    pub fn line(&mut self, refs: &[[i32; 4]]) -> &mut Self {
        let p = encode_line_refs(refs);
        self.record(record::FEATURE_GEOMETRY_RECORD_LINE, &p)
    }

    /// Area geometry: triangle primitives plus outline line references
    pub fn area(&mut self, prims: &[(u8, Vec<(f32, f32)>)], refs: &[[i32; 4]]) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&(prims.len() as u32).to_le_bytes());
        for (ttype, verts) in prims {
            p.push(*ttype);
            p.extend_from_slice(&(verts.len() as u32).to_le_bytes());
            for (x, y) in verts {
                p.extend_from_slice(&x.to_le_bytes());
                p.extend_from_slice(&y.to_le_bytes());
            }
        }
        p.extend_from_slice(&encode_line_refs(refs));
        self.record(record::FEATURE_GEOMETRY_RECORD_AREA, &p)
    }

    /// Vector edge table
    pub fn edge_table(&mut self, edges: &[(u32, Vec<(f32, f32)>)]) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&(edges.len() as u32).to_le_bytes());
        for (index, pts) in edges {
            p.extend_from_slice(&index.to_le_bytes());
            p.extend_from_slice(&(pts.len() as u32).to_le_bytes());
            for (x, y) in pts {
                p.extend_from_slice(&x.to_le_bytes());
                p.extend_from_slice(&y.to_le_bytes());
            }
        }
        self.record(record::VECTOR_EDGE_NODE_TABLE_RECORD, &p)
    }

    /// Connected node table
    pub fn node_table(&mut self, nodes: &[(u32, f32, f32)]) -> &mut Self {
        let mut p = Vec::new();
        p.extend_from_slice(&(nodes.len() as u32).to_le_bytes());
        for (index, x, y) in nodes {
            p.extend_from_slice(&index.to_le_bytes());
            p.extend_from_slice(&x.to_le_bytes());
            p.extend_from_slice(&y.to_le_bytes());
        }
        self.record(record::VECTOR_CONNECTED_NODE_TABLE_RECORD, &p)
    }

    /// The finished stream
    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

fn encode_line_refs(refs: &[[i32; 4]]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(refs.len() as u32).to_le_bytes());
    for r in refs {
        for v in r {
            p.extend_from_slice(&v.to_le_bytes());
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_s52::attributes::attr;

    fn base_writer() -> StreamWriter {
        let mut w = StreamWriter::new();
        w.version(200)
            .cell_name("TEST01")
            .edition(3)
            .extent(54.0, 11.0, 55.0, 12.5)
            .native_scale(25000);
        w
    }

    #[test]
    fn test_header_parsing() {
        let mut w = base_writer();
        let data = w.finish();
        let chart = read_stream(&data, "set1", "TEST01.oesu", ChartType::Oesu, false).unwrap();
        assert_eq!(chart.cell_name, "TEST01");
        assert_eq!(chart.edition, 3);
        assert_eq!(chart.native_scale, 25000);
        assert!(chart.extent.valid);
        // world y grows south: n_lat maps to ymin
        assert!(chart.extent.ymin < chart.extent.ymax);
    }

    #[test]
    fn test_version_rejected() {
        let mut w = StreamWriter::new();
        w.version(124);
        let err = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap_err();
        assert!(matches!(err, S57Error::VersionMismatch(124)));
    }

    #[test]
    fn test_expired_licence() {
        let mut w = StreamWriter::new();
        w.version(200).server_status(true, true);
        let err = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap_err();
        assert!(matches!(err, S57Error::LicenceExpired));
    }

    #[test]
    fn test_point_feature_with_attributes() {
        let mut w = base_writer();
        w.feature(75, 7, 1)
            .attr_int(attr::CATLIT, 4)
            .attr_double(attr::VALNMR, 12.5)
            .attr_string(attr::OBJNAM, "Main light")
            .point(54.5, 12.0);
        let chart = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap();
        assert_eq!(chart.objects.len(), 1);
        let obj = &chart.objects[0];
        assert_eq!(obj.feature_type_code, 75);
        assert_eq!(obj.attributes.get_int(attr::CATLIT), Some(4));
        assert_eq!(obj.attributes.get_string(attr::OBJNAM), Some("Main light"));
        assert!(obj.extent.valid);
    }

    #[test]
    fn test_multipoint_sounding_range() {
        let mut w = base_writer();
        w.feature(129, 1, 1)
            .multipoint(&[(0.0, 0.0, 3.5), (500.0, 500.0, 12.0), (-500.0, 0.0, 1.2)]);
        let chart = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap();
        let obj = &chart.objects[0];
        assert!(obj.is_multipoint());
        assert_eq!(obj.soundings.len(), 3);
        assert!((obj.soundings.min - 1.2).abs() < 1e-6);
        assert!((obj.soundings.max - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_area_with_edges_and_polygon() {
        let mut w = base_writer();
        w.edge_table(&[(1, vec![(1000.0, 0.0), (1000.0, 1000.0)])])
            .node_table(&[(1, 0.0, 0.0), (2, 0.0, 1000.0)])
            .feature(42, 1, 3)
            .attr_double(attr::DRVAL1, 2.0)
            .area(
                &[(6, vec![(0.0, 0.0), (1000.0, 0.0), (1000.0, 1000.0), (0.0, 1000.0)])],
                &[[1, 1, 2, 0]],
            );
        let chart = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap();
        let obj = &chart.objects[0];
        assert_eq!(obj.area.len(), 1);
        assert_eq!(obj.area[0].triangles().count(), 2);
        assert_eq!(obj.polygons.len(), 1);
        assert_eq!(obj.lines.len(), 1);
        assert!(chart.edge_store.edges.contains_key(&1));
    }

    #[test]
    fn test_header_only_stops_at_features() {
        let mut w = base_writer();
        w.feature(42, 1, 3);
        let chart = read_stream(&w.finish(), "s", "f", ChartType::Oesu, true).unwrap();
        assert!(chart.header_only);
        assert!(chart.objects.is_empty());
        assert_eq!(chart.native_scale, 25000);
    }

    #[test]
    fn test_unknown_records_skipped() {
        let mut w = StreamWriter::new();
        w.version(201);
        w.record(999, &[1, 2, 3, 4]);
        w.extent(54.0, 11.0, 55.0, 12.0);
        let chart = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap();
        assert!(chart.extent.valid);
    }

    #[test]
    fn test_line_feature_extent_from_edges() {
        let mut w = base_writer();
        w.edge_table(&[(5, vec![(0.0, 0.0), (2000.0, 2000.0)])])
            .node_table(&[(1, -1000.0, 0.0), (2, 3000.0, 2000.0)])
            .feature(43, 9, 2)
            .attr_double(attr::VALDCO, 10.0)
            .line(&[[1, 5, 2, 0]]);
        let chart = read_stream(&w.finish(), "s", "f", ChartType::Oesu, false).unwrap();
        let obj = &chart.objects[0];
        assert!(obj.extent.valid);
        assert!(obj.extent.width() > 1);
        assert_eq!(chart.next_safety_contour(5.0), 10.0);
    }
}
