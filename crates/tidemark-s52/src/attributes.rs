//! Feature attributes
//!
//! Every S-57 feature carries a map from attribute id to a tagged value.
//! The look-up matcher compares attribute values against the textual
//! patterns of the presentation library (a blank pattern accepts any
//! present value, `?` demands absence); the conditional rules read list
//! attributes as packed byte strings so membership tests stay cheap.

use crate::error::{S52Error, S52Result};
use crate::types::Md5Builder;
use std::collections::BTreeMap;

/// A tagged attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer value (enumerations, lists with one entry)
    Int(i32),
    /// Floating point value (depths, ranges, bearings)
    Double(f64),
    /// Text value (names, list attributes as comma-separated ints)
    Str(String),
}

/// One attribute of a feature
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// The attribute id (S-57 catalogue code)
    pub type_code: u16,
    /// The value
    pub value: AttrValue,
}

impl Attribute {
    /// Integer attribute
    pub fn int(type_code: u16, v: i32) -> Self {
        Attribute {
            type_code,
            value: AttrValue::Int(v),
        }
    }

    /// Floating point attribute
    pub fn double(type_code: u16, v: f64) -> Self {
        Attribute {
            type_code,
            value: AttrValue::Double(v),
        }
    }

    /// String attribute
    pub fn string(type_code: u16, v: impl Into<String>) -> Self {
        Attribute {
            type_code,
            value: AttrValue::Str(v.into()),
        }
    }

    /// The value as display text
    pub fn to_display(&self) -> String {
        match &self.value {
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Double(v) => format!("{:.8}", v)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
            AttrValue::Str(v) => v.clone(),
        }
    }

    /// Compare against a look-up attribute pattern.
    ///
    /// The pattern semantics are asymmetric: a blank pattern matches any
    /// value of a present attribute, while `?` requires the attribute to
    /// be absent and therefore never matches a carried one.
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return true;
        }
        if pattern == "?" {
            return false;
        }
        match &self.value {
            AttrValue::Int(v) => pattern.parse::<i32>().map(|p| p == *v).unwrap_or(false),
            AttrValue::Double(v) => pattern
                .parse::<f64>()
                .map(|p| (p - *v).abs() < 1e-9)
                .unwrap_or(false),
            AttrValue::Str(v) => {
                // list attributes store comma separated values
                if v.contains(',') || pattern.contains(',') {
                    let mut have: Vec<&str> = v.split(',').map(|s| s.trim()).collect();
                    let mut want: Vec<&str> = pattern.split(',').map(|s| s.trim()).collect();
                    have.sort_unstable();
                    want.sort_unstable();
                    have == want
                } else {
                    v == pattern
                }
            }
        }
    }

    /// Feed the value into an identity digest
    pub fn add_to_md5(&self, md5: &mut Md5Builder) {
        match &self.value {
            AttrValue::Int(v) => {
                md5.add_u32(0);
                md5.add_i32(*v);
            }
            AttrValue::Double(v) => {
                md5.add_u32(1);
                md5.add_f64(*v);
            }
            AttrValue::Str(v) => {
                md5.add_u32(2);
                md5.add_str(v);
            }
        }
    }
}

/// The attribute map of a feature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: BTreeMap<u16, Attribute>,
}

impl AttributeMap {
    /// An empty map
    pub fn new() -> Self {
        AttributeMap::default()
    }

    /// Insert an attribute, replacing an existing one
    pub fn insert(&mut self, attribute: Attribute) {
        self.entries.insert(attribute.type_code, attribute);
    }

    /// Look up an attribute
    pub fn get(&self, id: u16) -> Option<&Attribute> {
        self.entries.get(&id)
    }

    /// Whether the attribute exists
    pub fn has(&self, id: u16) -> bool {
        self.entries.contains_key(&id)
    }

    /// Iterate entries in id order
    pub fn iter(&self) -> impl Iterator<Item = (&u16, &Attribute)> {
        self.entries.iter()
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Integer value, erroring on type mismatch
    pub fn int(&self, id: u16) -> S52Result<i32> {
        match self.entries.get(&id).map(|a| &a.value) {
            Some(AttrValue::Int(v)) => Ok(*v),
            _ => Err(S52Error::AttributeType {
                id,
                expected: "int",
            }),
        }
    }

    /// Integer value if present with the right type
    pub fn get_int(&self, id: u16) -> Option<i32> {
        match self.entries.get(&id).map(|a| &a.value) {
            Some(AttrValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Double value if present; integers widen
    pub fn get_double(&self, id: u16) -> Option<f64> {
        match self.entries.get(&id).map(|a| &a.value) {
            Some(AttrValue::Double(v)) => Some(*v),
            Some(AttrValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    /// String value if present with the right type
    pub fn get_string(&self, id: u16) -> Option<&str> {
        match self.entries.get(&id).map(|a| &a.value) {
            Some(AttrValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Any value converted to display text
    pub fn get_as_string(&self, id: u16) -> Option<String> {
        self.entries.get(&id).map(|a| a.to_display())
    }

    /// A list attribute as the numeric values it contains.
    ///
    /// List attributes are stored as comma-separated integers; a plain
    /// integer attribute yields a single-element list.
    pub fn get_list(&self, id: u16) -> Vec<i32> {
        match self.entries.get(&id).map(|a| &a.value) {
            Some(AttrValue::Str(v)) => v
                .split(',')
                .filter_map(|s| s.trim().parse::<i32>().ok())
                .collect(),
            Some(AttrValue::Int(v)) => vec![*v],
            _ => Vec::new(),
        }
    }

    /// A list attribute packed into bytes for cheap membership checks.
    ///
    /// Each list value becomes one byte (values above 255 are dropped),
    /// mirroring how the conditional rules historically scan lists.
    pub fn get_parsed_list(&self, id: u16) -> Vec<u8> {
        self.get_list(id)
            .into_iter()
            .filter(|v| (0..=255).contains(v))
            .map(|v| v as u8)
            .collect()
    }

    /// Whether a list attribute contains any of the given values
    pub fn list_contains(&self, id: u16, values: &[i32]) -> bool {
        let list = self.get_list(id);
        values.iter().any(|v| list.contains(v))
    }
}

impl FromIterator<Attribute> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        let mut map = AttributeMap::new();
        for a in iter {
            map.insert(a);
        }
        map
    }
}

/// S-57 attribute catalogue codes used by the engine
pub mod attr {
    /// Category of light
    pub const CATLIT: u16 = 37;
    /// Category of obstruction
    pub const CATOBS: u16 = 42;
    /// Category of restricted area
    pub const CATREA: u16 = 56;
    /// Category of shoreline construction
    pub const CATSLC: u16 = 60;
    /// Category of wreck
    pub const CATWRK: u16 = 71;
    /// Colour (list)
    pub const COLOUR: u16 = 75;
    /// Condition
    pub const CONDTN: u16 = 81;
    /// Depth range value 1
    pub const DRVAL1: u16 = 87;
    /// Depth range value 2
    pub const DRVAL2: u16 = 88;
    /// Exposition of sounding
    pub const EXPSOU: u16 = 93;
    /// Height
    pub const HEIGHT: u16 = 95;
    /// Light characteristic
    pub const LITCHR: u16 = 107;
    /// Light visibility (list)
    pub const LITVIS: u16 = 108;
    /// Object name
    pub const OBJNAM: u16 = 116;
    /// Orientation
    pub const ORIENT: u16 = 117;
    /// Quality of sounding
    pub const QUASOU: u16 = 125;
    /// Restriction (list)
    pub const RESTRN: u16 = 131;
    /// Scale minimum
    pub const SCAMIN: u16 = 133;
    /// Sector limit one
    pub const SECTR1: u16 = 136;
    /// Sector limit two
    pub const SECTR2: u16 = 137;
    /// Signal group
    pub const SIGGRP: u16 = 141;
    /// Signal period
    pub const SIGPER: u16 = 142;
    /// Signal sequence
    pub const SIGSEQ: u16 = 143;
    /// Topmark shape
    pub const TOPSHP: u16 = 171;
    /// Value of depth contour
    pub const VALDCO: u16 = 174;
    /// Value of nominal range
    pub const VALNMR: u16 = 178;
    /// Value of sounding
    pub const VALSOU: u16 = 179;
    /// Water level effect
    pub const WATLEV: u16 = 187;
    /// Object name, national language
    pub const NOBJNM: u16 = 301;
    /// Quality of position
    pub const QUAPOS: u16 = 402;
    /// Source date
    pub const SORDAT: u16 = 147;
    /// Source indication
    pub const SORIND: u16 = 148;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        let a = Attribute::int(attr::CATLIT, 4);
        // blank matches any present value
        assert!(a.matches(""));
        assert!(a.matches(" "));
        // ? requires the attribute to be absent
        assert!(!a.matches("?"));
        assert!(a.matches("4"));
        assert!(!a.matches("5"));
    }

    #[test]
    fn test_list_matching_is_order_insensitive() {
        let a = Attribute::string(attr::COLOUR, "3,1");
        assert!(a.matches("1,3"));
        assert!(!a.matches("1,4"));
    }

    #[test]
    fn test_typed_getters() {
        let mut map = AttributeMap::new();
        map.insert(Attribute::double(attr::DRVAL1, 2.5));
        map.insert(Attribute::int(attr::TOPSHP, 3));
        map.insert(Attribute::string(attr::OBJNAM, "Pier"));
        assert_eq!(map.get_double(attr::DRVAL1), Some(2.5));
        assert_eq!(map.get_double(attr::TOPSHP), Some(3.0));
        assert_eq!(map.get_int(attr::DRVAL1), None);
        assert_eq!(map.get_string(attr::OBJNAM), Some("Pier"));
        assert!(map.int(attr::OBJNAM).is_err());
    }

    #[test]
    fn test_parsed_list() {
        let mut map = AttributeMap::new();
        map.insert(Attribute::string(attr::COLOUR, "1, 3, 11"));
        assert_eq!(map.get_parsed_list(attr::COLOUR), vec![1, 3, 11]);
        assert!(map.list_contains(attr::COLOUR, &[3]));
        assert!(!map.list_contains(attr::COLOUR, &[4]));
    }
}
