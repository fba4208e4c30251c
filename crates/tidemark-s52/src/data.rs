//! The S-52 data snapshot
//!
//! [`S52Data`] bundles color tables, look-up tables, the symbol cache and
//! the settings the snapshot was built for. It is constructed once per
//! settings generation, frozen by [`S52Data::build_rules`] and shared
//! immutably behind an `Arc`; concurrent renders never observe a half
//! built snapshot.

use crate::attributes::AttributeMap;
use crate::cond;
use crate::error::{S52Error, S52Result};
use crate::lup::{best_match, LupRecord};
use crate::rules::{RuleConditions, RuleCreator, RuleEnv, RuleList};
use crate::settings::RenderSettings;
use crate::symbols::{SymbolCache, SymbolPosition, SymbolPtr, VectorSymbol};
use crate::types::{LupTable, Md5Builder, Md5Name, RgbColor};
use image::RgbaImage;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tidemark_draw::ColorAndAlpha;
use tracing::{debug, info};

/// A named color table of the presentation library
#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    /// Table name, e.g. `DAY_BRIGHT`
    pub name: String,
    /// Colors by 5-letter token
    pub colors: HashMap<String, RgbColor>,
}

/// Well-known acronym/code pairs for the object classes the conditional
/// rules care about; chart readers may register more.
const BUILTIN_CLASSES: &[(u16, &str)] = &[
    (42, "DEPARE"),
    (43, "DEPCNT"),
    (46, "DRGARE"),
    (71, "LNDARE"),
    (75, "LIGHTS"),
    (76, "LITFLT"),
    (77, "LITVES"),
    (84, "MORFAC"),
    (86, "OBSTRN"),
    (112, "RESARE"),
    (122, "SLCONS"),
    (129, "SOUNDG"),
    (144, "TOPMAR"),
    (153, "UWTROC"),
    (159, "WRECKS"),
    (302, "M_COVR"),
    (306, "M_NSYS"),
    (308, "M_QUAL"),
];

const BUILTIN_ATTRIBUTES: &[(u16, &str)] = &[
    (37, "CATLIT"),
    (42, "CATOBS"),
    (56, "CATREA"),
    (60, "CATSLC"),
    (71, "CATWRK"),
    (75, "COLOUR"),
    (81, "CONDTN"),
    (87, "DRVAL1"),
    (88, "DRVAL2"),
    (93, "EXPSOU"),
    (95, "HEIGHT"),
    (107, "LITCHR"),
    (108, "LITVIS"),
    (116, "OBJNAM"),
    (117, "ORIENT"),
    (125, "QUASOU"),
    (131, "RESTRN"),
    (133, "SCAMIN"),
    (136, "SECTR1"),
    (137, "SECTR2"),
    (141, "SIGGRP"),
    (142, "SIGPER"),
    (143, "SIGSEQ"),
    (147, "SORDAT"),
    (148, "SORIND"),
    (171, "TOPSHP"),
    (174, "VALDCO"),
    (178, "VALNMR"),
    (179, "VALSOU"),
    (187, "WATLEV"),
    (301, "NOBJNM"),
    (402, "QUAPOS"),
];

/// The immutable presentation library snapshot
pub struct S52Data {
    settings: Arc<RenderSettings>,
    color_tables: BTreeMap<String, ColorTable>,
    staging: Vec<LupRecord>,
    lup_tables: BTreeMap<LupTable, Vec<Arc<LupRecord>>>,
    lup_index: HashMap<(LupTable, u16), Vec<usize>>,
    symbol_cache: SymbolCache,
    class_by_code: HashMap<u16, String>,
    class_by_name: HashMap<String, u16>,
    attr_by_name: HashMap<String, u16>,
    attr_by_code: HashMap<u16, String>,
    frozen: bool,
    md5: Md5Name,
    sequence: u64,
}

impl S52Data {
    /// Start a new snapshot for the given settings.
    ///
    /// The sequence is inherited from the settings so tile-cache keys
    /// change together with the snapshot.
    pub fn new(settings: Arc<RenderSettings>) -> Self {
        let symbol_cache = SymbolCache::new(
            settings.symbol_scale_tolerance,
            settings.symbol_rotation_tolerance,
        );
        let mut data = S52Data {
            sequence: settings.sequence,
            settings,
            color_tables: BTreeMap::new(),
            staging: Vec::new(),
            lup_tables: BTreeMap::new(),
            lup_index: HashMap::new(),
            symbol_cache,
            class_by_code: HashMap::new(),
            class_by_name: HashMap::new(),
            attr_by_name: HashMap::new(),
            attr_by_code: HashMap::new(),
            frozen: false,
            md5: Md5Name::default(),
        };
        for (code, name) in BUILTIN_CLASSES {
            data.register_object_class(*code, name);
        }
        for (code, name) in BUILTIN_ATTRIBUTES {
            data.attr_by_name.insert(name.to_string(), *code);
            data.attr_by_code.insert(*code, name.to_string());
        }
        data
    }

    /// The settings this snapshot was built for
    pub fn settings(&self) -> &Arc<RenderSettings> {
        &self.settings
    }

    /// Snapshot sequence, used in tile cache keys
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Digest over settings and tables, stable per snapshot content
    pub fn md5(&self) -> Md5Name {
        self.md5
    }

    /// Register an object class acronym
    pub fn register_object_class(&mut self, code: u16, acronym: &str) {
        self.class_by_code.insert(code, acronym.to_string());
        self.class_by_name.insert(acronym.to_string(), code);
    }

    /// Acronym of an object class code
    pub fn object_class_acronym(&self, code: u16) -> Option<&str> {
        self.class_by_code.get(&code).map(|s| s.as_str())
    }

    /// Code of an object class acronym
    pub fn object_class_code(&self, acronym: &str) -> Option<u16> {
        self.class_by_name.get(acronym).copied()
    }

    /// Attribute id for an acronym
    pub fn attribute_code(&self, acronym: &str) -> Option<u16> {
        self.attr_by_name.get(acronym).copied()
    }

    /// Attribute acronym for an id
    pub fn attribute_name(&self, code: u16) -> Option<&str> {
        self.attr_by_code.get(&code).map(|s| s.as_str())
    }

    /// Add a color table
    pub fn add_color_table(&mut self, table: ColorTable) -> S52Result<()> {
        if self.frozen {
            return Err(S52Error::Frozen("add_color_table"));
        }
        self.color_tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Resolve a color token in the active scheme.
    ///
    /// Unknown tokens resolve to magenta so a missing table entry is
    /// visible instead of invisible.
    pub fn color(&self, name: &str) -> RgbColor {
        let name = name.trim();
        if let Some(table) = self.color_tables.get(&self.settings.color_scheme) {
            if let Some(c) = table.colors.get(name) {
                return *c;
            }
        }
        for table in self.color_tables.values() {
            if let Some(c) = table.colors.get(name) {
                return *c;
            }
        }
        debug!(color = name, "unknown color token");
        RgbColor::new(197, 69, 195)
    }

    /// Resolve a color token into the packed rasterizer format
    pub fn convert_color(&self, name: &str) -> ColorAndAlpha {
        self.color(name).to_color()
    }

    /// Add a look-up record
    pub fn add_lup(&mut self, lup: LupRecord) -> S52Result<()> {
        if self.frozen {
            return Err(S52Error::Frozen("add_lup"));
        }
        self.staging.push(lup);
        Ok(())
    }

    /// Register a raster symbol from the symbol sheet
    pub fn add_symbol(
        &mut self,
        name: &str,
        position: &SymbolPosition,
        sheet: &RgbaImage,
    ) -> S52Result<()> {
        if self.frozen {
            return Err(S52Error::Frozen("add_symbol"));
        }
        self.symbol_cache
            .fill_raster_symbol(name, position, sheet, self.settings.symbol_scale)
    }

    /// Register a vector (HPGL) symbol
    pub fn add_vector_symbol(&mut self, name: &str, symbol: &VectorSymbol) -> S52Result<()> {
        if self.frozen {
            return Err(S52Error::Frozen("add_vector_symbol"));
        }
        self.symbol_cache
            .fill_vector_symbol(name, symbol, self.settings.symbol_scale)
    }

    /// Compile all look-up instruction strings and freeze the snapshot.
    ///
    /// Build-time conditional rules expand here; the rest stay deferred.
    /// After this call the snapshot is immutable and safe to share.
    pub fn build_rules(&mut self) -> S52Result<()> {
        if self.frozen {
            return Err(S52Error::Frozen("build_rules"));
        }
        let mut staging = std::mem::take(&mut self.staging);
        staging.sort_by(|a, b| {
            a.table
                .cmp(&b.table)
                .then(a.feature_type_code.cmp(&b.feature_type_code))
                .then(a.sequence.cmp(&b.sequence))
        });
        let mut creator_id = 1u32;
        for lup in staging.iter_mut() {
            let mut creator = RuleCreator::new(creator_id);
            creator_id += 1;
            let mut list = RuleList::default();
            let env = EnvView { data: self };
            creator.rules_from_string(
                &lup.obj_class,
                &lup.instruction.clone(),
                &env,
                &mut list,
                true,
                None,
            );
            lup.rule_list = list;
        }
        for lup in staging {
            self.lup_tables
                .entry(lup.table)
                .or_default()
                .push(Arc::new(lup));
        }
        // index by (table, type code)
        for (table, records) in &self.lup_tables {
            for (i, lup) in records.iter().enumerate() {
                self.lup_index
                    .entry((*table, lup.feature_type_code))
                    .or_default()
                    .push(i);
            }
        }
        let mut md5 = Md5Builder::new();
        md5.add_bytes(&self.settings.md5().0);
        for (table, records) in &self.lup_tables {
            md5.add_str(&format!("{:?}", table));
            for lup in records {
                md5.add_i32(lup.rcid);
                md5.add_str(&lup.obj_class);
                md5.add_str(&lup.instruction);
            }
        }
        self.md5 = md5.finish();
        self.frozen = true;
        info!(
            luptables = self.lup_tables.len(),
            md5 = %self.md5,
            "s52 data frozen"
        );
        Ok(())
    }

    /// Find the best look-up for a feature
    pub fn find_lup(
        &self,
        table: LupTable,
        feature_type_code: u16,
        attributes: Option<&AttributeMap>,
    ) -> Option<&Arc<LupRecord>> {
        let records = self.lup_tables.get(&table)?;
        let idx = self.lup_index.get(&(table, feature_type_code))?;
        // candidates are contiguous after the sort in build_rules
        let first = *idx.first()?;
        let last = *idx.last()?;
        best_match(&records[first..=last], attributes)
    }

    /// Look up a symbol raster, deriving rotation/scale variants on demand
    pub fn symbol(&self, name: &str, rotation: i32, scale: f64) -> Option<SymbolPtr> {
        let get = |n: &str| self.convert_color(n);
        self.symbol_cache.get_symbol(name, &get, rotation, scale)
    }

    /// Whether a symbol resolves, returning the usable name
    pub fn check_symbol(&self, name: &str) -> Option<String> {
        self.symbol_cache.check_symbol(name)
    }

    /// Convert a depth to the display unit (see settings)
    pub fn convert_sounding(&self, val_meters: f64, attrid: u16) -> f64 {
        self.settings.convert_sounding(val_meters, attrid)
    }

    /// Memory used by symbol rasters
    pub fn symbol_mem_usage(&self) -> u64 {
        self.symbol_cache.mem_usage()
    }

    /// Compile a rule string with runtime conditions.
    ///
    /// Used by render objects to expand deferred conditional rules; the
    /// result is memoized by the caller under the CS rule's key.
    pub fn compile_with_conditions(
        &self,
        obj_class: &str,
        rule_str: &str,
        creator: &mut RuleCreator,
        conditions: &RuleConditions,
    ) -> RuleList {
        let mut list = RuleList::default();
        let env = EnvView { data: self };
        creator.rules_from_string(obj_class, rule_str, &env, &mut list, true, Some(conditions));
        list
    }
}

/// Borrowed rule environment over a snapshot
struct EnvView<'a> {
    data: &'a S52Data,
}

impl RuleEnv for EnvView<'_> {
    fn color(&self, name: &str) -> ColorAndAlpha {
        self.data.convert_color(name)
    }

    fn check_symbol(&self, name: &str) -> Option<String> {
        self.data.check_symbol(name)
    }

    fn expand_conditional(
        &self,
        lup_obj_class: &str,
        rule: &str,
        conditions: Option<&RuleConditions>,
    ) -> String {
        cond::expand(lup_obj_class, rule, &self.data.settings, conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{attr, Attribute};
    use crate::rules::RuleVariant;
    use crate::types::{DisCat, GeoPrimitive, RadPrio};

    fn test_data() -> S52Data {
        let mut data = S52Data::new(RenderSettings::default().into_shared());
        let mut table = ColorTable {
            name: "DAY_BRIGHT".to_string(),
            colors: HashMap::new(),
        };
        table.colors.insert("DEPVS".into(), RgbColor::new(180, 220, 240));
        table.colors.insert("DEPMS".into(), RgbColor::new(160, 200, 230));
        table.colors.insert("CHBLK".into(), RgbColor::new(0, 0, 0));
        data.add_color_table(table).unwrap();
        data
    }

    fn lup(rcid: i32, code: u16, instruction: &str, attrs: &[(u16, &str)]) -> LupRecord {
        LupRecord {
            rcid,
            obj_class: "DEPARE".into(),
            feature_type_code: code,
            table: LupTable::PlainBoundaries,
            display_priority: 3,
            radar_priority: RadPrio::Over,
            attributes: attrs.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            instruction: instruction.to_string(),
            display_category: DisCat::Standard,
            comment_group: 0,
            sequence: rcid,
            rule_list: RuleList::default(),
        }
    }

    #[test]
    fn test_build_compiles_rules() {
        let mut data = test_data();
        data.add_lup(lup(1, 42, "AC(DEPVS);LS(SOLD,1,CHBLK)", &[])).unwrap();
        data.build_rules().unwrap();
        let found = data.find_lup(LupTable::PlainBoundaries, 42, None).unwrap();
        assert_eq!(found.rule_list.len(), 2);
        assert!(matches!(
            found.rule_list[0].variant,
            RuleVariant::AreaColor { .. }
        ));
        // frozen afterwards
        assert!(data.add_lup(lup(2, 42, "", &[])).is_err());
    }

    #[test]
    fn test_conditional_stays_deferred_at_build() {
        let mut data = test_data();
        data.add_lup(lup(1, 42, "CS(DEPARE02)", &[])).unwrap();
        data.build_rules().unwrap();
        let found = data.find_lup(LupTable::PlainBoundaries, 42, None).unwrap();
        assert_eq!(found.rule_list.len(), 1);
        assert!(matches!(
            found.rule_list[0].variant,
            RuleVariant::Conditional { .. }
        ));
    }

    #[test]
    fn test_compile_with_conditions_expands() {
        let mut data = test_data();
        data.add_lup(lup(1, 42, "CS(DEPARE02)", &[])).unwrap();
        data.build_rules().unwrap();
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::DRVAL1, 3.0));
        attrs.insert(Attribute::double(attr::DRVAL2, 4.0));
        let conditions = RuleConditions {
            geo_primitive: GeoPrimitive::Area,
            has_floating_base: false,
            attributes: Some(&attrs),
            next_safety_contour: 1e6,
            feature_type_code: 42,
        };
        let mut creator = RuleCreator::new(99);
        let list = data.compile_with_conditions("DEPARE", "CS(DEPARE02)", &mut creator, &conditions);
        assert_eq!(list.len(), 1);
        match &list[0].variant {
            RuleVariant::AreaColor { name, .. } => assert_eq!(name, "DEPMS"),
            v => panic!("unexpected {:?}", v),
        }
    }

    #[test]
    fn test_lup_selection_by_attributes() {
        let mut data = test_data();
        data.add_lup(lup(1, 75, "SY(LIGHTS13)", &[(attr::CATLIT, "1")]))
            .unwrap();
        data.add_lup(lup(2, 75, "SY(LIGHTS82)", &[])).unwrap();
        // different type code must not interfere
        data.add_lup(lup(3, 42, "AC(DEPVS)", &[])).unwrap();
        data.build_rules().unwrap();
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::CATLIT, 1));
        let found = data
            .find_lup(LupTable::PlainBoundaries, 75, Some(&attrs))
            .unwrap();
        assert_eq!(found.rcid, 1);
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::CATLIT, 2));
        let found = data
            .find_lup(LupTable::PlainBoundaries, 75, Some(&attrs))
            .unwrap();
        assert_eq!(found.rcid, 2);
    }

    #[test]
    fn test_unknown_color_is_visible_magenta() {
        let data = test_data();
        let c = data.color("ZZZZZ");
        assert_eq!(c, RgbColor::new(197, 69, 195));
    }

    #[test]
    fn test_md5_depends_on_settings() {
        let mut a = test_data();
        a.build_rules().unwrap();
        let mut settings = RenderSettings::default();
        settings.safety_contour = 8.0;
        let mut b = S52Data::new(settings.into_shared());
        b.build_rules().unwrap();
        assert_ne!(a.md5(), b.md5());
    }
}
