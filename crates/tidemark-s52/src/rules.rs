//! Compiled symbology rules
//!
//! Look-up instruction strings compile into a list of tagged
//! instructions. Groups are separated by the unit separator `\x1f`,
//! individual rules by `;`, and each rule reads `OP(ARGS)`.
//!
//! Conditional (`CS`) rules stay deferred at compile time and are
//! expanded per feature at render time; the expansion result compiles
//! into a sub-list memoized under the originating rule's key, which is
//! stable for the lifetime of the rule creator.

use crate::attributes::AttributeMap;
use crate::text::{parse_te, parse_tx, split_args, StringOptions};
use crate::types::GeoPrimitive;
use std::sync::Arc;
use tidemark_draw::ColorAndAlpha;
use tracing::debug;

/// Line style of an `LS` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    /// Solid stroke
    Solid,
    /// Dashed stroke
    Dash,
    /// Dotted stroke
    Dott,
}

impl LineStyle {
    fn parse(s: &str) -> LineStyle {
        match s.trim() {
            "DASH" => LineStyle::Dash,
            "DOTT" => LineStyle::Dott,
            _ => LineStyle::Solid,
        }
    }
}

/// Rotation source of an `SY` rule
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolRotation {
    /// No rotation
    None,
    /// Fixed rotation in degrees
    Degrees(i32),
    /// Rotation read from a feature attribute at render time
    Attribute(String),
}

/// Parsed payload of a `CA` (sector light arc) rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArcPayload {
    /// Outline color token
    pub outline_color: String,
    /// Outline width
    pub outline_width: i32,
    /// Arc color token
    pub arc_color: String,
    /// Arc width
    pub arc_width: i32,
    /// First sector angle
    pub sectr1: f64,
    /// Second sector angle
    pub sectr2: f64,
    /// Arc radius in pixels
    pub arc_radius: f64,
    /// Sector leg radius in pixels
    pub sector_radius: f64,
}

/// The tagged instruction variants
#[derive(Debug, Clone, PartialEq)]
pub enum RuleVariant {
    /// `AC` - fill the area tessellation with a color
    AreaColor {
        /// Color token
        name: String,
        /// Resolved fill color
        color: ColorAndAlpha,
    },
    /// `AP` - stipple the area tessellation with a pattern symbol
    AreaPattern {
        /// Symbol name (without the pattern prefix)
        symbol: String,
    },
    /// `LS` - simple poly-line
    SimpleLine {
        /// Stroke style
        style: LineStyle,
        /// Stroke width
        width: i32,
        /// Color token
        color_name: String,
        /// Resolved color
        color: ColorAndAlpha,
    },
    /// `LC` - repeated symbol along the line
    SymbolLine {
        /// Symbol name (without the line prefix)
        symbol: String,
    },
    /// `SY` - point symbol
    Symbol {
        /// Symbol name
        name: String,
        /// Rotation source
        rotation: SymbolRotation,
    },
    /// `TX` - attribute or literal text
    TextTx {
        /// Parsed options
        options: StringOptions,
    },
    /// `TE` - formatted text
    TextTe {
        /// Parsed options
        options: StringOptions,
    },
    /// `MP` - multipoint sounding labels
    MultipointSounding,
    /// `@S` - a single sounding label
    SingleSounding,
    /// `CA` - arc and sector legs of a sector light
    Arc {
        /// Parsed payload
        payload: ArcPayload,
    },
    /// `CS` - conditional, expanded at render time
    Conditional {
        /// Procedure name, e.g. `DEPARE02`
        name: String,
    },
    /// `XC` - force the feature into the display base category
    SetDisplayCategory,
}

/// One compiled instruction with its stable key
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Key unique within a rule creator, used for memoized caches
    pub key: u32,
    /// The raw argument string
    pub parameter: String,
    /// The typed payload
    pub variant: RuleVariant,
}

/// A compiled instruction list
pub type RuleList = Vec<Arc<Rule>>;

/// Runtime inputs of conditional rule expansion
#[derive(Debug, Clone, Default)]
pub struct RuleConditions<'a> {
    /// Geometric primitive of the feature
    pub geo_primitive: GeoPrimitive,
    /// Whether a floating base (buoy, light float) sits at the position
    pub has_floating_base: bool,
    /// The feature attributes
    pub attributes: Option<&'a AttributeMap>,
    /// The next deeper contour present in the chart
    pub next_safety_contour: f64,
    /// Feature type code
    pub feature_type_code: u16,
}

/// Resolves color and symbol tokens during compilation.
///
/// Implemented by [`crate::data::S52Data`]; split out so the compiler can
/// be tested without a full presentation library.
pub trait RuleEnv {
    /// Resolve a color token to a packed color
    fn color(&self, name: &str) -> ColorAndAlpha;
    /// Verify a symbol exists, returning the name to use (fallbacks allowed)
    fn check_symbol(&self, name: &str) -> Option<String>;
    /// Expand a conditional procedure into a rule string
    fn expand_conditional(
        &self,
        lup_obj_class: &str,
        rule: &str,
        conditions: Option<&RuleConditions>,
    ) -> String;
}

/// Prefix under which line-style symbols are registered
pub const LS_PREFIX: &str = "ls:";
/// Prefix under which pattern symbols are registered
pub const PT_PREFIX: &str = "pt:";

const MAX_RULES_PER_CREATOR: u32 = 1024 * 1024;

/// Factory for rules with stable keys.
///
/// Keys are unique within one creator; distinct creators get
/// non-overlapping key ranges through the key factor.
pub struct RuleCreator {
    current_key: u32,
}

impl RuleCreator {
    /// Create with a key factor separating this creator's key space
    pub fn new(key_factor: u32) -> Self {
        RuleCreator {
            current_key: key_factor.wrapping_mul(MAX_RULES_PER_CREATOR),
        }
    }

    fn next_key(&mut self) -> u32 {
        let k = self.current_key;
        self.current_key = self.current_key.wrapping_add(1);
        k
    }

    fn push(&mut self, out: &mut RuleList, parameter: &str, variant: RuleVariant) {
        out.push(Arc::new(Rule {
            key: self.next_key(),
            parameter: parameter.to_string(),
            variant,
        }));
    }

    /// Compile a rule string.
    ///
    /// With `try_expansion` conditional rules are expanded through the
    /// environment immediately (used when the conditions are compile-time
    /// constant); otherwise they become deferred [`RuleVariant::Conditional`]
    /// instructions. Unparseable rules are logged and skipped.
    pub fn rules_from_string(
        &mut self,
        obj_class: &str,
        rule_str: &str,
        env: &dyn RuleEnv,
        out: &mut RuleList,
        try_expansion: bool,
        conditions: Option<&RuleConditions>,
    ) {
        for group in rule_str.split('\x1f') {
            for raw in group.split(';') {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                let Some(open) = raw.find('(') else {
                    debug!(rule = raw, "invalid rule");
                    continue;
                };
                let op = &raw[..open];
                let args = raw[open + 1..].trim_end_matches(')');
                match op {
                    "CS" => {
                        if try_expansion {
                            let expanded = env.expand_conditional(obj_class, raw, conditions);
                            if expanded == raw {
                                // could not expand without conditions, keep deferred
                                self.push(
                                    out,
                                    raw,
                                    RuleVariant::Conditional {
                                        name: args.to_string(),
                                    },
                                );
                            } else {
                                self.rules_from_string(
                                    obj_class, &expanded, env, out, false, None,
                                );
                            }
                        } else {
                            self.push(
                                out,
                                raw,
                                RuleVariant::Conditional {
                                    name: args.to_string(),
                                },
                            );
                        }
                    }
                    "AC" => {
                        let name = args.split(',').next().unwrap_or("").trim().to_string();
                        let color = env.color(&name);
                        self.push(out, args, RuleVariant::AreaColor { name, color });
                    }
                    "AP" => {
                        let name = args.trim();
                        match env.check_symbol(&format!("{}{}", PT_PREFIX, name)) {
                            Some(_) => self.push(
                                out,
                                args,
                                RuleVariant::AreaPattern {
                                    symbol: name.to_string(),
                                },
                            ),
                            None => debug!(symbol = name, "unknown pattern symbol"),
                        }
                    }
                    "SY" => {
                        let parts = split_args(args);
                        let name = parts.first().cloned().unwrap_or_default();
                        let rotation = match parts.get(1).map(|s| s.trim()) {
                            None | Some("") => SymbolRotation::None,
                            Some(r) => match r.parse::<i32>() {
                                Ok(deg) => SymbolRotation::Degrees(deg),
                                Err(_) => SymbolRotation::Attribute(r.to_string()),
                            },
                        };
                        match env.check_symbol(&name) {
                            Some(resolved) => self.push(
                                out,
                                args,
                                RuleVariant::Symbol {
                                    name: resolved,
                                    rotation,
                                },
                            ),
                            None => debug!(symbol = %name, "unknown symbol"),
                        }
                    }
                    "TX" => match parse_tx(args) {
                        Ok(options) => self.push(out, args, RuleVariant::TextTx { options }),
                        Err(e) => debug!(rule = raw, error = %e, "invalid TX rule"),
                    },
                    "TE" => match parse_te(args) {
                        Ok(options) => self.push(out, args, RuleVariant::TextTe { options }),
                        Err(e) => debug!(rule = raw, error = %e, "invalid TE rule"),
                    },
                    "MP" => self.push(out, args, RuleVariant::MultipointSounding),
                    "@S" => self.push(out, args, RuleVariant::SingleSounding),
                    "CA" => {
                        let parts = split_args(args);
                        let num =
                            |i: usize| parts.get(i).and_then(|s| s.trim().parse::<f64>().ok());
                        let payload = ArcPayload {
                            outline_color: parts.first().cloned().unwrap_or_default(),
                            outline_width: num(1).unwrap_or(2.0) as i32,
                            arc_color: parts.get(2).cloned().unwrap_or_default(),
                            arc_width: num(3).unwrap_or(2.0) as i32,
                            sectr1: num(4).unwrap_or(0.0),
                            sectr2: num(5).unwrap_or(360.0),
                            arc_radius: num(6).unwrap_or(20.0),
                            sector_radius: num(7).unwrap_or(0.0),
                        };
                        self.push(out, args, RuleVariant::Arc { payload });
                    }
                    "XC" => self.push(out, args, RuleVariant::SetDisplayCategory),
                    "LS" => {
                        let parts = split_args(args);
                        let style = LineStyle::parse(parts.first().map(|s| s.as_str()).unwrap_or(""));
                        let width = parts
                            .get(1)
                            .and_then(|s| s.trim().parse::<i32>().ok())
                            .unwrap_or(1);
                        let color_name = parts.get(2).cloned().unwrap_or_default();
                        let color = env.color(&color_name);
                        self.push(
                            out,
                            args,
                            RuleVariant::SimpleLine {
                                style,
                                width,
                                color_name,
                                color,
                            },
                        );
                    }
                    "LC" => {
                        let name = args.trim();
                        match env.check_symbol(&format!("{}{}", LS_PREFIX, name)) {
                            Some(_) => self.push(
                                out,
                                args,
                                RuleVariant::SymbolLine {
                                    symbol: name.to_string(),
                                },
                            ),
                            None => debug!(symbol = name, "unknown line symbol"),
                        }
                    }
                    _ => debug!(rule = raw, "unknown rule op"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestEnv;
    impl RuleEnv for TestEnv {
        fn color(&self, _name: &str) -> ColorAndAlpha {
            0xff00_0000
        }
        fn check_symbol(&self, name: &str) -> Option<String> {
            if name.contains("MISSING") {
                None
            } else {
                Some(name.trim_start_matches(LS_PREFIX).trim_start_matches(PT_PREFIX).to_string())
            }
        }
        fn expand_conditional(
            &self,
            _obj: &str,
            rule: &str,
            _conditions: Option<&RuleConditions>,
        ) -> String {
            if rule.contains("SOUNDG") {
                "MP();".to_string()
            } else {
                rule.to_string()
            }
        }
    }

    fn compile(s: &str, expand: bool) -> RuleList {
        let mut creator = RuleCreator::new(1);
        let mut out = RuleList::default();
        creator.rules_from_string("TESTCL", s, &TestEnv, &mut out, expand, None);
        out
    }

    #[test]
    fn test_compile_mixed_rules() {
        let rules = compile("AC(DEPVS);LS(DASH,2,CHBLK);SY(BOYLAT23,135)", false);
        assert_eq!(rules.len(), 3);
        assert!(matches!(rules[0].variant, RuleVariant::AreaColor { .. }));
        match &rules[1].variant {
            RuleVariant::SimpleLine { style, width, .. } => {
                assert_eq!(*style, LineStyle::Dash);
                assert_eq!(*width, 2);
            }
            v => panic!("unexpected {:?}", v),
        }
        match &rules[2].variant {
            RuleVariant::Symbol { rotation, .. } => {
                assert_eq!(*rotation, SymbolRotation::Degrees(135))
            }
            v => panic!("unexpected {:?}", v),
        }
    }

    #[test]
    fn test_group_separator() {
        let rules = compile("AC(DEPVS)\x1fLS(SOLD,1,CHBLK);", false);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_keys_are_unique_and_stable() {
        let rules = compile("AC(A);AC(B);AC(C)", false);
        assert_eq!(rules[0].key + 1, rules[1].key);
        assert_eq!(rules[1].key + 1, rules[2].key);
        // separate creators do not collide
        let other = {
            let mut creator = RuleCreator::new(2);
            let mut out = RuleList::default();
            creator.rules_from_string("TESTCL", "AC(A)", &TestEnv, &mut out, false, None);
            out
        };
        assert_ne!(rules[0].key, other[0].key);
    }

    #[test]
    fn test_cs_deferred_and_expanded() {
        let deferred = compile("CS(SOUNDG02)", false);
        assert!(matches!(
            deferred[0].variant,
            RuleVariant::Conditional { .. }
        ));
        let expanded = compile("CS(SOUNDG02)", true);
        assert!(matches!(
            expanded[0].variant,
            RuleVariant::MultipointSounding
        ));
    }

    #[test]
    fn test_unknown_symbol_skipped() {
        let rules = compile("SY(MISSING01);AC(DEPVS)", false);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_ca_payload() {
        let rules = compile("CA(OUTLW, 4,LITRD, 2, 180.0, 250.0, 75.6, 94.5)", false);
        match &rules[0].variant {
            RuleVariant::Arc { payload } => {
                assert_eq!(payload.outline_color, "OUTLW");
                assert_eq!(payload.outline_width, 4);
                assert!((payload.sectr1 - 180.0).abs() < 1e-9);
                assert!((payload.sector_radius - 94.5).abs() < 1e-9);
            }
            v => panic!("unexpected {:?}", v),
        }
    }
}
