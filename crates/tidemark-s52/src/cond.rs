//! Conditional symbology procedures
//!
//! A `CS(NAME)` rule defers symbolization to one of the keyed procedures
//! in this module. Each procedure reads the feature attributes and the
//! runtime [`RuleConditions`] and returns a plain rule string, which the
//! caller compiles and memoizes under the originating rule's key.
//!
//! Two procedures (`DATCVR01`, `SOUNDG02`) do not depend on per-feature
//! state and expand already while the look-up tables are built; the rest
//! stay deferred until render time.

use crate::attributes::attr;
use crate::rules::RuleConditions;
use crate::settings::RenderSettings;
use crate::types::GeoPrimitive;
use tracing::debug;

/// Inputs of a conditional procedure
pub struct CondCtx<'a> {
    /// Object class acronym of the look-up
    pub obj_class: &'a str,
    /// The raw `CS(...)` rule
    pub rule: &'a str,
    /// Active settings
    pub settings: &'a RenderSettings,
    /// Runtime conditions; `None` during table building
    pub conditions: Option<&'a RuleConditions<'a>>,
}

type CondFn = fn(&CondCtx) -> String;

/// Whether a procedure can expand without runtime conditions
fn is_build_time(name: &str) -> bool {
    matches!(name, "DATCVR01" | "SOUNDG02")
}

fn lookup(name: &str) -> Option<CondFn> {
    Some(match name {
        "DATCVR01" => datcvr01,
        "SLCONS03" => slcons03,
        "QUAPOS01" => quapos01,
        "QUAPNT01" => quapnt01,
        "QUALIN01" => qualin01,
        "RESTRN01" => restrn01,
        "DEPARE01" | "DEPARE02" => depare01,
        "RESARE02" => resare02,
        "TOPMAR01" => topmar01,
        "OBSTRN04" => obstrn04,
        "WRECKS02" => wrecks02,
        "LIGHTS05" | "LIGHTS06" => lights06,
        "DEPCNT02" => depcnt02,
        "SOUNDG02" => soundg02,
        _ => return None,
    })
}

/// Expand a conditional rule into a plain rule string.
///
/// Returns the rule unchanged when the procedure is unknown or needs
/// conditions that are not available yet.
pub fn expand(
    obj_class: &str,
    rule: &str,
    settings: &RenderSettings,
    conditions: Option<&RuleConditions>,
) -> String {
    let name = rule
        .trim()
        .trim_start_matches("CS(")
        .trim_end_matches(')')
        .to_string();
    let Some(f) = lookup(&name) else {
        debug!(rule, "unknown conditional rule");
        return rule.to_string();
    };
    if !is_build_time(&name) && conditions.is_none() {
        return rule.to_string();
    }
    let ctx = CondCtx {
        obj_class,
        rule,
        settings,
        conditions,
    };
    f(&ctx)
}

fn soundg02(_ctx: &CondCtx) -> String {
    "MP();".to_string()
}

fn datcvr01(_ctx: &CondCtx) -> String {
    // coverage boundaries draw as the HO data limit line
    ";LC(HODATA01)\x1f".to_string()
}

/// Depth area shading.
///
/// Classifies the area against the mariner contours; dredged areas keep
/// their pattern overlay and get medium-deep shading when no depth range
/// is given.
fn depare01(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    let settings = ctx.settings;
    let drval1 = attributes.get_double(attr::DRVAL1);
    let drval1_v = drval1.unwrap_or(-1.0);
    let drval2 = attributes
        .get_double(attr::DRVAL2)
        .unwrap_or(drval1_v + 0.01);

    let mut rt = "AC(DEPIT)".to_string();
    if drval1_v >= 0.0 && drval2 > 0.0 {
        rt = "AC(DEPVS)".to_string();
    }
    if settings.two_shades {
        if drval1_v >= settings.safety_contour && drval2 > settings.safety_contour {
            rt = "AC(DEPDW)".to_string();
        }
    } else {
        if drval1_v >= settings.shallow_contour && drval2 > settings.shallow_contour {
            rt = "AC(DEPMS)".to_string();
        }
        if drval1_v >= settings.safety_contour && drval2 > settings.safety_contour {
            rt = "AC(DEPMD)".to_string();
        }
        if drval1_v >= settings.deep_contour && drval2 > settings.deep_contour {
            rt = "AC(DEPDW)".to_string();
        }
    }
    if ctx.obj_class == "DRGARE" {
        if drval1.is_none() {
            rt = "AC(DEPMD)".to_string();
        }
        rt.push_str(";AP(DRGARE01)");
        rt.push_str(";LS(DASH,1,CHGRF)");
    }
    rt.push('\x1f');
    rt
}

/// Depth contour highlighting.
///
/// A contour matching the safety contour (or the next deeper one present
/// in the chart) is drawn bold in the safety color and promoted to the
/// display base category.
fn depcnt02(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    if conditions.geo_primitive != GeoPrimitive::Line {
        return ctx.rule.to_string();
    }
    let settings = ctx.settings;
    let safety_contour = settings.safety_contour;
    let mut safe = false;
    if let Some(valdco) = attributes.get_double(attr::VALDCO) {
        if valdco == conditions.next_safety_contour {
            safe = true;
        }
    } else {
        let drval1 = attributes.get_double(attr::DRVAL1).unwrap_or(0.0);
        let drval2 = attributes.get_double(attr::DRVAL2).unwrap_or(drval1);
        if drval1 <= safety_contour {
            if drval2 >= safety_contour {
                safe = true;
            }
        } else if (drval1 - conditions.next_safety_contour).abs() < 1e-4 {
            safe = true;
        }
    }
    let quapos = attributes.get_int(attr::QUAPOS).unwrap_or(0);
    let mut rt = if (2..10).contains(&quapos) {
        if safe {
            ";LS(DASH,2,DEPSC)".to_string()
        } else {
            ";LS(DASH,1,DEPCN)".to_string()
        }
    } else if safe {
        ";LS(SOLD,2,DEPSC)".to_string()
    } else {
        ";LS(SOLD,1,DEPCN)".to_string()
    };
    if safe {
        rt.push_str(";XC()");
    }
    rt.push('\x1f');
    rt
}

/// Topmark symbol selection, split by floating or rigid base.
fn topmar01(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    let Some(topshp) = attributes.get_int(attr::TOPSHP) else {
        debug!("TOPMAR01 without TOPSHP attribute");
        return ctx.rule.to_string();
    };
    let sym = if conditions.has_floating_base {
        match topshp {
            1 => "TOPMAR02",
            2 => "TOPMAR04",
            3 => "TOPMAR10",
            4 => "TOPMAR12",
            5 => "TOPMAR13",
            6 => "TOPMAR14",
            7 => "TOPMAR65",
            8 => "TOPMAR17",
            9 => "TOPMAR16",
            10 => "TOPMAR08",
            11 => "TOPMAR07",
            12 => "TOPMAR14",
            13 => "TOPMAR05",
            14 => "TOPMAR06",
            17 => "TMARDEF2",
            18 => "TOPMAR10",
            19 => "TOPMAR13",
            20 => "TOPMAR14",
            21 => "TOPMAR13",
            22 => "TOPMAR14",
            23 => "TOPMAR14",
            24 => "TOPMAR02",
            25 => "TOPMAR04",
            26 => "TOPMAR10",
            27 => "TOPMAR17",
            28 => "TOPMAR18",
            29 => "TOPMAR02",
            30 => "TOPMAR17",
            31 => "TOPMAR14",
            32 => "TOPMAR10",
            _ => "TMARDEF2",
        }
    } else {
        match topshp {
            1 => "TOPMAR22",
            2 => "TOPMAR24",
            3 => "TOPMAR30",
            4 => "TOPMAR32",
            5 => "TOPMAR33",
            6 => "TOPMAR34",
            7 => "TOPMAR85",
            8 => "TOPMAR86",
            9 => "TOPMAR36",
            10 => "TOPMAR28",
            11 => "TOPMAR27",
            12 => "TOPMAR14",
            13 => "TOPMAR25",
            14 => "TOPMAR26",
            15 => "TOPMAR88",
            16 => "TOPMAR87",
            17 => "TMARDEF1",
            18 => "TOPMAR30",
            19 => "TOPMAR33",
            20 => "TOPMAR34",
            21 => "TOPMAR33",
            22 => "TOPMAR34",
            23 => "TOPMAR34",
            24 => "TOPMAR22",
            25 => "TOPMAR24",
            26 => "TOPMAR30",
            27 => "TOPMAR86",
            28 => "TOPMAR89",
            29 => "TOPMAR22",
            30 => "TOPMAR86",
            31 => "TOPMAR14",
            32 => "TOPMAR30",
            _ => "TMARDEF1",
        }
    };
    format!("SY({})", sym)
}

// ---- lights ----

const COL_WHITE: u8 = 1;
const COL_RED: u8 = 3;
const COL_GREEN: u8 = 4;
const COL_YELLOW: u8 = 6;
const COL_ORANGE: u8 = 11;
const COL_AMBER: u8 = 9;

fn light_symbol(colors: &[u8], all_round: bool, arc_radius: f64) -> String {
    if all_round {
        let arc_color = if colors.contains(&COL_RED) {
            "LITRD"
        } else if colors.contains(&COL_GREEN) {
            "LITGN"
        } else if colors
            .iter()
            .any(|c| [COL_WHITE, COL_YELLOW, COL_ORANGE].contains(c))
        {
            "LITYW"
        } else {
            "CHMGD"
        };
        format!(
            ";CA(CHBLK, 1,{}, 2,   0.0, 360.0, {:5.1}, 0)",
            arc_color, arc_radius
        )
    } else {
        let sym = if colors.contains(&COL_RED) {
            "LIGHTS11"
        } else if colors.contains(&COL_GREEN) {
            "LIGHTS12"
        } else if colors
            .iter()
            .any(|c| [COL_WHITE, COL_YELLOW, COL_ORANGE].contains(c))
        {
            "LIGHTS13"
        } else {
            "LITDEF11"
        };
        format!(";SY({}", sym)
    }
}

fn litchr_abbrev(litchr: i32) -> &'static str {
    match litchr {
        1 => "F",
        2 => "Fl",
        3 => "LFl",
        4 => "Q",
        5 => "VQ",
        6 => "UQ",
        7 => "Iso",
        8 => "Oc",
        9 => "IQ",
        10 => "IVQ",
        11 => "IUQ",
        12 => "Mo",
        13 => "FFl",
        14 => "Fl+LFl",
        15 => "OcFl",
        16 => "FLFl",
        17 => "Al.Oc",
        18 => "Al.LFl",
        19 => "Al.Fl",
        20 => "Al.Gr",
        25 => "Q+LFl",
        26 => "VQ+LFl",
        27 => "UQ+LFl",
        28 => "Al",
        29 => "Al.FFl",
        _ => "",
    }
}

fn colour_abbrev(colour: u8) -> &'static str {
    match colour {
        1 => "W",
        2 => "B",
        3 => "R",
        4 => "G",
        5 => "Bu",
        6 => "Y",
        7 => "Grey",
        8 => "Brown",
        9 => "Am",
        10 => "Vi",
        11 => "Or",
        12 => "Mag",
        13 => "Pink",
        _ => "",
    }
}

/// Build the textual light description (characteristic, colors, period,
/// height, range).
fn litdsn01(attributes: &crate::attributes::AttributeMap) -> String {
    let mut rt = String::new();
    if let Some(litchr) = attributes.get_int(attr::LITCHR) {
        rt.push_str(litchr_abbrev(litchr));
    }
    if let Some(siggrp) = attributes.get_string(attr::SIGGRP) {
        // the group comes as "(2)" style text already
        let grp = siggrp.trim();
        if !grp.is_empty() && grp != "(1)" {
            rt.push_str(grp);
        }
    }
    if !rt.is_empty() {
        rt.push(' ');
    }
    for c in attributes.get_parsed_list(attr::COLOUR) {
        rt.push_str(colour_abbrev(c));
    }
    if let Some(sigper) = attributes.get_double(attr::SIGPER) {
        rt.push_str(&format!(" {}s", trim_float(sigper)));
    }
    if let Some(height) = attributes.get_double(attr::HEIGHT) {
        rt.push_str(&format!(" {}m", trim_float(height)));
    }
    if let Some(valnmr) = attributes.get_double(attr::VALNMR) {
        rt.push_str(&format!(" {}M", trim_float(valnmr)));
    }
    rt.trim().to_string()
}

fn trim_float(v: f64) -> String {
    if (v - v.round()).abs() < 1e-6 {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.1}", v)
    }
}

/// Light symbolization: flare or all-round symbol for plain lights,
/// arc + sector legs for sector lights, plus the description text.
fn lights06(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return String::new();
    };
    let catlit = attributes.get_parsed_list(attr::CATLIT);
    let mut rt = String::new();
    if !catlit.is_empty() {
        if catlit.contains(&8) || catlit.contains(&11) {
            rt.push_str(";SY(LIGHTS82)");
        } else if catlit.contains(&9) {
            rt.push_str(";SY(LIGHTS81)");
        }
    }
    let mut colors = attributes.get_parsed_list(attr::COLOUR);
    if colors.is_empty() {
        colors.push(12);
    }
    let valnmr = attributes.get_double(attr::VALNMR).unwrap_or(9.0);
    let arc_radius = 75.59 * ctx.settings.symbol_scale;
    let sector_radius = 94.48 * ctx.settings.symbol_scale;

    let sectr1 = attributes.get_double(attr::SECTR1);
    let sectr2 = attributes.get_double(attr::SECTR2);
    let mut flare45 = false;
    match (sectr1, sectr2) {
        (Some(mut s1), Some(mut s2)) => {
            let sweep = if s1 > s2 { s2 - s1 + 360.0 } else { s2 - s1 };
            if sweep < 1.0 || sweep == 360.0 {
                rt.push_str(&light_symbol(&colors, true, arc_radius));
            } else {
                // opencpn private arc command: CA(outline, w, color, w, s1, s2, r, sector_r)
                let mut arc = String::from(";CA(OUTLW, 4");
                if colors.len() == 1 {
                    if colors.contains(&COL_RED) {
                        arc.push_str(",LITRD, 2");
                    } else if colors.contains(&COL_GREEN) {
                        arc.push_str(",LITGN, 2");
                    } else if colors.iter().any(|c| [COL_WHITE, COL_AMBER, COL_YELLOW].contains(c)) {
                        arc.push_str(",LITYW, 2");
                    } else {
                        arc.push_str(",CHMGD, 2");
                    }
                } else if colors.len() == 2 {
                    if colors.contains(&COL_WHITE) && colors.contains(&COL_RED) {
                        arc.push_str(",LITRD, 2");
                    } else if colors.contains(&COL_WHITE) && colors.contains(&COL_GREEN) {
                        arc.push_str(",LITGN, 2");
                    } else {
                        arc.push_str(",CHMGD, 2");
                    }
                } else {
                    arc.push_str(",CHMGD, 2");
                }
                let litvis = attributes.get_parsed_list(attr::LITVIS);
                if litvis.iter().any(|v| [3, 7, 8].contains(v)) {
                    arc = ";CA(CHBLK, 4,CHBRN, 1".to_string();
                }
                if s2 <= s1 {
                    s2 += 360.0;
                }
                // sectors are defined from seaward
                if s1 > 180.0 {
                    s1 -= 180.0;
                } else {
                    s1 += 180.0;
                }
                if s2 > 180.0 {
                    s2 -= 180.0;
                } else {
                    s2 += 180.0;
                }
                arc.push_str(&format!(
                    ",{:5.1}, {:5.1}, {:5.1}, {:5.1})",
                    s1, s2, arc_radius, sector_radius
                ));
                rt.push_str(&arc);
            }
        }
        _ => {
            // no sectors: flare for short range, all-round ring otherwise
            if catlit.contains(&1) || catlit.contains(&14) {
                // directional or moire lights need orientation handling
                rt.push_str(";SY(QUESMRK1)");
            } else if valnmr < 10.0 {
                flare45 = true;
                rt.push_str(&light_symbol(&colors, false, arc_radius));
                rt.push_str(",45)");
            } else {
                rt.push_str(&light_symbol(&colors, true, arc_radius));
            }
        }
    }
    // the description is always emitted; the text handling downstream
    // drops empty and cluttered labels
    let descr = litdsn01(attributes);
    rt.push_str(";TX('");
    rt.push_str(&descr);
    if flare45 {
        rt.push_str("',3,3,3,'15110',2,-1,CHBLK,23)");
    } else {
        rt.push_str("',3,2,3,'15110',2,0,CHBLK,23)");
    }
    rt
}

// ---- quality of position ----

fn quapnt01(ctx: &CondCtx) -> String {
    let quapos = ctx
        .conditions
        .and_then(|c| c.attributes)
        .and_then(|a| a.get_int(attr::QUAPOS))
        .unwrap_or(0);
    if (2..10).contains(&quapos) {
        ";SY(LOWACC01)".to_string()
    } else {
        String::new()
    }
}

fn qualin01(ctx: &CondCtx) -> String {
    let quapos = ctx
        .conditions
        .and_then(|c| c.attributes)
        .and_then(|a| a.get_int(attr::QUAPOS))
        .unwrap_or(0);
    if (2..10).contains(&quapos) {
        ";LC(LOWACC21)".to_string()
    } else {
        ";LS(SOLD,1,CSTLN)".to_string()
    }
}

fn quapos01(ctx: &CondCtx) -> String {
    match ctx.conditions.map(|c| c.geo_primitive) {
        Some(GeoPrimitive::Line) => qualin01(ctx),
        _ => quapnt01(ctx),
    }
}

/// Shoreline construction symbolization.
fn slcons03(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    if conditions.geo_primitive == GeoPrimitive::Point {
        let quapos = attributes.get_int(attr::QUAPOS).unwrap_or(0);
        if (2..10).contains(&quapos) {
            return ";SY(LOWACC01)".to_string();
        }
        return String::new();
    }
    let quapos = attributes.get_int(attr::QUAPOS).unwrap_or(0);
    if (2..10).contains(&quapos) {
        return ";LC(LOWACC01)".to_string();
    }
    if let Some(condtn) = attributes.get_int(attr::CONDTN) {
        if condtn == 1 || condtn == 2 {
            return ";LS(DASH,1,CSTLN)".to_string();
        }
    }
    if let Some(catslc) = attributes.get_int(attr::CATSLC) {
        if [6, 15, 16].contains(&catslc) {
            return ";LS(SOLD,4,CSTLN)".to_string();
        }
    }
    if let Some(watlev) = attributes.get_int(attr::WATLEV) {
        if watlev == 2 {
            return ";LS(SOLD,2,CSTLN)".to_string();
        }
        if watlev == 3 || watlev == 4 {
            return ";LS(DASH,2,CSTLN)".to_string();
        }
    }
    ";LS(SOLD,2,CSTLN)".to_string()
}

// ---- restricted areas ----

fn restriction_symbol(restrn: &[u8], catrea: &[u8]) -> &'static str {
    let has = |set: &[u8], vals: &[u8]| vals.iter().any(|v| set.contains(v));
    if has(restrn, &[7, 8]) {
        // entry restricted
        if has(restrn, &[1, 2, 3, 4, 5, 6]) || has(catrea, &[1, 8, 9, 12, 14, 18, 19, 21, 24, 25, 26]) {
            "ENTRES61"
        } else if has(restrn, &[9, 10, 11, 12, 13]) || has(catrea, &[4, 5, 6, 7, 10, 20, 22, 23]) {
            "ENTRES71"
        } else {
            "ENTRES51"
        }
    } else if has(restrn, &[1, 2]) {
        // anchoring restricted
        if has(restrn, &[3, 4, 5, 6]) {
            "ACHRES61"
        } else if has(restrn, &[9, 10, 11, 12, 13]) {
            "ACHRES71"
        } else {
            "ACHRES51"
        }
    } else if has(restrn, &[3, 4, 5, 6]) {
        // fishing or trawling restricted
        if has(restrn, &[9, 10, 11, 12, 13]) {
            "FSHRES71"
        } else {
            "FSHRES51"
        }
    } else if has(restrn, &[9, 10, 11, 12, 13]) {
        "CTYARE51"
    } else {
        "INFARE51"
    }
}

/// Restricted area symbolization: centred symbol + boundary style.
fn resare02(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    let restrn = attributes.get_parsed_list(attr::RESTRN);
    let catrea = attributes.get_parsed_list(attr::CATREA);
    let sym = if restrn.is_empty() && catrea.is_empty() {
        "RSRDEF51"
    } else {
        restriction_symbol(&restrn, &catrea)
    };
    let mut rt = format!(";SY({})", sym);
    if ctx.settings.symbolized_boundaries {
        rt.push_str(";LC(CTYARE51)");
    } else {
        rt.push_str(";LS(DASH,2,CHMGD)");
    }
    rt.push('\x1f');
    rt
}

/// Restriction symbol for non-RESARE objects carrying RESTRN.
fn restrn01(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    let restrn = attributes.get_parsed_list(attr::RESTRN);
    if restrn.is_empty() {
        return String::new();
    }
    format!(";SY({})", restriction_symbol(&restrn, &[]))
}

// ---- obstructions and wrecks ----

/// Whether a depth over an obstruction counts as dangerous
fn is_danger_depth(depth: f64, settings: &RenderSettings) -> bool {
    depth <= settings.safety_contour
}

/// Obstruction and foul area symbolization.
///
/// Classifies by sounding value, water level and geometry; dangerous
/// obstructions get the isolated danger treatment.
fn obstrn04(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    let settings = ctx.settings;
    let valsou = attributes.get_double(attr::VALSOU);
    let watlev = attributes.get_int(attr::WATLEV).unwrap_or(0);
    let catobs = attributes.get_int(attr::CATOBS).unwrap_or(0);
    let danger = match valsou {
        Some(v) => is_danger_depth(v, settings),
        // unknown depth: submerged obstructions are assumed dangerous
        None => !matches!(watlev, 1 | 2 | 6 | 7),
    };
    match conditions.geo_primitive {
        GeoPrimitive::Point => {
            let mut rt = String::new();
            if let Some(v) = valsou {
                if v <= 20.0 {
                    rt.push_str(&format!(";@S({:.1})", v));
                }
            }
            if danger {
                rt.push_str(";SY(ISODGR51)");
            } else {
                let sym = match watlev {
                    1 | 2 => "OBSTRN11",
                    4 | 5 => "OBSTRN03",
                    _ => "OBSTRN01",
                };
                rt.push_str(&format!(";SY({})", sym));
            }
            rt
        }
        GeoPrimitive::Line => {
            if danger {
                ";LS(DOTT,2,CHBLK)".to_string()
            } else {
                ";LS(DASH,2,CHGRD)".to_string()
            }
        }
        _ => {
            // areas: foul ground gets the pattern, dangerous areas the
            // very-shallow fill
            let mut rt = String::new();
            if catobs == 6 || danger {
                rt.push_str(";AC(DEPVS);AP(FOULAR01);LS(DOTT,2,CHBLK)");
            } else if matches!(watlev, 1 | 2) {
                rt.push_str(";AC(CHBRN);LS(SOLD,2,CSTLN)");
            } else if watlev == 4 {
                rt.push_str(";AC(DEPIT);LS(DASH,2,CSTLN)");
            } else {
                rt.push_str(";AC(DEPVS);LS(DOTT,2,CHBLK)");
            }
            rt.push('\x1f');
            rt
        }
    }
}

/// Wreck symbolization.
fn wrecks02(ctx: &CondCtx) -> String {
    let Some(conditions) = ctx.conditions else {
        return ctx.rule.to_string();
    };
    let Some(attributes) = conditions.attributes else {
        return ctx.rule.to_string();
    };
    let settings = ctx.settings;
    let valsou = attributes.get_double(attr::VALSOU);
    let watlev = attributes.get_int(attr::WATLEV).unwrap_or(0);
    let catwrk = attributes.get_int(attr::CATWRK).unwrap_or(0);
    let danger = match valsou {
        Some(v) => is_danger_depth(v, settings),
        None => !matches!(watlev, 1 | 2),
    };
    match conditions.geo_primitive {
        GeoPrimitive::Point => {
            let mut rt = String::new();
            if let Some(v) = valsou {
                if v <= 20.0 {
                    rt.push_str(&format!(";@S({:.1})", v));
                }
            }
            if danger && catwrk != 1 {
                rt.push_str(";SY(ISODGR51)");
            } else {
                let sym = match (catwrk, watlev) {
                    (1, _) => "WRECKS04",
                    (2, _) => "WRECKS05",
                    (_, 1) | (_, 2) => "WRECKS01",
                    _ => "WRECKS05",
                };
                rt.push_str(&format!(";SY({})", sym));
            }
            rt
        }
        _ => {
            let mut rt = String::new();
            let quapos = attributes.get_int(attr::QUAPOS).unwrap_or(0);
            let line = if (2..10).contains(&quapos) {
                ";LC(LOWACC41)"
            } else if danger {
                ";LS(DOTT,2,CHBLK)"
            } else if matches!(watlev, 1 | 2) {
                ";LS(SOLD,2,CSTLN)"
            } else {
                ";LS(DOTT,2,CSTLN)"
            };
            if matches!(watlev, 1 | 2) {
                rt.push_str(";AC(CHBRN)");
            } else {
                rt.push_str(";AC(DEPVS)");
            }
            rt.push_str(line);
            rt.push('\x1f');
            rt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{attr, Attribute, AttributeMap};

    fn conditions<'a>(
        attributes: &'a AttributeMap,
        geo: GeoPrimitive,
    ) -> RuleConditions<'a> {
        RuleConditions {
            geo_primitive: geo,
            has_floating_base: false,
            attributes: Some(attributes),
            next_safety_contour: 1e6,
            feature_type_code: 0,
        }
    }

    fn settings() -> RenderSettings {
        RenderSettings {
            two_shades: false,
            safety_contour: 5.0,
            shallow_contour: 2.0,
            deep_contour: 10.0,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn test_depare_medium_shallow() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::DRVAL1, 3.0));
        attrs.insert(Attribute::double(attr::DRVAL2, 4.0));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Area);
        let rt = expand("DEPARE", "CS(DEPARE02)", &s, Some(&c));
        assert_eq!(rt, "AC(DEPMS)\x1f");
    }

    #[test]
    fn test_depare_bands() {
        let s = settings();
        let cases = [
            (-2.0, -1.0, "AC(DEPIT)"),
            (0.0, 1.0, "AC(DEPVS)"),
            (6.0, 8.0, "AC(DEPMD)"),
            (11.0, 20.0, "AC(DEPDW)"),
        ];
        for (d1, d2, expect) in cases {
            let mut attrs = AttributeMap::new();
            attrs.insert(Attribute::double(attr::DRVAL1, d1));
            attrs.insert(Attribute::double(attr::DRVAL2, d2));
            let c = conditions(&attrs, GeoPrimitive::Area);
            let rt = expand("DEPARE", "CS(DEPARE02)", &s, Some(&c));
            assert_eq!(rt, format!("{}\x1f", expect), "bands {} {}", d1, d2);
        }
    }

    #[test]
    fn test_depare_two_shades() {
        let mut s = settings();
        s.two_shades = true;
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::DRVAL1, 3.0));
        attrs.insert(Attribute::double(attr::DRVAL2, 4.0));
        let c = conditions(&attrs, GeoPrimitive::Area);
        // below safety stays very shallow in two-shade mode
        assert_eq!(expand("DEPARE", "CS(DEPARE02)", &s, Some(&c)), "AC(DEPVS)\x1f");
    }

    #[test]
    fn test_drgare_gets_pattern() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::DRVAL1, 6.0));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Area);
        let rt = expand("DRGARE", "CS(DEPARE01)", &s, Some(&c));
        assert!(rt.contains("AP(DRGARE01)"));
        assert!(rt.contains("LS(DASH,1,CHGRF)"));
    }

    #[test]
    fn test_depcnt_safety_promotion() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::VALDCO, 10.0));
        let s = settings();
        let mut c = conditions(&attrs, GeoPrimitive::Line);
        c.next_safety_contour = 10.0;
        let rt = expand("DEPCNT", "CS(DEPCNT02)", &s, Some(&c));
        assert!(rt.contains("LS(SOLD,2,DEPSC)"));
        assert!(rt.contains("XC()"));
        // non-matching contour stays thin
        c.next_safety_contour = 20.0;
        let rt = expand("DEPCNT", "CS(DEPCNT02)", &s, Some(&c));
        assert!(rt.contains("LS(SOLD,1,DEPCN)"));
        assert!(!rt.contains("XC()"));
    }

    #[test]
    fn test_topmar_tables() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::TOPSHP, 1));
        let s = settings();
        let mut c = conditions(&attrs, GeoPrimitive::Point);
        assert_eq!(expand("TOPMAR", "CS(TOPMAR01)", &s, Some(&c)), "SY(TOPMAR22)");
        c.has_floating_base = true;
        assert_eq!(expand("TOPMAR", "CS(TOPMAR01)", &s, Some(&c)), "SY(TOPMAR02)");
    }

    #[test]
    fn test_lights_flare_for_short_range() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::string(attr::COLOUR, "3"));
        attrs.insert(Attribute::double(attr::VALNMR, 6.0));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Point);
        let rt = expand("LIGHTS", "CS(LIGHTS06)", &s, Some(&c));
        assert!(rt.contains("SY(LIGHTS11,45)"), "{}", rt);
    }

    #[test]
    fn test_lights_sector_arc() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::string(attr::COLOUR, "3"));
        attrs.insert(Attribute::double(attr::SECTR1, 10.0));
        attrs.insert(Attribute::double(attr::SECTR2, 60.0));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Point);
        let rt = expand("LIGHTS", "CS(LIGHTS06)", &s, Some(&c));
        assert!(rt.contains("CA(OUTLW, 4,LITRD, 2"), "{}", rt);
        // sectors flipped seaward
        assert!(rt.contains("190.0"), "{}", rt);
        assert!(rt.contains("240.0"), "{}", rt);
    }

    #[test]
    fn test_lights_description_text() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::LITCHR, 2));
        attrs.insert(Attribute::string(attr::COLOUR, "3"));
        attrs.insert(Attribute::double(attr::SIGPER, 10.0));
        attrs.insert(Attribute::double(attr::VALNMR, 12.0));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Point);
        let rt = expand("LIGHTS", "CS(LIGHTS06)", &s, Some(&c));
        assert!(rt.contains("TX('Fl R 10s 12M'"), "{}", rt);
    }

    #[test]
    fn test_lights_text_emitted_without_description() {
        // no descriptive attributes at all: the TX rule still appears
        let attrs = AttributeMap::new();
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Point);
        let rt = expand("LIGHTS", "CS(LIGHTS06)", &s, Some(&c));
        assert!(rt.contains("SY(LITDEF11,45)"), "{}", rt);
        assert!(rt.contains(";TX(''"), "{}", rt);
    }

    #[test]
    fn test_quapos_dispatch() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::QUAPOS, 4));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Line);
        assert_eq!(expand("COALNE", "CS(QUAPOS01)", &s, Some(&c)), ";LC(LOWACC21)");
        let c = conditions(&attrs, GeoPrimitive::Point);
        assert_eq!(expand("COALNE", "CS(QUAPOS01)", &s, Some(&c)), ";SY(LOWACC01)");
    }

    #[test]
    fn test_resare_entry_restriction() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::string(attr::RESTRN, "7,1"));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Area);
        let rt = expand("RESARE", "CS(RESARE02)", &s, Some(&c));
        assert!(rt.contains("SY(ENTRES61)"), "{}", rt);
        assert!(rt.contains("LS(DASH,2,CHMGD)"));
    }

    #[test]
    fn test_obstrn_danger_point() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::VALSOU, 3.0));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Point);
        let rt = expand("OBSTRN", "CS(OBSTRN04)", &s, Some(&c));
        assert!(rt.contains("SY(ISODGR51)"), "{}", rt);
        assert!(rt.contains("@S(3.0)"), "{}", rt);
    }

    #[test]
    fn test_wrecks_area_fill() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::WATLEV, 1));
        let s = settings();
        let c = conditions(&attrs, GeoPrimitive::Area);
        let rt = expand("WRECKS", "CS(WRECKS02)", &s, Some(&c));
        assert!(rt.contains("AC(CHBRN)"), "{}", rt);
    }

    #[test]
    fn test_unknown_rule_passes_through() {
        let s = settings();
        assert_eq!(expand("X", "CS(NOPE99)", &s, None), "CS(NOPE99)");
    }

    #[test]
    fn test_deferred_without_conditions() {
        let s = settings();
        assert_eq!(expand("DEPARE", "CS(DEPARE02)", &s, None), "CS(DEPARE02)");
        // build-time rules expand without conditions
        assert_eq!(expand("SOUNDG", "CS(SOUNDG02)", &s, None), "MP();");
    }
}
