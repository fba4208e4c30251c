//! Look-up records
//!
//! A LUP maps (table, feature type) to a display priority, category and an
//! instruction string. Matching picks the candidate whose attribute
//! patterns agree best with the feature's attributes.

use crate::attributes::AttributeMap;
use crate::rules::RuleList;
use crate::types::{DisCat, LupTable, RadPrio, RenderStep};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One look-up record of the presentation library
#[derive(Debug, Clone)]
pub struct LupRecord {
    /// Record id within the library
    pub rcid: i32,
    /// Object class acronym (6 chars)
    pub obj_class: String,
    /// Numeric feature type code
    pub feature_type_code: u16,
    /// The table this record belongs to
    pub table: LupTable,
    /// Display priority group
    pub display_priority: i32,
    /// Radar priority
    pub radar_priority: RadPrio,
    /// Attribute patterns that must match
    pub attributes: BTreeMap<u16, String>,
    /// The raw instruction string
    pub instruction: String,
    /// Display category
    pub display_category: DisCat,
    /// Comment group (text grouping)
    pub comment_group: i32,
    /// Encounter order in the library, used as a tie breaker
    pub sequence: i32,
    /// The compiled instruction list
    pub rule_list: RuleList,
}

impl LupRecord {
    /// The render step the record's own rules execute in
    pub fn step(&self) -> RenderStep {
        match self.table {
            LupTable::PlainBoundaries | LupTable::SymbolizedBoundaries => RenderStep::Areas2,
            LupTable::Lines => RenderStep::Lines,
            LupTable::Simplified | LupTable::PaperChart => RenderStep::Points,
        }
    }

    /// Score the record against a feature's attributes.
    ///
    /// Every pattern must hold or the score is 0: a blank pattern needs
    /// the attribute present (any value), `?` needs it absent, anything
    /// else needs an equal value. Each satisfied pattern counts one. A
    /// feature without attributes, or a record without patterns, scores
    /// 0 and is only found by the fallback pass.
    pub fn attribute_match(&self, object_attributes: &AttributeMap) -> i32 {
        if object_attributes.is_empty() {
            return 0;
        }
        if self.attributes.is_empty() {
            return 0;
        }
        let mut score = 0;
        for (id, pattern) in &self.attributes {
            let pattern = pattern.trim();
            match object_attributes.get(*id) {
                Some(a) => {
                    if !a.matches(pattern) {
                        return 0;
                    }
                    score += 1;
                }
                None => {
                    if pattern == "?" {
                        // ? requires the attribute to be absent
                        score += 1;
                        continue;
                    }
                    return 0;
                }
            }
        }
        score
    }
}

/// Pick the best look-up from a candidate slice.
///
/// The record with the highest positive score wins; ties keep the earlier
/// record. When nothing scores positive the first record without an
/// attribute list is used.
pub fn best_match<'a>(
    candidates: &'a [Arc<LupRecord>],
    attributes: Option<&AttributeMap>,
) -> Option<&'a Arc<LupRecord>> {
    if candidates.is_empty() {
        return None;
    }
    let Some(attributes) = attributes else {
        return candidates.first();
    };
    let mut best: Option<(&'a Arc<LupRecord>, i32)> = None;
    for lup in candidates {
        let score = lup.attribute_match(attributes);
        if score > 0 {
            match best {
                Some((_, s)) if s >= score => {}
                _ => best = Some((lup, score)),
            }
        }
    }
    if let Some((lup, _)) = best {
        return Some(lup);
    }
    candidates
        .iter()
        .find(|l| l.attributes.is_empty())
        .or_else(|| candidates.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{attr, Attribute};
    use crate::types::LupTable;

    fn lup(rcid: i32, attrs: &[(u16, &str)]) -> LupRecord {
        LupRecord {
            rcid,
            obj_class: "LIGHTS".into(),
            feature_type_code: 75,
            table: LupTable::PaperChart,
            display_priority: 8,
            radar_priority: RadPrio::Over,
            attributes: attrs.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            instruction: String::new(),
            display_category: DisCat::Standard,
            comment_group: 0,
            sequence: rcid,
            rule_list: RuleList::default(),
        }
    }

    #[test]
    fn test_attribute_lup_wins_over_fallback() {
        let candidates = vec![Arc::new(lup(1, &[(attr::CATLIT, "1")])), Arc::new(lup(2, &[]))];
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::CATLIT, 1));
        let chosen = best_match(&candidates, Some(&attrs)).unwrap();
        assert_eq!(chosen.rcid, 1);

        let mut other = AttributeMap::new();
        other.insert(Attribute::int(attr::CATLIT, 2));
        let chosen = best_match(&candidates, Some(&other)).unwrap();
        assert_eq!(chosen.rcid, 2);
    }

    #[test]
    fn test_superset_wins() {
        let candidates = vec![
            Arc::new(lup(1, &[(attr::CATLIT, "1")])),
            Arc::new(lup(2, &[(attr::CATLIT, "1"), (attr::COLOUR, "3")])),
        ];
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::CATLIT, 1));
        attrs.insert(Attribute::string(attr::COLOUR, "3"));
        let chosen = best_match(&candidates, Some(&attrs)).unwrap();
        assert_eq!(chosen.rcid, 2);
    }

    #[test]
    fn test_mismatch_disqualifies() {
        let l = lup(1, &[(attr::CATLIT, "1"), (attr::COLOUR, "?")]);
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::CATLIT, 2));
        assert_eq!(l.attribute_match(&attrs), 0);
    }

    #[test]
    fn test_blank_and_question_are_presence_sensitive() {
        // blank needs the attribute present, ? needs it absent
        let l = lup(1, &[(attr::CATLIT, ""), (attr::COLOUR, "?")]);
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::int(attr::CATLIT, 7));
        assert_eq!(l.attribute_match(&attrs), 2);
        // a carried COLOUR breaks the ? pattern
        attrs.insert(Attribute::string(attr::COLOUR, "3"));
        assert_eq!(l.attribute_match(&attrs), 0);
        // a missing CATLIT breaks the blank pattern
        let blank_only = lup(2, &[(attr::CATLIT, "")]);
        let mut only_colour = AttributeMap::new();
        only_colour.insert(Attribute::string(attr::COLOUR, "3"));
        assert_eq!(blank_only.attribute_match(&only_colour), 0);
    }

    #[test]
    fn test_attribute_free_feature_scores_zero() {
        let l = lup(1, &[(attr::CATLIT, "1")]);
        assert_eq!(l.attribute_match(&AttributeMap::new()), 0);
    }

    #[test]
    fn test_step_mapping() {
        let mut l = lup(1, &[]);
        assert_eq!(l.step(), RenderStep::Points);
        l.table = LupTable::Lines;
        assert_eq!(l.step(), RenderStep::Lines);
        l.table = LupTable::PlainBoundaries;
        assert_eq!(l.step(), RenderStep::Areas2);
    }
}
