//! Text instruction parsing and expansion
//!
//! `TX` draws a single attribute value or literal, `TE` a printf-style
//! format over a list of attributes. Both carry justification, offsets in
//! character units, a color token and a text group code used by the
//! show-text-groups gate.

use crate::attributes::AttributeMap;
use crate::error::{S52Error, S52Result};

/// Parsed options of a TX/TE instruction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringOptions {
    /// Format string (TE) or attribute acronym / literal (TX)
    pub format: String,
    /// Attribute acronyms feeding the format (TE only)
    pub attributes: Vec<String>,
    /// Horizontal justification: 1 centre, 2 right, 3 left
    pub hjust: i32,
    /// Vertical justification: 1 bottom, 2 centre, 3 top
    pub vjust: i32,
    /// Character spacing mode
    pub space: i32,
    /// Font style token, the trailing digits give the body size
    pub chars: String,
    /// Horizontal offset in character units
    pub xoffs: i32,
    /// Vertical offset in character units
    pub yoffs: i32,
    /// Color token
    pub color: String,
    /// Text group for the visibility gate
    pub group: i32,
}

impl StringOptions {
    /// The font body size encoded in the chars token (default 16)
    pub fn font_size(&self) -> i32 {
        if self.chars.len() >= 2 {
            if let Ok(size) = self.chars[self.chars.len() - 2..].parse::<i32>() {
                if size > 3 {
                    return size;
                }
            }
        }
        16
    }
}

/// Split an instruction argument list on commas, honoring single quotes.
pub fn split_args(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in input.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
            }
            ',' if !quoted => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

fn parse_int(parts: &[String], idx: usize, default: i32) -> i32 {
    parts
        .get(idx)
        .and_then(|s| s.trim().parse::<i32>().ok())
        .unwrap_or(default)
}

fn parse_string(parts: &[String], idx: usize) -> String {
    parts.get(idx).cloned().unwrap_or_default()
}

/// Parse the arguments of a `TX` instruction.
///
/// Layout: `TX(STRING, HJUST, VJUST, SPACE, CHARS, XOFFS, YOFFS, COLOUR, DISPLAY)`
pub fn parse_tx(args: &str) -> S52Result<StringOptions> {
    let parts = split_args(args);
    if parts.is_empty() {
        return Err(S52Error::InvalidRule(format!("TX({})", args)));
    }
    Ok(StringOptions {
        format: parse_string(&parts, 0),
        attributes: Vec::new(),
        hjust: parse_int(&parts, 1, 3),
        vjust: parse_int(&parts, 2, 1),
        space: parse_int(&parts, 3, 2),
        chars: parse_string(&parts, 4),
        xoffs: parse_int(&parts, 5, 0),
        yoffs: parse_int(&parts, 6, 0),
        color: parse_string(&parts, 7),
        group: parse_int(&parts, 8, 0),
    })
}

/// Parse the arguments of a `TE` instruction.
///
/// Layout: `TE(FORMAT, 'ATTR1,ATTR2', HJUST, VJUST, SPACE, CHARS, XOFFS, YOFFS, COLOUR, DISPLAY)`
pub fn parse_te(args: &str) -> S52Result<StringOptions> {
    let parts = split_args(args);
    if parts.len() < 2 {
        return Err(S52Error::InvalidRule(format!("TE({})", args)));
    }
    Ok(StringOptions {
        format: parse_string(&parts, 0),
        attributes: parts[1]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        hjust: parse_int(&parts, 2, 3),
        vjust: parse_int(&parts, 3, 1),
        space: parse_int(&parts, 4, 2),
        chars: parse_string(&parts, 5),
        xoffs: parse_int(&parts, 6, 0),
        yoffs: parse_int(&parts, 7, 0),
        color: parse_string(&parts, 8),
        group: parse_int(&parts, 9, 0),
    })
}

/// Expand a TX instruction against a feature.
///
/// When the format names an attribute the attribute value is used;
/// otherwise the format is taken literally. `None` when the attribute is
/// absent.
pub fn expand_tx(
    options: &StringOptions,
    attributes: &AttributeMap,
    attr_id: impl Fn(&str) -> Option<u16>,
) -> Option<String> {
    let name = options.format.trim();
    if let Some(id) = attr_id(name) {
        return attributes.get_as_string(id);
    }
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Expand a TE format against a feature.
///
/// Supports the printf subset the presentation library uses: `%s`,
/// `%d`-style integers and `%4.1f`-style floats (an `l` length modifier is
/// accepted and ignored). `None` when a referenced attribute is missing.
pub fn expand_te(
    options: &StringOptions,
    attributes: &AttributeMap,
    attr_id: impl Fn(&str) -> Option<u16>,
) -> Option<String> {
    let mut out = String::new();
    let mut attr_iter = options.attributes.iter();
    let mut chars = options.format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        // collect the conversion spec
        let mut spec = String::new();
        let mut conv = ' ';
        for n in chars.by_ref() {
            if n.is_ascii_alphabetic() && n != 'l' {
                conv = n;
                break;
            }
            if n != 'l' {
                spec.push(n);
            }
        }
        let name = attr_iter.next()?;
        let id = attr_id(name)?;
        let a = attributes.get(id)?;
        match conv {
            's' => out.push_str(&a.to_display()),
            'd' | 'i' => {
                let v = attributes
                    .get_double(id)
                    .map(|v| v.round() as i64)
                    .or_else(|| attributes.get_int(id).map(|v| v as i64))?;
                out.push_str(&v.to_string());
            }
            'f' => {
                let v = attributes.get_double(id)?;
                let precision = spec
                    .split('.')
                    .nth(1)
                    .and_then(|p| p.parse::<usize>().ok())
                    .unwrap_or(1);
                out.push_str(&format!("{:.*}", precision, v));
            }
            _ => out.push_str(&a.to_display()),
        }
    }
    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{attr, Attribute};

    fn ids(name: &str) -> Option<u16> {
        match name {
            "OBJNAM" => Some(attr::OBJNAM),
            "VALNMR" => Some(attr::VALNMR),
            "HEIGHT" => Some(attr::HEIGHT),
            _ => None,
        }
    }

    #[test]
    fn test_split_args_quoted() {
        let parts = split_args("'a, b',3,2,'15110',CHBLK");
        assert_eq!(parts[0], "a, b");
        assert_eq!(parts[1], "3");
        assert_eq!(parts[3], "15110");
    }

    #[test]
    fn test_parse_tx_layout() {
        let o = parse_tx("OBJNAM,1,2,3,'15110',1,0,CHBLK,26").unwrap();
        assert_eq!(o.format, "OBJNAM");
        assert_eq!(o.hjust, 1);
        assert_eq!(o.color, "CHBLK");
        assert_eq!(o.group, 26);
        assert_eq!(o.font_size(), 10);
    }

    #[test]
    fn test_expand_tx_attribute_and_literal() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::string(attr::OBJNAM, "North Pier"));
        let o = parse_tx("OBJNAM,3,1,2,'15110',0,0,CHBLK,26").unwrap();
        assert_eq!(expand_tx(&o, &attrs, ids).as_deref(), Some("North Pier"));
        let o2 = parse_tx("'fixed text',3,1,2,'15110',0,0,CHBLK,26").unwrap();
        assert_eq!(expand_tx(&o2, &attrs, ids).as_deref(), Some("fixed text"));
    }

    #[test]
    fn test_expand_te_formats() {
        let mut attrs = AttributeMap::new();
        attrs.insert(Attribute::double(attr::HEIGHT, 12.34));
        let o = parse_te("'clr %4.1f','HEIGHT',3,1,2,'15110',0,0,CHBLK,28").unwrap();
        assert_eq!(o.attributes, vec!["HEIGHT".to_string()]);
        assert_eq!(expand_te(&o, &attrs, ids).as_deref(), Some("clr 12.3"));
    }

    #[test]
    fn test_expand_te_missing_attribute() {
        let attrs = AttributeMap::new();
        let o = parse_te("'clr %4.1f','HEIGHT',3,1,2,'15110',0,0,CHBLK,28").unwrap();
        assert_eq!(expand_te(&o, &attrs, ids), None);
    }
}
