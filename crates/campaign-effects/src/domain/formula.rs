//! Numeric and formula utilities.
//!
//! Source links carry a free-form `formula` string. It is either a
//! structured JSON payload (`{"expr": "2", "target": "resource.HP.max"}`),
//! a `key=value;` list (`expr=2;target=attr.strength`), or a bare expression.
//! The parser here tries those forms in that order and never fails.

use campaign_core::model::{ComponentKind, PoolField};
use serde::Deserialize;

/// The two fields extracted from a source-link formula.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceFormula {
    /// Expression evaluated to the base value.
    pub expr: String,
    /// Raw dynamic target token, if any.
    pub target: Option<String>,
}

impl SourceFormula {
    /// Parses the formula's target token, if present and well formed.
    #[must_use]
    pub fn target_token(&self) -> Option<TargetToken> {
        self.target.as_deref().and_then(TargetToken::parse)
    }

    /// Evaluates `expr` with [`coerce_number`].
    #[must_use]
    pub fn base_value(&self) -> f64 {
        coerce_number(&self.expr)
    }
}

#[derive(Debug, Deserialize)]
struct StructuredFormula {
    #[serde(alias = "expression", alias = "value", alias = "formula")]
    expr: Option<serde_json::Value>,
    target: Option<String>,
}

/// Parses a source-link formula.
#[must_use]
pub fn parse_source_formula(raw: &str) -> SourceFormula {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return SourceFormula::default();
    }
    if let Some(formula) = parse_structured(trimmed) {
        return formula;
    }
    if let Some(formula) = parse_pairs(trimmed) {
        return formula;
    }
    SourceFormula {
        expr: trimmed.to_owned(),
        target: None,
    }
}

fn parse_structured(raw: &str) -> Option<SourceFormula> {
    if !raw.starts_with('{') {
        return None;
    }
    let parsed: StructuredFormula = serde_json::from_str(raw).ok()?;
    let expr = match parsed.expr {
        Some(serde_json::Value::String(s)) => s.trim().to_owned(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Some(SourceFormula {
        expr,
        target: non_empty(parsed.target.as_deref()),
    })
}

fn parse_pairs(raw: &str) -> Option<SourceFormula> {
    let mut formula = SourceFormula::default();
    let mut recognised = false;

    for part in raw.split([';', '\n']) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=')?;
        let value = unquote(value.trim());
        match key.trim().to_ascii_lowercase().as_str() {
            "expr" | "expression" | "value" | "formula" => {
                value.clone_into(&mut formula.expr);
                recognised = true;
            }
            "target" => {
                formula.target = non_empty(Some(value));
                recognised = true;
            }
            _ => {}
        }
    }

    recognised.then_some(formula)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// A dynamic target parsed from a formula: `resource.<name>[.<field>]` or
/// `attr.<slug>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetToken {
    /// A named pool field.
    Resource {
        /// Pool name as written in the token.
        name: String,
        /// Targeted field; `current` when omitted.
        field: PoolField,
    },
    /// An attribute slug.
    Attribute {
        /// Slugified attribute name.
        slug: String,
    },
}

impl TargetToken {
    /// Parses a token. Returns `None` for anything malformed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, rest) = raw.trim().split_once('.')?;
        match prefix.trim().to_ascii_lowercase().as_str() {
            "resource" | "status" => {
                let (name, field) = match rest.rsplit_once('.') {
                    Some((name, suffix)) => match parse_field(suffix) {
                        Some(field) => (name, field),
                        None => (rest, PoolField::Current),
                    },
                    None => (rest, PoolField::Current),
                };
                let name = name.trim();
                (!name.is_empty()).then(|| Self::Resource {
                    name: name.to_owned(),
                    field,
                })
            }
            "attr" | "attribute" => {
                let slug = slugify(rest);
                (!slug.is_empty()).then_some(Self::Attribute { slug })
            }
            _ => None,
        }
    }

    /// The component kind this token addresses.
    #[must_use]
    pub fn component_kind(&self) -> ComponentKind {
        match self {
            Self::Resource { .. } => ComponentKind::ResourcePool,
            Self::Attribute { .. } => ComponentKind::Attribute,
        }
    }
}

fn parse_field(suffix: &str) -> Option<PoolField> {
    match suffix.trim().to_ascii_lowercase().as_str() {
        "current" | "actual" => Some(PoolField::Current),
        "max" => Some(PoolField::Max),
        "bonus" => Some(PoolField::Bonus),
        _ => None,
    }
}

/// Coerces free text to a number: a direct parse, else the first numeric
/// substring, else `0.0`.
#[must_use]
pub fn coerce_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.replace(',', ".").parse::<f64>() {
        if value.is_finite() {
            return value;
        }
    }
    first_numeric_substring(trimmed).unwrap_or(0.0)
}

fn first_numeric_substring(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let start_digit = bytes.iter().position(u8::is_ascii_digit)?;
    let start = if start_digit > 0 && matches!(bytes[start_digit - 1], b'-' | b'+') {
        start_digit - 1
    } else {
        start_digit
    };

    let mut end = start_digit;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    s[start..end].parse().ok()
}

/// Normalizes a name for lookup: lower case, diacritics folded, everything
/// but letters and digits removed. `"Pontos de Vída!"` becomes
/// `"pontosdevida"`.
#[must_use]
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Slugifies a name: lower case, diacritics folded, runs of other characters
/// collapsed to `_`. `"Physical Resistance"` becomes `"physical_resistance"`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase).map(fold_diacritic) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => 'i',
        'ł' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' | 'ş' => 's',
        'ť' | 'ţ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // --- coerce_number ---

    #[test]
    fn test_coerce_number_parses_plain_numbers() {
        assert!(approx(coerce_number("3"), 3.0));
        assert!(approx(coerce_number(" -2.5 "), -2.5));
        assert!(approx(coerce_number("1,5"), 1.5));
    }

    #[test]
    fn test_coerce_number_falls_back_to_first_numeric_substring() {
        assert!(approx(coerce_number("+5 STR"), 5.0));
        assert!(approx(coerce_number("bonus -3 vs undead"), -3.0));
        assert!(approx(coerce_number("2d6+3"), 2.0));
        assert!(approx(coerce_number("about 1.25x"), 1.25));
    }

    #[test]
    fn test_coerce_number_defaults_to_zero() {
        assert!(approx(coerce_number(""), 0.0));
        assert!(approx(coerce_number("lots"), 0.0));
        assert!(approx(coerce_number("NaN"), 0.0));
    }

    // --- normalization ---

    #[test]
    fn test_normalize_key_ignores_case_diacritics_and_punctuation() {
        assert_eq!(normalize_key("Pontos de Vída!"), "pontosdevida");
        assert_eq!(normalize_key("H.P."), "hp");
        assert_eq!(normalize_key("MANÁ"), "mana");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Physical Resistance"), "physical_resistance");
        assert_eq!(slugify("  Força -- Bruta "), "forca_bruta");
        assert_eq!(slugify("***"), "");
    }

    // --- parse_source_formula ---

    #[test]
    fn test_parse_structured_payload() {
        let formula = parse_source_formula(r#"{"expr": "4", "target": "resource.HP.max"}"#);

        assert_eq!(formula.expr, "4");
        assert_eq!(formula.target.as_deref(), Some("resource.HP.max"));
    }

    #[test]
    fn test_parse_structured_payload_accepts_numeric_expression() {
        let formula = parse_source_formula(r#"{"value": 2.5}"#);

        assert_eq!(formula.expr, "2.5");
        assert!(formula.target.is_none());
    }

    #[test]
    fn test_parse_key_value_pairs() {
        let formula = parse_source_formula("expr=2; target=attr.strength");

        assert_eq!(formula.expr, "2");
        assert_eq!(formula.target.as_deref(), Some("attr.strength"));
    }

    #[test]
    fn test_parse_key_value_pairs_strip_quotes_and_ignore_unknown_keys() {
        let formula = parse_source_formula("note=shiny;expression=\"-1\";target=''");

        assert_eq!(formula.expr, "-1");
        assert!(formula.target.is_none());
    }

    #[test]
    fn test_parse_falls_back_to_whole_string() {
        let formula = parse_source_formula("  1d4+1 ");

        assert_eq!(formula.expr, "1d4+1");
        assert!(formula.target.is_none());
    }

    #[test]
    fn test_parse_malformed_json_falls_back_to_whole_string() {
        let formula = parse_source_formula("{expr: 3");

        assert_eq!(formula.expr, "{expr: 3");
    }

    #[test]
    fn test_parse_pairs_without_known_keys_falls_back_to_whole_string() {
        let formula = parse_source_formula("str>=3");

        assert_eq!(formula.expr, "str>=3");
        assert!(formula.target.is_none());
    }

    // --- TargetToken ---

    #[test]
    fn test_target_token_resource_defaults_to_current() {
        assert_eq!(
            TargetToken::parse("resource.HP"),
            Some(TargetToken::Resource {
                name: "HP".to_owned(),
                field: PoolField::Current,
            })
        );
    }

    #[test]
    fn test_target_token_resource_with_field() {
        assert_eq!(
            TargetToken::parse("resource.Mana Points.bonus"),
            Some(TargetToken::Resource {
                name: "Mana Points".to_owned(),
                field: PoolField::Bonus,
            })
        );
        assert_eq!(
            TargetToken::parse("status.HP.actual"),
            Some(TargetToken::Resource {
                name: "HP".to_owned(),
                field: PoolField::Current,
            })
        );
    }

    #[test]
    fn test_target_token_attribute_is_slugified() {
        assert_eq!(
            TargetToken::parse("attr.Physical Resistance"),
            Some(TargetToken::Attribute {
                slug: "physical_resistance".to_owned(),
            })
        );
    }

    #[test]
    fn test_target_token_rejects_malformed_input() {
        assert_eq!(TargetToken::parse("HP"), None);
        assert_eq!(TargetToken::parse("resource."), None);
        assert_eq!(TargetToken::parse("skill.fireball"), None);
        assert_eq!(TargetToken::parse("attr.!!"), None);
    }
}
