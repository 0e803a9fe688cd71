use std::collections::HashMap;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::field::{FieldId, FieldKind};

/// A filled value for one field. Wire shape is a bare JSON string, boolean or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    #[default]
    Null,
}

/// `field id → value`, owned by the document instance.
pub type ValueMap = HashMap<FieldId, FieldValue>;

/// What a value renders as on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedValue {
    /// Nothing is drawn.
    Empty,
    /// Positioned, wrapped text.
    Text(String),
    /// A check mark centered in the box.
    CheckMark,
}

impl FormattedValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, FormattedValue::Empty)
    }
}

const SIGNED_MARK: &str = "Signed";

/// Formats a value for display according to the field kind.
///
/// Booleans render only when true, signatures only when signed, dates through
/// `date_format`, and anything unfilled renders as `Empty`.
pub fn format_value(kind: FieldKind, value: Option<&FieldValue>, date_format: &str) -> FormattedValue {
    let value = match value {
        Some(v) => v,
        None => return FormattedValue::Empty,
    };

    match (kind, value) {
        (_, FieldValue::Null) => FormattedValue::Empty,

        (FieldKind::Checkbox, FieldValue::Bool(checked)) => {
            if *checked {
                FormattedValue::CheckMark
            } else {
                FormattedValue::Empty
            }
        }
        (FieldKind::Checkbox, FieldValue::Text(s)) => {
            if is_truthy(s) {
                FormattedValue::CheckMark
            } else {
                FormattedValue::Empty
            }
        }

        (FieldKind::Signature, FieldValue::Bool(signed)) => {
            if *signed {
                FormattedValue::Text(SIGNED_MARK.to_string())
            } else {
                FormattedValue::Empty
            }
        }
        (FieldKind::Signature, FieldValue::Text(name)) => non_empty_text(name),

        (FieldKind::Date, FieldValue::Text(raw)) => {
            let mut rendered = String::new();
            match parse_date(raw) {
                Some(date) if write!(rendered, "{}", date.format(date_format)).is_ok() => {
                    FormattedValue::Text(rendered)
                }
                _ => non_empty_text(raw),
            }
        }

        (FieldKind::Text, FieldValue::Text(s)) => non_empty_text(s),

        (FieldKind::Text | FieldKind::Date, FieldValue::Bool(b)) => {
            if *b {
                FormattedValue::Text("Yes".to_string())
            } else {
                FormattedValue::Empty
            }
        }
    }
}

/// True when chrono can render dates with `format`.
pub fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn non_empty_text(s: &str) -> FormattedValue {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        FormattedValue::Empty
    } else {
        FormattedValue::Text(trimmed.to_string())
    }
}

fn is_truthy(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "x" | "1" | "checked"
    )
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FMT: &str = "%m/%d/%Y";

    #[test]
    fn test_value_deserializes_from_bare_json() {
        let map: ValueMap =
            serde_json::from_str(r#"{"a":"hello","b":true,"c":null}"#).unwrap();
        assert_eq!(map["a"], FieldValue::Text("hello".to_string()));
        assert_eq!(map["b"], FieldValue::Bool(true));
        assert_eq!(map["c"], FieldValue::Null);
    }

    #[test]
    fn test_missing_value_is_empty() {
        assert!(format_value(FieldKind::Text, None, FMT).is_empty());
    }

    #[test]
    fn test_whitespace_text_is_empty() {
        let v = FieldValue::Text("   ".to_string());
        assert!(format_value(FieldKind::Text, Some(&v), FMT).is_empty());
    }

    #[test]
    fn test_unchecked_checkbox_renders_nothing() {
        let v = FieldValue::Bool(false);
        assert_eq!(format_value(FieldKind::Checkbox, Some(&v), FMT), FormattedValue::Empty);
    }

    #[test]
    fn test_checked_checkbox_renders_mark() {
        let v = FieldValue::Bool(true);
        assert_eq!(
            format_value(FieldKind::Checkbox, Some(&v), FMT),
            FormattedValue::CheckMark
        );
        let v = FieldValue::Text("on".to_string());
        assert_eq!(
            format_value(FieldKind::Checkbox, Some(&v), FMT),
            FormattedValue::CheckMark
        );
    }

    #[test]
    fn test_signature_renders_only_when_signed() {
        let unsigned = FieldValue::Bool(false);
        assert!(format_value(FieldKind::Signature, Some(&unsigned), FMT).is_empty());

        let signed = FieldValue::Bool(true);
        assert_eq!(
            format_value(FieldKind::Signature, Some(&signed), FMT),
            FormattedValue::Text("Signed".to_string())
        );

        let named = FieldValue::Text("Ada Lovelace".to_string());
        assert_eq!(
            format_value(FieldKind::Signature, Some(&named), FMT),
            FormattedValue::Text("Ada Lovelace".to_string())
        );
    }

    #[test]
    fn test_date_formats_iso_input() {
        let v = FieldValue::Text("2024-03-07".to_string());
        assert_eq!(
            format_value(FieldKind::Date, Some(&v), FMT),
            FormattedValue::Text("03/07/2024".to_string())
        );
    }

    #[test]
    fn test_date_formats_rfc3339_input() {
        let v = FieldValue::Text("2024-12-31T23:00:00+00:00".to_string());
        assert_eq!(
            format_value(FieldKind::Date, Some(&v), "%Y/%m/%d"),
            FormattedValue::Text("2024/12/31".to_string())
        );
    }

    #[test]
    fn test_unparseable_date_is_rendered_verbatim() {
        let v = FieldValue::Text("next Tuesday".to_string());
        assert_eq!(
            format_value(FieldKind::Date, Some(&v), FMT),
            FormattedValue::Text("next Tuesday".to_string())
        );
    }

    #[test]
    fn test_bad_date_format_falls_back_to_raw_value() {
        let v = FieldValue::Text("2024-03-07".to_string());
        assert_eq!(
            format_value(FieldKind::Date, Some(&v), "%Q"),
            FormattedValue::Text("2024-03-07".to_string())
        );
    }

    #[test]
    fn test_date_format_validation() {
        assert!(is_valid_date_format("%m/%d/%Y"));
        assert!(is_valid_date_format("%B %e, %Y"));
        assert!(!is_valid_date_format("%Q"));
    }
}
