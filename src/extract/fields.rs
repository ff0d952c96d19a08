//! Lenient readers for loosely-typed JSON fields.
//!
//! Backends return numbers as strings, dates in several layouts and parties as
//! either plain names or objects. Every reader here returns `None` instead of
//! failing so the adapter can fall back to a default.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::record::Party;

const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%y"];

/// First non-null value among `keys`.
pub fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .ok()
        }
        Value::String(s) => parse_decimal_text(s),
        _ => None,
    }
}

/// Parse an amount written by a human, e.g. `"1 234,50 грн."` or `"$1,234.50"`.
///
/// Only the span from the first to the last digit is considered. When both
/// `.` and `,` occur, the last one is the decimal separator. A separator that
/// repeats is a thousands separator.
fn parse_decimal_text(s: &str) -> Option<Decimal> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let end = s.rfind(|c: char| c.is_ascii_digit())? + 1;
    let negative = s[..start].trim_end().ends_with('-');
    let span: String = s[start..end]
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .collect();

    let decimal_sep = match (span.rfind('.'), span.rfind(',')) {
        (Some(dot), Some(comma)) => Some(if dot > comma { '.' } else { ',' }),
        (Some(_), None) if span.matches('.').count() == 1 => Some('.'),
        (None, Some(_)) if span.matches(',').count() == 1 => Some(','),
        _ => None,
    };
    let mut normalized: String = span
        .chars()
        .filter_map(|c| match c {
            '.' | ',' if Some(c) == decimal_sep => Some('.'),
            '.' | ',' => None,
            digit => Some(digit),
        })
        .collect();
    if negative {
        normalized.insert(0, '-');
    }
    Decimal::from_str(&normalized).ok()
}

pub fn date(value: &Value) -> Option<NaiveDate> {
    let raw = text(value)?;
    // ISO timestamps: keep the date part
    let candidate = if raw.len() > 10 && raw.as_bytes()[4] == b'-' {
        raw.get(..10).unwrap_or(&raw)
    } else {
        raw.as_str()
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}

/// Normalize a currency to an upper-case code, mapping common symbols.
pub fn currency(value: &Value) -> Option<String> {
    let raw = text(value)?;
    let lowered = raw.to_lowercase();
    let code = match lowered.as_str() {
        "₴" | "грн" | "грн." | "hryvnia" => "UAH".to_string(),
        "$" | "us$" | "dollar" => "USD".to_string(),
        "€" | "euro" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        "zł" | "zl" => "PLN".to_string(),
        _ => raw.to_uppercase(),
    };
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())).then_some(code)
}

pub struct PartyKeys {
    pub name: &'static [&'static str],
    pub tax_id: &'static [&'static str],
    pub address: &'static [&'static str],
}

pub fn party(value: Option<&Value>, keys: &PartyKeys) -> Party {
    match value {
        Some(Value::Object(obj)) => Party {
            name: first(obj, keys.name).and_then(text).unwrap_or_default(),
            tax_id: first(obj, keys.tax_id).and_then(text),
            address: first(obj, keys.address).and_then(text),
        },
        Some(other) => text(other).map(Party::named).unwrap_or_default(),
        None => Party::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decimals_accept_numbers_and_localized_strings() {
        assert_eq!(decimal(&json!(11008.77)), Some(Decimal::new(1100877, 2)));
        assert_eq!(decimal(&json!("1 234,50")), Some(Decimal::new(123450, 2)));
        assert_eq!(decimal(&json!("1,234.50 грн")), Some(Decimal::new(123450, 2)));
        assert_eq!(decimal(&json!(3)), Some(Decimal::new(3, 0)));
        assert_eq!(decimal(&json!("1.234,50")), Some(Decimal::new(123450, 2)));
        assert_eq!(decimal(&json!("1 234,50 грн.")), Some(Decimal::new(123450, 2)));
        assert_eq!(decimal(&json!("12.50 грн.")), Some(Decimal::new(1250, 2)));
        assert_eq!(decimal(&json!("1.234.567")), Some(Decimal::new(1234567, 0)));
        assert_eq!(decimal(&json!("-15,5")), Some(Decimal::new(-155, 1)));
        assert_eq!(decimal(&json!("n/a")), None);
        assert_eq!(decimal(&json!(null)), None);
    }

    #[test]
    fn dates_accept_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 7, 18);
        assert_eq!(date(&json!("2025-07-18")), expected);
        assert_eq!(date(&json!("18.07.2025")), expected);
        assert_eq!(date(&json!("2025-07-18T10:00:00Z")), expected);
        assert_eq!(date(&json!("yesterday")), None);
    }

    #[test]
    fn currency_symbols_become_codes() {
        assert_eq!(currency(&json!("грн")), Some("UAH".to_string()));
        assert_eq!(currency(&json!("usd")), Some("USD".to_string()));
        assert_eq!(currency(&json!("dollars of the realm")), None);
    }
}
