//! Locale-aware price parsing
//!
//! The source store prints Brazilian-format prices ("R$ 1.234,56"), but
//! JSON-LD nodes sometimes carry plain decimals ("1234.56") or numbers.
//! A dot is treated as a thousands separator only when followed by exactly
//! three digits; a comma is the decimal separator. Unparseable input yields
//! `None` and the caller must reject the record, never default to zero.

use serde_json::Value;

/// Parse a price string to integer cents. Returns `None` for anything that
/// does not survive the locale rules.
pub fn parse_price_to_cents(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Strip currency markers and inner whitespace ("R$ 1.234,56" -> "1.234,56").
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != 'R' && *c != '$')
        .collect();

    let without_thousands = drop_thousands_dots(&cleaned);
    let decimal = without_thousands.replacen(',', ".", 1);

    let parsed: f64 = decimal.parse().ok()?;
    if !parsed.is_finite() || parsed < 0.0 {
        return None;
    }
    Some((parsed * 100.0).round() as i64)
}

/// Parse a price out of a JSON value: numbers are taken as major units,
/// strings go through the locale rules.
pub fn json_price_to_cents(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            let as_float = number.as_f64()?;
            if !as_float.is_finite() || as_float < 0.0 {
                return None;
            }
            Some((as_float * 100.0).round() as i64)
        }
        Value::String(text) => parse_price_to_cents(text),
        _ => None,
    }
}

/// Remove each dot that is followed by exactly three digits and then a
/// non-digit or end of input. The `regex` crate has no lookahead, so this is
/// a hand-rolled scan over the byte string.
fn drop_thousands_dots(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = String::with_capacity(value.len());

    for (index, &byte) in bytes.iter().enumerate() {
        if byte == b'.' {
            let digits = bytes[index + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if digits == 3 {
                continue;
            }
        }
        output.push(byte as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn brazilian_format() {
        assert_eq!(parse_price_to_cents("R$ 1.234,56"), Some(123_456));
        assert_eq!(parse_price_to_cents("R$ 2.599,99"), Some(259_999));
        assert_eq!(parse_price_to_cents("1.234.567,89"), Some(123_456_789));
    }

    #[test]
    fn dot_is_thousands_only_before_exactly_three_digits() {
        assert_eq!(parse_price_to_cents("1.234"), Some(123_400));
        assert_eq!(parse_price_to_cents("12.34"), Some(1_234));
        assert_eq!(parse_price_to_cents("199.90"), Some(19_990));
    }

    #[test]
    fn comma_is_decimal_separator() {
        assert_eq!(parse_price_to_cents("199,90"), Some(19_990));
        assert_eq!(parse_price_to_cents("0,99"), Some(99));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_price_to_cents(""), None);
        assert_eq!(parse_price_to_cents("   "), None);
        assert_eq!(parse_price_to_cents("free"), None);
        assert_eq!(parse_price_to_cents("-10,00"), None);
    }

    #[test]
    fn json_numbers_are_major_units() {
        assert_eq!(json_price_to_cents(&json!(1234.56)), Some(123_456));
        assert_eq!(json_price_to_cents(&json!(1999)), Some(199_900));
        assert_eq!(json_price_to_cents(&json!("R$ 149,90")), Some(14_990));
        assert_eq!(json_price_to_cents(&json!(null)), None);
        assert_eq!(json_price_to_cents(&json!(true)), None);
    }
}
