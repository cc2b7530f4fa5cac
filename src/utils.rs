//! Small shared helpers used across the pipeline
//!
//! Pure functions only: text normalization, deterministic id hashing and
//! ISO-8601 timestamp formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed, lowercased form used for keyword matching.
pub fn normalize_search_text(value: &str) -> String {
    normalize_whitespace(value).to_lowercase()
}

/// Lowercase alphanumeric-only form used to compare model filters against
/// URLs and names ("RTX 4070" matches "rtx-4070").
pub fn normalize_model_query(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Short deterministic hash of a string, for synthetic row ids.
pub fn short_hash(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex()[..12].to_string()
}

/// Millisecond-precision UTC timestamp string, matching the format the
/// store's other writers use (`2025-11-02T10:00:00.000Z`).
pub fn to_iso_millis(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn whitespace_collapse() {
        assert_eq!(normalize_whitespace("  a \t b\n\nc  "), "a b c");
        assert_eq!(normalize_search_text(" AMD  Ryzen "), "amd ryzen");
    }

    #[test]
    fn model_query_strips_separators() {
        assert_eq!(normalize_model_query("RTX 4070-Ti"), "rtx4070ti");
        assert_eq!(normalize_model_query("rx 7600"), "rx7600");
    }

    #[test]
    fn short_hash_is_stable() {
        let a = short_hash("https://example.com/produto/1");
        let b = short_hash("https://example.com/produto/1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, short_hash("https://example.com/produto/2"));
    }

    #[test]
    fn iso_millis_format() {
        let instant = Utc.with_ymd_and_hms(2025, 11, 2, 10, 0, 0).unwrap();
        assert_eq!(to_iso_millis(instant), "2025-11-02T10:00:00.000Z");
    }
}
