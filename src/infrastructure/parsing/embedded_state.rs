//! Embedded full-page-state blob extraction
//!
//! The store renders with Next.js and serializes the page state into a
//! `__NEXT_DATA__` script tag. The product list sits several hops deep, and
//! one of the hops is itself a string-encoded JSON document. The blob's shape
//! has drifted before; any missing hop aborts the descent with `None` rather
//! than returning a partial structure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static NEXT_DATA_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*id=["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#)
        .expect("__NEXT_DATA__ regex")
});

/// One step of a descent through the embedded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop<'a> {
    /// Index into an object by key.
    Key(&'a str),
    /// The current value is a string containing JSON; parse it.
    ParseJson,
}

/// Locate and parse the `__NEXT_DATA__` blob. `None` when the tag is absent
/// or its content is not valid JSON.
pub fn extract_next_data(html: &str) -> Option<Value> {
    let captures = NEXT_DATA_SCRIPT.captures(html)?;
    let content = captures[1].trim();
    match serde_json::from_str(content) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::debug!("embedded state blob failed to parse: {error}");
            None
        }
    }
}

/// Walk a fixed hop sequence into the blob. The first hop that does not
/// exist (or fails to parse) ends the walk with `None`.
pub fn descend(value: &Value, hops: &[Hop<'_>]) -> Option<Value> {
    let mut current = value.clone();
    for hop in hops {
        current = match hop {
            Hop::Key(key) => current.get(*key)?.clone(),
            Hop::ParseJson => {
                let text = current.as_str()?;
                serde_json::from_str(text).ok()?
            }
        };
    }
    Some(current)
}
