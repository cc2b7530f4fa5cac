//! Tag stripping and plain-text conversion
//!
//! Regex-based on purpose: the source pages are not well-formed enough for a
//! strict parser, and the extractors only need text content, not a DOM.

use once_cell::sync::Lazy;
use regex::Regex;

static BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?\s*>").expect("br regex"));
static BLOCK_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(?:tr|p|div|li|h[1-6]|table|section)>").expect("block regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static H1_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("h1 regex"));
static TITLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));
static TITLE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-|].*$").expect("title suffix regex"));
static OG_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']([^"']+)["'][^>]*>"#)
        .expect("og:image regex")
});

/// Decode the small set of entities the source sites actually emit.
fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&NBSP;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Remove markup from an HTML fragment and collapse all whitespace to single
/// spaces. Idempotent: running it on its own output is a no-op.
pub fn strip_tags(value: &str) -> String {
    let with_breaks = BR_TAG.replace_all(value, "\n");
    let without_tags = ANY_TAG.replace_all(&with_breaks, " ");
    let decoded = decode_entities(&without_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert a whole page to plain text, keeping line structure at `<br>` and
/// block boundaries so line-bounded captures stay bounded.
pub fn html_to_text(html: &str) -> String {
    let with_breaks = BR_TAG.replace_all(html, "\n");
    let with_blocks = BLOCK_CLOSE.replace_all(&with_breaks, "\n");
    let without_tags = ANY_TAG.replace_all(&with_blocks, " ");
    let decoded = decode_entities(&without_tags);

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve the page title: prefer `<h1>`, fall back to `<title>` with the
/// trailing " - site name" suffix stripped.
pub fn parse_title(html: &str) -> Option<String> {
    if let Some(captures) = H1_BLOCK.captures(html) {
        let title = strip_tags(&captures[1]);
        if !title.is_empty() {
            return Some(title);
        }
    }
    if let Some(captures) = TITLE_BLOCK.captures(html) {
        let stripped = strip_tags(&captures[1]);
        let title = TITLE_SUFFIX.replace(&stripped, "").trim().to_string();
        if !title.is_empty() {
            return Some(title);
        }
    }
    None
}

/// Extract the `og:image` meta content, if present.
pub fn parse_og_image(html: &str) -> Option<String> {
    OG_IMAGE
        .captures(html)
        .map(|captures| strip_tags(&captures[1]))
        .filter(|value| !value.is_empty())
}
