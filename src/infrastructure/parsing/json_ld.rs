//! JSON-LD extraction
//!
//! Finds every `application/ld+json` script block and best-effort parses it.
//! Third parties ship malformed JSON-LD routinely; a block that fails to
//! parse is dropped, not reported.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static JSON_LD_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*type=["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("json-ld script regex")
});

/// Parse every JSON-LD block on the page, silently dropping broken ones.
pub fn extract_json_ld_blocks(html: &str) -> Vec<Value> {
    JSON_LD_SCRIPT
        .captures_iter(html)
        .filter_map(|captures| {
            let content = captures[1].trim().to_string();
            if content.is_empty() {
                return None;
            }
            match serde_json::from_str::<Value>(&content) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::debug!("dropping malformed JSON-LD block: {error}");
                    None
                }
            }
        })
        .collect()
}

/// Recursively collect every `@type: Product` node anywhere in the value,
/// including nodes nested inside `@graph` arrays or item lists.
pub fn collect_product_nodes(value: &Value, output: &mut Vec<Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_product_nodes(item, output);
            }
        }
        Value::Object(object) => {
            if object.get("@type").and_then(Value::as_str) == Some("Product") {
                output.push(object.clone());
            }
            for nested in object.values() {
                collect_product_nodes(nested, output);
            }
        }
        _ => {}
    }
}

/// First non-empty string among the candidates, trimmed.
pub fn first_string<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    for candidate in candidates.into_iter().flatten() {
        if let Some(text) = candidate.as_str() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Treat a value as a list: arrays yield their items, a lone object or
/// string yields itself, everything else is empty.
pub fn as_array(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_blocks_are_dropped() {
        let html = r#"
            <script type="application/ld+json">{"@type":"Product","name":"A"}</script>
            <script type="application/ld+json">{not valid json</script>
            <script type="application/ld+json">{"@type":"BreadcrumbList"}</script>
        "#;
        let blocks = extract_json_ld_blocks(html);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn product_nodes_are_found_in_nested_graphs() {
        let value = json!({
            "@graph": [
                {"@type": "BreadcrumbList"},
                {"@type": "ItemList", "itemListElement": [
                    {"@type": "ListItem", "item": {"@type": "Product", "name": "CPU A"}},
                    {"@type": "ListItem", "item": {"@type": "Product", "name": "CPU B"}}
                ]}
            ]
        });
        let mut products = Vec::new();
        collect_product_nodes(&value, &mut products);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["name"], "CPU A");
    }

    #[test]
    fn first_string_skips_blank_candidates() {
        let empty = json!("   ");
        let name = json!("Ryzen 5");
        assert_eq!(
            first_string([Some(&empty), None, Some(&name)]),
            Some("Ryzen 5".to_string())
        );
        assert_eq!(first_string([None, None]), None);
    }

    #[test]
    fn as_array_wraps_single_values() {
        let single = json!({"price": "10"});
        assert_eq!(as_array(Some(&single)).len(), 1);
        let list = json!([1, 2, 3]);
        assert_eq!(as_array(Some(&list)).len(), 3);
        assert!(as_array(None).is_empty());
    }
}
