//! Spec table extraction and key alias resolution
//!
//! The spec site presents most data as `<tr>` rows with a label cell and one
//! or more value cells. Labels drift between page generations ("TDP",
//! "Board Power", "Typical Board Power"), so every raw key goes through an
//! ordered alias rule table before falling back to a slug of itself.

use once_cell::sync::Lazy;
use regex::Regex;

use super::text::strip_tags;

static TABLE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("tr regex"));
static TABLE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:th|td)[^>]*>(.*?)</(?:th|td)>").expect("cell regex"));
static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("paren regex"));
static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug regex"));

/// One alias rule: any raw key matching one of the patterns normalizes to
/// the canonical key.
struct SpecKeyAlias {
    key: &'static str,
    patterns: Vec<Regex>,
}

fn alias(key: &'static str, patterns: &[&str]) -> SpecKeyAlias {
    SpecKeyAlias {
        key,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(p).expect("alias pattern"))
            .collect(),
    }
}

static SPEC_KEY_ALIASES: Lazy<Vec<SpecKeyAlias>> = Lazy::new(|| {
    vec![
        alias(
            "gpu_name",
            &[r"(?i)^gpu\s*name$", r"(?i)^chip\s*name$", r"(?i)^graphics\s*processor$"],
        ),
        alias("gpu_variant", &[r"(?i)^gpu\s*variant$", r"(?i)^device\s*id$"]),
        alias("architecture", &[r"(?i)^architecture$"]),
        alias("foundry", &[r"(?i)^foundry$"]),
        alias("process_size", &[r"(?i)^process\s*size$"]),
        alias("transistors", &[r"(?i)^transistors$"]),
        alias("die_size", &[r"(?i)^die\s*size$"]),
        alias("release_date", &[r"(?i)^release\s*date$"]),
        alias("bus_interface", &[r"(?i)^bus\s*interface$"]),
        alias("base_clock", &[r"(?i)^base\s*clock$", r"(?i)^gpu\s*clock$"]),
        alias("boost_clock", &[r"(?i)^boost\s*clock$"]),
        alias("memory_clock", &[r"(?i)^memory\s*clock$"]),
        alias("memory_size", &[r"(?i)^memory\s*size$"]),
        alias("memory_type", &[r"(?i)^memory\s*type$"]),
        alias("memory_bus", &[r"(?i)^memory\s*bus$", r"(?i)^bus\s*width$"]),
        alias("bandwidth", &[r"(?i)^bandwidth$", r"(?i)^memory\s*bandwidth$"]),
        alias(
            "shading_units",
            &[r"(?i)^shading\s*units$", r"(?i)^cuda\s*cores$", r"(?i)^stream\s*processors$"],
        ),
        alias("tmus", &[r"(?i)^tmus$"]),
        alias("rops", &[r"(?i)^rops$"]),
        alias("rt_cores", &[r"(?i)^rt\s*cores$"]),
        alias("tensor_cores", &[r"(?i)^tensor\s*cores$"]),
        alias(
            "tgp",
            &[
                r"(?i)^tgp$",
                r"(?i)^tdp$",
                r"(?i)^board\s*power$",
                r"(?i)^typical\s*board\s*power$",
            ],
        ),
        alias("outputs", &[r"(?i)^outputs$"]),
        alias("power_connectors", &[r"(?i)^power\s*connectors?$"]),
        alias("slot_width", &[r"(?i)^slot\s*width$"]),
        alias("length", &[r"(?i)^length$"]),
        alias("directx", &[r"(?i)^directx$"]),
        alias("opengl", &[r"(?i)^opengl$"]),
        alias("vulkan", &[r"(?i)^vulkan$"]),
        alias("shader_model", &[r"(?i)^shader\s*model$"]),
        alias("opencl", &[r"(?i)^opencl$"]),
    ]
});

/// Extract every table row with at least a label and one value cell.
/// Extra cells are preserved by the caller joining them with " | ".
pub fn extract_table_rows(html: &str) -> Vec<Vec<String>> {
    TABLE_ROW
        .captures_iter(html)
        .filter_map(|row| {
            let cells: Vec<String> = TABLE_CELL
                .captures_iter(&row[1])
                .map(|cell| strip_tags(&cell[1]))
                .collect();
            if cells.len() >= 2 && !cells[0].is_empty() && !cells[1].is_empty() {
                Some(cells)
            } else {
                None
            }
        })
        .collect()
}

/// Resolve a raw spec label to its canonical key: first matching alias rule
/// wins, otherwise a slug of the label itself ("Some Custom Field" ->
/// "some_custom_field"). Returns an empty string for labels that slug away
/// to nothing; callers skip those.
pub fn normalize_spec_key(raw_key: &str) -> String {
    for rule in SPEC_KEY_ALIASES.iter() {
        if rule.patterns.iter().any(|pattern| pattern.is_match(raw_key)) {
            return rule.key.to_string();
        }
    }

    let lowered = raw_key.to_lowercase();
    let without_parens = PARENTHESIZED.replace_all(&lowered, "");
    let slug = NON_ALNUM_RUN.replace_all(&without_parens, "_");
    slug.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolution() {
        assert_eq!(normalize_spec_key("Board Power"), "tgp");
        assert_eq!(normalize_spec_key("TDP"), "tgp");
        assert_eq!(normalize_spec_key("GPU Name"), "gpu_name");
        assert_eq!(normalize_spec_key("Graphics Processor"), "gpu_name");
        assert_eq!(normalize_spec_key("CUDA Cores"), "shading_units");
    }

    #[test]
    fn unknown_keys_slug_to_themselves() {
        assert_eq!(normalize_spec_key("Some Custom Field"), "some_custom_field");
        assert_eq!(normalize_spec_key("L2 Cache (per GPC)"), "l2_cache");
        assert_eq!(normalize_spec_key("???"), "");
    }

    #[test]
    fn rows_need_label_and_value() {
        let html = r#"
            <table>
              <tr><th>GPU Name</th><td>AD104</td></tr>
              <tr><td>Memory Clock</td><td>1313 MHz</td><td>21 Gbps effective</td></tr>
              <tr><td>lonely cell</td></tr>
              <tr><td></td><td>no label</td></tr>
            </table>
        "#;
        let rows = extract_table_rows(html);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["GPU Name", "AD104"]);
        assert_eq!(rows[1], vec!["Memory Clock", "1313 MHz", "21 Gbps effective"]);
    }
}
