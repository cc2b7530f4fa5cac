//! Spec-detail page parsing and consumer-target classification
//!
//! Turns one spec page into a `GpuSpecPayload`. Extraction runs in layers:
//! the spec table first, then a set of regex captures against the detagged
//! page text for well-known fields the table missed, then architecture
//! inference from the resolved name when the page never states it.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::gpu_spec::{GpuSpecPayload, TECHPOWERUP_SOURCE};

use super::spec_table::{extract_table_rows, normalize_spec_key};
use super::text::{html_to_text, parse_og_image, parse_title};

/// Normalized keys copied into the curated `specs` subset when present.
const USEFUL_SPEC_KEYS: [&str; 16] = [
    "architecture",
    "release_date",
    "base_clock",
    "boost_clock",
    "memory_size",
    "memory_type",
    "memory_clock",
    "memory_bus",
    "bandwidth",
    "tgp",
    "shading_units",
    "tmus",
    "rops",
    "rt_cores",
    "tensor_cores",
    "bus_interface",
];

/// (normalized key, whole-text capture pattern) pairs tried when the table
/// did not populate the key. Ordered, independently testable.
static TEXT_FALLBACK_RULES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("gpu_name", r"(?i)GPU Name\s+([A-Z0-9._-]+)"),
        ("architecture", r"(?i)Architecture\s+([^\n]+)"),
        (
            "release_date",
            r"(?i)Release Date\s+([A-Za-z]{3,10}\s+\d{1,2}(?:st|nd|rd|th)?,\s+\d{4})",
        ),
        ("bus_interface", r"(?i)Bus Interface\s+([^\n]+)"),
        ("base_clock", r"(?i)Base Clock\s+([0-9.]+\s*MHz)"),
        ("boost_clock", r"(?i)Boost Clock\s+([0-9.]+\s*MHz)"),
        (
            "memory_clock",
            r"(?i)Memory Clock\s+([0-9.]+\s*MHz(?:\s*\|\s*[0-9.]+\s*Gbps[^ \n]*)?)",
        ),
        ("memory_size", r"(?i)Memory Size\s+([0-9.]+\s*GB)"),
        ("memory_type", r"(?i)Memory Type\s+((?:GDDR\dX?|HBM\dE?)[^\n]*)"),
        ("memory_bus", r"(?i)Memory Bus\s+([0-9.]+\s*-?\s*bit)"),
        ("bandwidth", r"(?i)Bandwidth\s+([0-9.]+\s*GB/s)"),
        ("tgp", r"(?i)(?:TGP|TDP|Board Power)\s+([0-9.]+\s*W)"),
        ("shading_units", r"(?i)Shading Units\s+([0-9,]+)"),
        ("tmus", r"(?i)TMUs\s+([0-9,]+)"),
        ("rops", r"(?i)ROPs\s+([0-9,]+)"),
        ("rt_cores", r"(?i)RT Cores\s+([0-9,]+)"),
        ("tensor_cores", r"(?i)Tensor Cores\s+([0-9,]+)"),
    ]
    .into_iter()
    .map(|(key, pattern)| (key, Regex::new(pattern).expect("fallback pattern")))
    .collect()
});

/// (name pattern, architecture) inference rules, first match wins.
static ARCHITECTURE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\brtx[\s-]?5\d{3}\b", "Blackwell"),
        (r"(?i)\brtx[\s-]?4\d{3}\b", "Ada Lovelace"),
        (r"(?i)\brtx[\s-]?3\d{3}\b", "Ampere"),
        (r"(?i)\brx[\s-]?9\d{3}\b", "RDNA 4"),
        (r"(?i)\brx[\s-]?7\d{3}\b", "RDNA 3"),
        (r"(?i)\brx[\s-]?6\d{3}\b", "RDNA 2"),
        (r"(?i)\b(?:arc|xe)\b", "Xe"),
    ]
    .into_iter()
    .map(|(pattern, architecture)| (Regex::new(pattern).expect("architecture pattern"), architecture))
    .collect()
});

static URL_NVIDIA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)rtx-[345]\d{3}(?:-|\.|$)").expect("url regex"));
static URL_AMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)rx-[679]\d{3}(?:-|\.|$)").expect("url regex"));
static URL_INTEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)intel-(?:arc|xe)|/(?:arc|xe)-").expect("url regex"));
static URL_EXCLUDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)quadro|rtx-a\d{3,4}|radeon-pro|pro-w\d{3,4}|tesla|instinct|\bmi\d{2,3}\b|workstation|data-center",
    )
    .expect("url exclusion regex")
});

static TEXT_NVIDIA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brtx[\s-]?[345]\d{3}\b").expect("text regex"));
static TEXT_AMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brx[\s-]?[679]\d{3}\b").expect("text regex"));
static TEXT_INTEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bintel\b").expect("text regex"));
static TEXT_INTEL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:arc|xe)\b").expect("text regex"));
static TEXT_EXCLUDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bquadro\b|\brtx\s*a\d{3,4}\b|\bradeon\s*pro\b|\bpro\s*w\d{3,4}\b|\btesla\b|\binstinct\b|\bmi\d{2,3}\b|\bdata\s*center\b|\bworkstation\b",
    )
    .expect("text exclusion regex")
});

/// Does a detail-page URL look like a consumer GPU we track? Used during
/// discovery, before any page body is available.
pub fn is_consumer_target_url(url: &str) -> bool {
    let included =
        URL_NVIDIA.is_match(url) || URL_AMD.is_match(url) || URL_INTEL.is_match(url);
    included && !URL_EXCLUDED.is_match(url)
}

/// Does a resolved name/title belong to a consumer series we track?
/// Workstation and data-center parts are rejected even when the series
/// number matches.
pub fn is_consumer_target_text(value: &str) -> bool {
    let included = TEXT_NVIDIA.is_match(value)
        || TEXT_AMD.is_match(value)
        || (TEXT_INTEL.is_match(value) && TEXT_INTEL_LINE.is_match(value));
    included && !TEXT_EXCLUDED.is_match(value)
}

/// Infer the GPU architecture from a model name when the page did not state
/// one.
pub fn infer_architecture(name: &str) -> Option<&'static str> {
    ARCHITECTURE_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(name))
        .map(|(_, architecture)| *architecture)
}

/// Parse one spec-detail page into a payload.
///
/// `fallback_name` is the caller-supplied display name (from the queue row)
/// used only when the page has neither an `<h1>` nor a usable `<title>`.
pub fn parse_gpu_spec_page(
    html: &str,
    url: &str,
    fallback_name: Option<&str>,
    scraped_at: &str,
) -> GpuSpecPayload {
    let mut raw_specs: BTreeMap<String, String> = BTreeMap::new();
    let mut all_specs: BTreeMap<String, String> = BTreeMap::new();

    for cells in extract_table_rows(html) {
        let key = cells[0].trim().to_string();
        let value = cells[1..].join(" | ").trim().to_string();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        raw_specs.insert(key.clone(), value.clone());

        let normalized_key = normalize_spec_key(&key);
        if normalized_key.is_empty() {
            continue;
        }
        // Duplicate normalized keys accumulate instead of overwriting;
        // multi-table pages repeat labels like "Memory Clock".
        all_specs
            .entry(normalized_key)
            .and_modify(|existing| *existing = format!("{existing} | {value}"))
            .or_insert(value);
    }

    let full_text = html_to_text(html);
    for (key, pattern) in TEXT_FALLBACK_RULES.iter() {
        if all_specs.contains_key(*key) {
            continue;
        }
        if let Some(captures) = pattern.captures(&full_text) {
            let value = captures[1].trim().to_string();
            if !value.is_empty() {
                all_specs.insert((*key).to_string(), value);
            }
        }
    }

    let name = parse_title(html)
        .or_else(|| fallback_name.map(str::to_string))
        .unwrap_or_else(|| url.to_string());

    if !all_specs.contains_key("architecture") {
        if let Some(architecture) = infer_architecture(&name) {
            all_specs.insert("architecture".to_string(), architecture.to_string());
        }
    }

    let specs = USEFUL_SPEC_KEYS
        .iter()
        .filter_map(|key| {
            all_specs
                .get(*key)
                .map(|value| ((*key).to_string(), value.clone()))
        })
        .collect();

    GpuSpecPayload {
        source: TECHPOWERUP_SOURCE.to_string(),
        url: url.to_string(),
        name,
        image_url: parse_og_image(html),
        scraped_at: scraped_at.to_string(),
        specs,
        all_specs,
        raw_specs,
    }
}
