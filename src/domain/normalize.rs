//! Offer title normalization: brand detection and model derivation
//!
//! Pure, deterministic functions of the raw offer. Each category has its own
//! keyword rules; the model is what remains of the title after stripping the
//! category noise words and the detected brand. Results shorter than three
//! characters are rejected as noise, not treated as an error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::{normalize_search_text, normalize_whitespace};

use super::category::CategorySlug;
use super::offer::{NormalizedOffer, RawOffer};

static GPU_RTX_SERIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brtx[\s-]?[345]\d{3}\b").expect("gpu series regex"));
static GPU_RX_SERIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brx[\s-]?[6-9]\d{3}\b").expect("gpu series regex"));
static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+-\s+").expect("dash regex"));

fn detect_cpu_brand(title: &str) -> Option<&'static str> {
    let normalized = normalize_search_text(title);
    if normalized.contains("amd") || normalized.contains("ryzen") {
        return Some("AMD");
    }
    if normalized.contains("intel")
        || normalized.contains("core i")
        || normalized.contains("celeron")
        || normalized.contains("pentium")
    {
        return Some("Intel");
    }
    None
}

fn detect_gpu_brand(title: &str) -> Option<&'static str> {
    let normalized = normalize_search_text(title);
    // Series numbers are the strongest signal; board-partner titles often
    // lead with the partner name rather than the chip vendor.
    if GPU_RTX_SERIES.is_match(&normalized) {
        return Some("NVIDIA");
    }
    if GPU_RX_SERIES.is_match(&normalized) {
        return Some("AMD");
    }
    if normalized.contains("nvidia") || normalized.contains("geforce") || normalized.contains("rtx")
    {
        return Some("NVIDIA");
    }
    if normalized.contains("amd") || normalized.contains("radeon") {
        return Some("AMD");
    }
    None
}

fn detect_ram_brand(title: &str) -> Option<&'static str> {
    let normalized = normalize_search_text(title);
    for (needle, brand) in [
        ("corsair", "Corsair"),
        ("kingston", "Kingston"),
        ("crucial", "Crucial"),
        ("g.skill", "G.Skill"),
        ("gskill", "G.Skill"),
        ("teamgroup", "TeamGroup"),
        ("xpg", "XPG"),
        ("adata", "ADATA"),
        ("patriot", "Patriot"),
    ] {
        if normalized.contains(needle) {
            return Some(brand);
        }
    }
    None
}

/// Strip a list of noise patterns plus the detected brand from the title and
/// return the residue, or `None` when too little is left to be a model name.
fn derive_model(title: &str, brand: Option<&str>, noise: &[&Regex]) -> Option<String> {
    let mut model = normalize_whitespace(title);
    for pattern in noise {
        model = pattern.replace_all(&model, "").into_owned();
    }

    if let Some(brand) = brand {
        let brand_pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(brand)))
            .expect("escaped brand regex");
        model = brand_pattern.replace_all(&model, "").into_owned();
    }

    model = DASH_RUN.replace_all(&model, " ").into_owned();
    let model = normalize_whitespace(&model);
    if model.chars().count() > 2 { Some(model) } else { None }
}

static CPU_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)\bprocessador\b", r"(?i)\bcpu\b", r"(?i)\b(amd|intel)\b"]
        .iter()
        .map(|p| Regex::new(p).expect("cpu noise regex"))
        .collect()
});

static GPU_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bplaca\s+de\s+v[ií]deo\b",
        r"(?i)\bvga\b",
        r"(?i)\bgpu\b",
        r"(?i)\bgeforce\b",
        r"(?i)\bradeon\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("gpu noise regex"))
    .collect()
});

static RAM_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)\bmem[oó]ria\s+ram\b", r"(?i)\bram\b"]
        .iter()
        .map(|p| Regex::new(p).expect("ram noise regex"))
        .collect()
});

/// Normalize a CPU offer title into brand + model.
pub fn normalize_cpu_offer(raw: &RawOffer) -> NormalizedOffer {
    let normalized_name = normalize_whitespace(&raw.title);
    let brand = detect_cpu_brand(&normalized_name);
    let model = derive_model(
        &normalized_name,
        brand,
        &CPU_NOISE.iter().collect::<Vec<_>>(),
    );
    NormalizedOffer {
        raw: raw.clone(),
        normalized_name,
        brand: brand.map(str::to_string),
        model,
    }
}

/// Normalize a GPU offer title into brand + model.
pub fn normalize_gpu_offer(raw: &RawOffer) -> NormalizedOffer {
    let normalized_name = normalize_whitespace(&raw.title);
    let brand = detect_gpu_brand(&normalized_name);
    let model = derive_model(
        &normalized_name,
        brand,
        &GPU_NOISE.iter().collect::<Vec<_>>(),
    );
    NormalizedOffer {
        raw: raw.clone(),
        normalized_name,
        brand: brand.map(str::to_string),
        model,
    }
}

/// Normalize a RAM offer title into brand + model.
pub fn normalize_ram_offer(raw: &RawOffer) -> NormalizedOffer {
    let normalized_name = normalize_whitespace(&raw.title);
    let brand = detect_ram_brand(&normalized_name);
    let model = derive_model(
        &normalized_name,
        brand,
        &RAM_NOISE.iter().collect::<Vec<_>>(),
    );
    NormalizedOffer {
        raw: raw.clone(),
        normalized_name,
        brand: brand.map(str::to_string),
        model,
    }
}

/// Dispatch to the category-specific normalizer.
pub fn normalize_offer(category: CategorySlug, raw: &RawOffer) -> NormalizedOffer {
    match category {
        CategorySlug::Cpu => normalize_cpu_offer(raw),
        CategorySlug::Gpu => normalize_gpu_offer(raw),
        CategorySlug::Ram => normalize_ram_offer(raw),
    }
}
