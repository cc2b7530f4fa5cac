//! Per-category target filters
//!
//! These decide whether a scraped product belongs in the catalog at all.
//! Rejected products are discarded before normalization, never stored with a
//! soft "excluded" flag.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::category::CategorySlug;
use crate::domain::offer::{CpuSocket, ExtractionSource, GpuVendor, OfferMeta};
use crate::utils::normalize_whitespace;

static RTX_SERIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brtx[\s-]?([345]\d{3})\b").expect("rtx series regex"));
static RX_SERIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brx[\s-]?([679]\d{3})\b").expect("rx series regex"));
static DDR_GENERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bddr[2-5]x?\b").expect("ddr regex"));
static MEMORIA_RAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmem[oó]ria\b").expect("memoria regex"));

/// What a title matched within its category's target rules.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetMatch {
    Cpu { socket: CpuSocket },
    Gpu { vendor: GpuVendor, series: String },
    Ram,
}

impl TargetMatch {
    /// Build the connector meta for an offer produced by `source`.
    pub fn into_meta(self, source: ExtractionSource) -> OfferMeta {
        match self {
            TargetMatch::Cpu { socket } => OfferMeta::KabumCpu { source, socket },
            TargetMatch::Gpu { vendor, series } => OfferMeta::KabumGpu {
                source,
                vendor,
                series: Some(series),
            },
            TargetMatch::Ram => OfferMeta::KabumRam { source },
        }
    }
}

/// Apply the category's acceptance rules to a product title. `None` means
/// the product is out of catalog scope.
pub fn classify_target(category: CategorySlug, title: &str) -> Option<TargetMatch> {
    match category {
        CategorySlug::Cpu => {
            // Only current sockets are tracked; a title with no recognized
            // socket token is excluded entirely.
            CpuSocket::detect(title).map(|socket| TargetMatch::Cpu { socket })
        }
        CategorySlug::Gpu => {
            if let Some(captures) = RTX_SERIES.captures(title) {
                return Some(TargetMatch::Gpu {
                    vendor: GpuVendor::Nvidia,
                    series: format!("RTX {}", &captures[1]),
                });
            }
            if let Some(captures) = RX_SERIES.captures(title) {
                return Some(TargetMatch::Gpu {
                    vendor: GpuVendor::Amd,
                    series: format!("RX {}", &captures[1]),
                });
            }
            None
        }
        CategorySlug::Ram => {
            let normalized = normalize_whitespace(title);
            if DDR_GENERATION.is_match(&normalized) || MEMORIA_RAM.is_match(&normalized) {
                Some(TargetMatch::Ram)
            } else {
                None
            }
        }
    }
}
