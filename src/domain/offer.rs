//! Scraped offer entities flowing through the pipeline
//!
//! `RawOffer` is what a connector yields, `NormalizedOffer` adds the derived
//! brand/model fields, and `SyncSummary` reports one reconciliation run.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::category::CategorySlug;

/// Which extraction strategy produced an offer on a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionSource {
    /// Parsed out of the site's embedded full-page-state JSON blob.
    EmbeddedState,
    /// Parsed from a JSON-LD `Product` node.
    JsonLd,
}

impl ExtractionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionSource::EmbeddedState => "embedded-state",
            ExtractionSource::JsonLd => "json-ld",
        }
    }
}

/// CPU sockets the catalog accepts. Anything else is discarded at the
/// connector boundary, not stored with a null socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CpuSocket {
    Am4,
    Am5,
    Lga1700,
    Lga1851,
}

static SOCKET_AM4: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bam4\b").expect("socket regex"));
static SOCKET_AM5: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bam5\b").expect("socket regex"));
static SOCKET_LGA1700: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blga\s*-?\s*1700\b").expect("socket regex"));
static SOCKET_LGA1851: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blga\s*-?\s*1851\b").expect("socket regex"));

impl CpuSocket {
    pub fn as_str(self) -> &'static str {
        match self {
            CpuSocket::Am4 => "AM4",
            CpuSocket::Am5 => "AM5",
            CpuSocket::Lga1700 => "LGA1700",
            CpuSocket::Lga1851 => "LGA1851",
        }
    }

    /// Detect a supported socket token anywhere in a product title.
    pub fn detect(title: &str) -> Option<Self> {
        if SOCKET_AM5.is_match(title) {
            Some(CpuSocket::Am5)
        } else if SOCKET_AM4.is_match(title) {
            Some(CpuSocket::Am4)
        } else if SOCKET_LGA1851.is_match(title) {
            Some(CpuSocket::Lga1851)
        } else if SOCKET_LGA1700.is_match(title) {
            Some(CpuSocket::Lga1700)
        } else {
            None
        }
    }
}

/// GPU chip vendors the catalog accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GpuVendor {
    Nvidia,
    Amd,
}

impl GpuVendor {
    pub fn as_str(self) -> &'static str {
        match self {
            GpuVendor::Nvidia => "NVIDIA",
            GpuVendor::Amd => "AMD",
        }
    }
}

/// Connector-specific provenance attached to an offer.
///
/// Modeled as a tagged union rather than an open map so each connector's
/// fields stay typed; `Raw` is the escape hatch for payload blobs that have
/// no schema of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "connector", rename_all = "kebab-case")]
pub enum OfferMeta {
    KabumCpu {
        source: ExtractionSource,
        socket: CpuSocket,
    },
    KabumGpu {
        source: ExtractionSource,
        vendor: GpuVendor,
        /// Matched series token, e.g. "RTX 4070" or "RX 7600".
        series: Option<String>,
    },
    KabumRam {
        source: ExtractionSource,
    },
    Raw(serde_json::Map<String, serde_json::Value>),
}

impl OfferMeta {
    pub fn source(&self) -> Option<ExtractionSource> {
        match self {
            OfferMeta::KabumCpu { source, .. }
            | OfferMeta::KabumGpu { source, .. }
            | OfferMeta::KabumRam { source } => Some(*source),
            OfferMeta::Raw(_) => None,
        }
    }

    /// Same meta, with the extraction source swapped. Used when the
    /// embedded-state strategy overrides a JSON-LD hit for the same URL.
    pub fn with_source(mut self, new_source: ExtractionSource) -> Self {
        match &mut self {
            OfferMeta::KabumCpu { source, .. }
            | OfferMeta::KabumGpu { source, .. }
            | OfferMeta::KabumRam { source } => *source = new_source,
            OfferMeta::Raw(_) => {}
        }
        self
    }
}

/// One scraped listing, before normalization.
///
/// Invariants: `title` and `url` are non-empty, `price_cents` is a
/// non-negative number of minor currency units. Connectors drop any record
/// that cannot satisfy these instead of emitting a partial offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOffer {
    pub store: String,
    #[serde(rename = "categorySlug")]
    pub category_slug: CategorySlug,
    pub title: String,
    pub url: String,
    #[serde(rename = "priceCents")]
    pub price_cents: i64,
    pub currency: String,
    #[serde(rename = "externalId")]
    pub external_id: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    /// `None` means the source did not state availability either way.
    #[serde(rename = "inStock")]
    pub in_stock: Option<bool>,
    #[serde(rename = "stockText")]
    pub stock_text: Option<String>,
    pub meta: Option<OfferMeta>,
}

/// A raw offer plus the fields derived from its title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedOffer {
    #[serde(flatten)]
    pub raw: RawOffer,
    #[serde(rename = "normalizedName")]
    pub normalized_name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
}

/// Result of reconciling one (store, category) target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub source: String,
    pub category: String,
    #[serde(rename = "totalFetched")]
    pub total_fetched: usize,
    #[serde(rename = "upsertedOffers")]
    pub upserted_offers: usize,
    #[serde(rename = "insertedHistoryPoints")]
    pub inserted_history_points: usize,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
}

/// One category that failed during a multi-category sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub category: String,
    pub error: String,
}

/// Outcome of a multi-category sync. Failed categories never abort the
/// remaining ones; they are collected here instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub summaries: Vec<SyncSummary>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
