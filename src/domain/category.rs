//! Product categories tracked by the catalog
//!
//! Category rows are seeded lazily by the sync engine with deterministic ids
//! so repeated runs against a fresh database converge on the same rows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed set of component categories the pipeline ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySlug {
    Cpu,
    Gpu,
    Ram,
}

impl CategorySlug {
    /// All categories, in catalog sort order.
    pub const ALL: [CategorySlug; 3] = [CategorySlug::Cpu, CategorySlug::Gpu, CategorySlug::Ram];

    pub fn as_str(self) -> &'static str {
        match self {
            CategorySlug::Cpu => "cpu",
            CategorySlug::Gpu => "gpu",
            CategorySlug::Ram => "ram",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CategorySlug::Cpu => "CPU",
            CategorySlug::Gpu => "GPU",
            CategorySlug::Ram => "RAM",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            CategorySlug::Cpu => "lucide:cpu",
            CategorySlug::Gpu => "lucide:monitor",
            CategorySlug::Ram => "lucide:memory-stick",
        }
    }

    pub fn sort_order(self) -> i64 {
        match self {
            CategorySlug::Cpu => 1,
            CategorySlug::Gpu => 2,
            CategorySlug::Ram => 4,
        }
    }

    /// Deterministic primary key for the category row.
    pub fn category_id(self) -> String {
        format!("cat-{}", self.as_str())
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Some(CategorySlug::Cpu),
            "gpu" => Some(CategorySlug::Gpu),
            "ram" => Some(CategorySlug::Ram),
            _ => None,
        }
    }
}

impl fmt::Display for CategorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted category row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: i64,
}

impl Category {
    /// Build the canonical row for a slug, as seeded on first sync.
    pub fn seeded(slug: CategorySlug) -> Self {
        Self {
            id: slug.category_id(),
            name: slug.display_name().to_string(),
            slug: slug.as_str().to_string(),
            icon: Some(slug.icon().to_string()),
            sort_order: slug.sort_order(),
        }
    }
}
