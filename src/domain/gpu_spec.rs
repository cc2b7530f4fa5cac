//! Parsed GPU spec-page payload
//!
//! The payload keeps three views of the same extraction: a curated subset of
//! well-known fields for stable downstream consumption, the full
//! alias-normalized map, and the raw table exactly as scraped. It is stored
//! as opaque JSON in the queue row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Source tag recorded on every payload from the TechPowerUp crawler.
pub const TECHPOWERUP_SOURCE: &str = "techpowerup";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuSpecPayload {
    pub source: String,
    pub url: String,
    pub name: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: String,
    /// Curated subset of well-known fields, present only when extracted.
    pub specs: BTreeMap<String, String>,
    /// The full alias-normalized key→value map.
    #[serde(rename = "allSpecs")]
    pub all_specs: BTreeMap<String, String>,
    /// The spec table exactly as it appeared on the page.
    #[serde(rename = "rawSpecs")]
    pub raw_specs: BTreeMap<String, String>,
}

/// Payload recorded for a page that fetched fine but is out of catalog scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSpecPayload {
    pub reason: String,
    pub name: Option<String>,
    pub url: String,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_json_shape_is_stable() {
        let payload = GpuSpecPayload {
            source: TECHPOWERUP_SOURCE.to_string(),
            url: "https://www.techpowerup.com/gpu-specs/geforce-rtx-4070.c3924".to_string(),
            name: "GeForce RTX 4070".to_string(),
            image_url: None,
            scraped_at: "2025-11-02T10:00:00.000Z".to_string(),
            specs: BTreeMap::from([("tgp".to_string(), "200 W".to_string())]),
            all_specs: BTreeMap::from([("tgp".to_string(), "200 W".to_string())]),
            raw_specs: BTreeMap::from([("TDP".to_string(), "200 W".to_string())]),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["source"], "techpowerup");
        assert_eq!(json["allSpecs"]["tgp"], "200 W");
        assert_eq!(json["rawSpecs"]["TDP"], "200 W");
    }
}
