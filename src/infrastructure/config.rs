//! Configuration
//!
//! A flat serde-backed config with a `defaults` constants module and one
//! constants module per source site. The file format is plain JSON; a
//! missing file means defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub sync: SyncConfig,
    pub crawler: CrawlerConfig,
}

/// Outbound HTTP behavior shared by connectors and the spec crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            accept: defaults::ACCEPT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

/// Offer reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Safety cap on listing pages walked per connector run.
    pub max_pages: u32,
    /// Listing page size hint; an under-full page signals the last page
    /// when the site exposes no total count.
    pub page_size_hint: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::CONNECTOR_MAX_PAGES,
            page_size_hint: defaults::CONNECTOR_PAGE_SIZE,
        }
    }
}

/// Spec-crawl queue processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub max_fetch_attempts: u32,
    pub backoff_base_ms: u64,
    /// Random pre-request delay range, milliseconds.
    pub pre_request_delay_ms: (u64, u64),
    /// Random delay between queue rows, milliseconds.
    pub between_rows_delay_ms: (u64, u64),
    /// Added to the request timeout on each retry attempt.
    pub timeout_step_seconds: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_fetch_attempts: defaults::CRAWLER_MAX_ATTEMPTS,
            backoff_base_ms: defaults::CRAWLER_BACKOFF_BASE_MS,
            pre_request_delay_ms: defaults::CRAWLER_PRE_REQUEST_DELAY_MS,
            between_rows_delay_ms: defaults::CRAWLER_BETWEEN_ROWS_DELAY_MS,
            timeout_step_seconds: defaults::CRAWLER_TIMEOUT_STEP_SECONDS,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {path:?}"))?;
        info!("loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write the configuration back as pretty JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create config directory {parent:?}"))?;
        }
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("failed to write config file {path:?}"))?;
        Ok(())
    }
}

/// Kabum store URLs and listing parameters.
pub mod kabum {
    /// Store identifier recorded on every offer.
    pub const STORE: &str = "kabum";

    pub const BASE_URL: &str = "https://www.kabum.com.br";

    /// Category listing URLs, page 1.
    pub const CPU_URL: &str = "https://www.kabum.com.br/hardware/processadores";
    pub const GPU_URL: &str = "https://www.kabum.com.br/hardware/placa-de-video-vga";
    pub const RAM_URL: &str = "https://www.kabum.com.br/hardware/memoria-ram";

    /// Build the listing URL for a given 1-based page.
    pub fn listing_page_url(base: &str, page: u32, page_size: usize) -> String {
        if page <= 1 {
            format!("{base}?page_size={page_size}")
        } else {
            format!("{base}?page_number={page}&page_size={page_size}")
        }
    }

    /// Canonical product URL for an embedded-state product code.
    pub fn product_url(code: &str, friendly_name: &str) -> String {
        format!("{BASE_URL}/produto/{code}/{friendly_name}")
    }
}

/// TechPowerUp spec database URLs.
pub mod techpowerup {
    pub const BASE_URL: &str = "https://www.techpowerup.com";

    /// GPU spec listing root, the discovery crawl entry point.
    pub const LISTING_URL: &str = "https://www.techpowerup.com/gpu-specs/";
}

/// Default configuration values.
pub mod defaults {
    /// Browser-like user agent; the store rejects obvious bots.
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome Safari";

    pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 25;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    /// Hard cap on listing pages per connector fetch.
    pub const CONNECTOR_MAX_PAGES: u32 = 20;

    /// Products per listing page requested from the store.
    pub const CONNECTOR_PAGE_SIZE: usize = 20;

    /// Spec crawler retry budget per queue row.
    pub const CRAWLER_MAX_ATTEMPTS: u32 = 4;

    /// Exponential backoff base; doubles per attempt, plus jitter.
    pub const CRAWLER_BACKOFF_BASE_MS: u64 = 700;

    pub const CRAWLER_PRE_REQUEST_DELAY_MS: (u64, u64) = (300, 1000);

    pub const CRAWLER_BETWEEN_ROWS_DELAY_MS: (u64, u64) = (450, 1300);

    pub const CRAWLER_TIMEOUT_STEP_SECONDS: u64 = 3;

    /// Discovery page-visit cap and processing batch size.
    pub const CRAWLER_MAX_PAGES: u32 = 80;
    pub const CRAWLER_BATCH_LIMIT: i64 = 80;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/spectracker.json"))
            .await
            .unwrap();
        assert_eq!(config.http.timeout_seconds, defaults::REQUEST_TIMEOUT_SECONDS);
        assert_eq!(config.sync.max_pages, defaults::CONNECTOR_MAX_PAGES);
    }

    #[tokio::test]
    async fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.sync.max_pages = 3;
        config.save(&path).await.unwrap();

        let loaded = AppConfig::load(&path).await.unwrap();
        assert_eq!(loaded.sync.max_pages, 3);
        assert_eq!(loaded.http.user_agent, config.http.user_agent);
    }

    #[test]
    fn kabum_page_urls() {
        assert_eq!(
            kabum::listing_page_url(kabum::CPU_URL, 1, 20),
            "https://www.kabum.com.br/hardware/processadores?page_size=20"
        );
        assert_eq!(
            kabum::listing_page_url(kabum::CPU_URL, 3, 20),
            "https://www.kabum.com.br/hardware/processadores?page_number=3&page_size=20"
        );
    }
}
