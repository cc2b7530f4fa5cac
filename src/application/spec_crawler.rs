//! Spec-catalog crawler
//!
//! Two independently toggleable phases over the durable queue:
//!
//! * **Discovery** walks the listing site breadth-first following only
//!   same-site pagination links, and enqueues every consumer-target
//!   detail-page URL it sees (insert-or-update by unique url).
//! * **Processing** pulls a batch of pending rows (stalest first), fetches
//!   each with bounded retry/backoff, extracts the spec payload and writes
//!   exactly one terminal status per row. Rows are independent; a failure
//!   never halts the batch.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::domain::gpu_spec::SkippedSpecPayload;
use crate::infrastructure::clock::Clock;
use crate::infrastructure::config::{defaults, techpowerup, AppConfig, CrawlerConfig};
use crate::infrastructure::http_client::{FetchError, PageFetcher};
use crate::infrastructure::parsing::gpu_page::{
    is_consumer_target_text, is_consumer_target_url, parse_gpu_spec_page,
};
use crate::infrastructure::queue_repository::QueueRepository;
use crate::utils::normalize_model_query;

static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("href regex"));
static GPU_DETAIL_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/gpu-specs/[a-z0-9-]+\.c\d+/?$").expect("detail path regex"));
static PAGINATION_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&](?:page|pg)=\d+").expect("pagination regex"));
static GPU_ID_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.c(\d+)/?$").expect("gpu id regex"));

/// Operator-facing options for one crawl run.
#[derive(Debug, Clone)]
pub struct SpecCrawlOptions {
    /// Optional model filters ("4070", "rx 7600"); empty keeps everything.
    pub models: Vec<String>,
    /// Max queue rows processed this run.
    pub limit: i64,
    /// Max listing pages visited during discovery.
    pub max_pages: u32,
    /// Include `failed` rows in the processing batch.
    pub retry_failed: bool,
    pub discover_only: bool,
    pub process_only: bool,
}

impl Default for SpecCrawlOptions {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            limit: defaults::CRAWLER_BATCH_LIMIT,
            max_pages: defaults::CRAWLER_MAX_PAGES,
            retry_failed: false,
            discover_only: false,
            process_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct SpecCrawler {
    fetcher: Arc<dyn PageFetcher>,
    queue: QueueRepository,
    config: CrawlerConfig,
    base_timeout: Duration,
    listing_url: String,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl SpecCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        queue: QueueRepository,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            queue,
            config: config.crawler.clone(),
            base_timeout: Duration::from_secs(config.http.timeout_seconds),
            listing_url: techpowerup::LISTING_URL.to_string(),
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Crawl a different listing root (fixture sites in tests).
    pub fn with_listing_url(mut self, listing_url: impl Into<String>) -> Self {
        self.listing_url = listing_url.into();
        self
    }

    /// Attach a caller-owned cancellation token; the crawler checks it
    /// between pages and between queue rows.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one crawl according to the options.
    pub async fn run(&self, options: &SpecCrawlOptions) -> Result<()> {
        if !options.process_only {
            info!("starting spec discovery from {}", self.listing_url);
            let urls = self.discover(options).await?;
            info!("discovered {} target consumer GPU urls", urls.len());
            let enqueued = self.enqueue_urls(&urls).await?;
            info!("queue upsert complete ({enqueued})");
        }

        if !options.discover_only {
            let stats = self.process_queue(options).await?;
            info!(
                "queue processing done: success={} failed={} skipped={}",
                stats.success, stats.failed, stats.skipped
            );
        }

        let summary = self.queue.status_summary().await?;
        info!("queue summary: {}", serde_json::to_string(&summary)?);
        Ok(())
    }

    /// Breadth-first walk of listing pages, bounded by `max_pages` visits.
    /// The root page is required; later listing pages degrade gracefully.
    async fn discover(&self, options: &SpecCrawlOptions) -> Result<Vec<String>> {
        let root = Url::parse(&self.listing_url)
            .with_context(|| format!("invalid listing url {}", self.listing_url))?;
        let site_host = root.host_str().map(str::to_string);

        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = VecDeque::from([self.listing_url.clone()]);
        let mut gpu_urls: BTreeSet<String> = BTreeSet::new();

        while let Some(page_url) = frontier.pop_front() {
            if visited.len() >= options.max_pages as usize || self.cancel.is_cancelled() {
                break;
            }
            if !visited.insert(page_url.clone()) {
                continue;
            }
            info!("listing fetch: {page_url}");

            let is_root = visited.len() == 1;
            let html = match self.fetch_with_retries(&page_url, 3).await {
                Ok(html) => html,
                Err(error) if is_root => {
                    return Err(error).context("discovery root page failed");
                }
                Err(error) => {
                    warn!("listing page {page_url} failed, continuing: {error}");
                    continue;
                }
            };

            for href in HREF.captures_iter(&html) {
                let Ok(absolute) = root.join(&href[1]) else {
                    continue;
                };
                if absolute.host_str().map(str::to_string) != site_host {
                    continue;
                }
                let absolute = absolute.to_string();

                if GPU_DETAIL_PATH.is_match(&absolute) {
                    let detail_url = absolute.trim_end_matches('/').to_string();
                    if is_consumer_target_url(&detail_url)
                        && keep_by_model(&detail_url, &options.models)
                    {
                        gpu_urls.insert(detail_url);
                    }
                } else if PAGINATION_QUERY.is_match(&absolute)
                    && absolute.contains("gpu-specs")
                    && !visited.contains(&absolute)
                {
                    frontier.push_back(absolute);
                }
            }
        }

        Ok(gpu_urls.into_iter().collect())
    }

    async fn enqueue_urls(&self, urls: &[String]) -> Result<usize> {
        let mut upserted = 0usize;
        for url in urls {
            let gpu_id = parse_gpu_id_from_url(url);
            let now = self.clock.now_iso();
            self.queue.enqueue(url, gpu_id.as_deref(), &now).await?;
            upserted += 1;
        }
        Ok(upserted)
    }

    /// Process up to `limit` rows. Each row gets exactly one terminal
    /// status write; errors are recorded, not propagated.
    async fn process_queue(&self, options: &SpecCrawlOptions) -> Result<ProcessStats> {
        let rows = self
            .queue
            .load_batch(options.retry_failed, options.limit)
            .await?;
        info!("processing {} rows from queue", rows.len());

        let mut stats = ProcessStats::default();
        let total = rows.len();

        for (index, row) in rows.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("crawl cancelled after {index} rows");
                break;
            }
            info!("gpu fetch ({}/{total}): {}", index + 1, row.url);

            match self
                .fetch_with_retries(&row.url, self.config.max_fetch_attempts)
                .await
            {
                Ok(html) => {
                    let scraped_at = self.clock.now_iso();
                    let payload =
                        parse_gpu_spec_page(&html, &row.url, row.gpu_name.as_deref(), &scraped_at);

                    let candidate_name = if payload.name.is_empty() {
                        payload
                            .all_specs
                            .get("gpu_name")
                            .cloned()
                            .unwrap_or_default()
                    } else {
                        payload.name.clone()
                    };

                    let now = self.clock.now_iso();
                    if !is_consumer_target_text(&candidate_name) {
                        let skipped = SkippedSpecPayload {
                            reason: "non-consumer-or-not-target-series".to_string(),
                            name: Some(payload.name.clone()),
                            url: row.url.clone(),
                            scraped_at,
                        };
                        self.queue
                            .mark_skipped(
                                &row.id,
                                Some(&payload.name),
                                &serde_json::to_string(&skipped)?,
                                &now,
                            )
                            .await?;
                        stats.skipped += 1;
                        continue;
                    }

                    self.queue
                        .mark_success(
                            &row.id,
                            Some(&payload.name),
                            &serde_json::to_string(&payload)?,
                            &now,
                        )
                        .await?;
                    stats.success += 1;
                }
                Err(error) => {
                    let now = self.clock.now_iso();
                    self.queue
                        .mark_failed(&row.id, &error.to_string(), &now)
                        .await?;
                    stats.failed += 1;
                }
            }

            self.sleep_range(self.config.between_rows_delay_ms).await;
        }

        Ok(stats)
    }

    /// Retry with exponential backoff plus jitter, and a short random
    /// politeness delay before every attempt. The request timeout inflates
    /// slightly per attempt.
    async fn fetch_with_retries(
        &self,
        url: &str,
        max_attempts: u32,
    ) -> Result<String, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=max_attempts {
            self.sleep_range(self.config.pre_request_delay_ms).await;

            let timeout = self.base_timeout
                + Duration::from_secs(self.config.timeout_step_seconds * u64::from(attempt));
            match self.fetcher.fetch(url, timeout).await {
                Ok(body) => return Ok(body),
                Err(error) => {
                    if attempt < max_attempts {
                        let backoff = self.config.backoff_base_ms * 2u64.pow(attempt - 1)
                            + jitter_ms(self.config.backoff_base_ms);
                        warn!("retry {attempt}/{max_attempts} for {url} in {backoff}ms ({error})");
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_error: last_error
                .map(|error| error.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    async fn sleep_range(&self, range: (u64, u64)) {
        let (min, max) = range;
        if max == 0 {
            return;
        }
        let millis = if min >= max { min } else { fastrand::u64(min..=max) };
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

/// Random jitter added to a backoff step; zero base means no jitter so
/// tests stay fast and deterministic.
fn jitter_ms(base_ms: u64) -> u64 {
    if base_ms == 0 {
        0
    } else {
        fastrand::u64(100..=800)
    }
}

/// The numeric id embedded in a detail URL ("....c3924" -> "3924").
fn parse_gpu_id_from_url(url: &str) -> Option<String> {
    GPU_ID_SUFFIX
        .captures(url)
        .map(|captures| captures[1].to_string())
}

/// Model filters match against the alphanumeric-normalized url or name.
fn keep_by_model(url_or_name: &str, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let haystack = normalize_model_query(url_or_name);
    filters
        .iter()
        .any(|filter| haystack.contains(&normalize_model_query(filter)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_id_from_url() {
        assert_eq!(
            parse_gpu_id_from_url("https://www.techpowerup.com/gpu-specs/geforce-rtx-4070.c3924"),
            Some("3924".to_string())
        );
        assert_eq!(
            parse_gpu_id_from_url("https://www.techpowerup.com/gpu-specs/geforce-rtx-4070.c3924/"),
            Some("3924".to_string())
        );
        assert_eq!(parse_gpu_id_from_url("https://www.techpowerup.com/gpu-specs/"), None);
    }

    #[test]
    fn model_filters_are_format_insensitive() {
        let filters = vec!["RTX 4070".to_string()];
        assert!(keep_by_model(
            "https://www.techpowerup.com/gpu-specs/geforce-rtx-4070.c3924",
            &filters
        ));
        assert!(!keep_by_model(
            "https://www.techpowerup.com/gpu-specs/radeon-rx-7600.c4153",
            &filters
        ));
        assert!(keep_by_model("anything", &[]));
    }
}
