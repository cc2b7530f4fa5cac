//! End-to-end spec crawl tests: fixture listing and detail pages through
//! discovery, the durable queue and the spec extractor.

use std::sync::Arc;

use chrono::TimeZone;
use serde_json::Value;

use spectracker::application::{SpecCrawlOptions, SpecCrawler};
use spectracker::domain::QueueStatus;
use spectracker::infrastructure::clock::FixedClock;
use spectracker::infrastructure::config::AppConfig;
use spectracker::infrastructure::http_client::FixtureFetcher;
use spectracker::infrastructure::{DatabaseConnection, QueueRepository};

const LISTING: &str = "https://fixture.test/gpu-specs/";
const RTX_4070_URL: &str = "https://fixture.test/gpu-specs/geforce-rtx-4070.c3924";
const RX_7600_URL: &str = "https://fixture.test/gpu-specs/radeon-rx-7600.c4153";

const LISTING_PAGE: &str = r#"
    <html><body>
      <a href="/gpu-specs/geforce-rtx-4070.c3924">GeForce RTX 4070</a>
      <a href="/gpu-specs/rtx-a2000.c3820">RTX A2000</a>
      <a href="/gpu-specs/geforce-gtx-1080.c2839">GeForce GTX 1080</a>
      <a href="https://elsewhere.test/gpu-specs/radeon-rx-7900-xtx.c3941">offsite</a>
      <a href="?page=2">2</a>
    </body></html>
"#;

const LISTING_PAGE_TWO: &str = r#"
    <html><body>
      <a href="/gpu-specs/radeon-rx-7600.c4153">Radeon RX 7600</a>
    </body></html>
"#;

const RTX_4070_PAGE: &str = r#"
    <html>
    <head><title>GeForce RTX 4070 Specs - Fixture</title></head>
    <body>
      <h1>GeForce RTX 4070</h1>
      <table>
        <tr><th>GPU Name</th><td>AD104</td></tr>
        <tr><th>Architecture</th><td>Ada Lovelace</td></tr>
        <tr><th>Board Power</th><td>200 W</td></tr>
        <tr><th>Memory Size</th><td>12 GB</td></tr>
      </table>
    </body>
    </html>
"#;

// A consumer-looking URL whose page turns out to be a workstation part.
const MISLABELED_URL: &str = "https://fixture.test/gpu-specs/geforce-rtx-4070-station.c9001";
const MISLABELED_PAGE: &str = r#"
    <html><body>
      <h1>RTX A4000</h1>
      <table><tr><th>Board Power</th><td>140 W</td></tr></table>
    </body></html>
"#;

/// Crawl settings with every politeness delay zeroed so tests run fast.
fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.crawler.max_fetch_attempts = 2;
    config.crawler.backoff_base_ms = 0;
    config.crawler.pre_request_delay_ms = (0, 0);
    config.crawler.between_rows_delay_ms = (0, 0);
    config
}

fn crawler(fetcher: FixtureFetcher, queue: QueueRepository) -> SpecCrawler {
    let clock = Arc::new(FixedClock(
        chrono::Utc.with_ymd_and_hms(2025, 11, 2, 10, 0, 0).unwrap(),
    ));
    SpecCrawler::new(Arc::new(fetcher), queue, &test_config(), clock).with_listing_url(LISTING)
}

async fn queue() -> (DatabaseConnection, QueueRepository) {
    let db = DatabaseConnection::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let queue = QueueRepository::new(db.pool().clone());
    (db, queue)
}

fn discovery_fetcher() -> FixtureFetcher {
    FixtureFetcher::new()
        .with_page(LISTING, LISTING_PAGE)
        .with_page("https://fixture.test/gpu-specs/?page=2", LISTING_PAGE_TWO)
}

#[tokio::test]
async fn discovery_enqueues_only_consumer_targets() {
    let (_db, repo) = queue().await;
    let crawler = crawler(discovery_fetcher(), repo.clone());

    let options = SpecCrawlOptions {
        discover_only: true,
        ..SpecCrawlOptions::default()
    };
    crawler.run(&options).await.unwrap();

    // The workstation card, the old GTX generation and the offsite link are
    // all absent; the paginated second listing page was followed.
    let summary = repo.status_summary().await.unwrap();
    assert_eq!(summary.get("pending"), Some(&2));

    let rtx = repo.get_by_url(RTX_4070_URL).await.unwrap().unwrap();
    assert_eq!(rtx.external_gpu_id.as_deref(), Some("3924"));
    assert_eq!(rtx.status, QueueStatus::Pending);
    assert_eq!(rtx.attempt_count, 0);

    let rx = repo.get_by_url(RX_7600_URL).await.unwrap().unwrap();
    assert_eq!(rx.external_gpu_id.as_deref(), Some("4153"));
}

#[tokio::test]
async fn model_filters_limit_discovery() {
    let (_db, repo) = queue().await;
    let crawler = crawler(discovery_fetcher(), repo.clone());

    let options = SpecCrawlOptions {
        models: vec!["rx 7600".to_string()],
        discover_only: true,
        ..SpecCrawlOptions::default()
    };
    crawler.run(&options).await.unwrap();

    assert!(repo.get_by_url(RTX_4070_URL).await.unwrap().is_none());
    assert!(repo.get_by_url(RX_7600_URL).await.unwrap().is_some());
}

#[tokio::test]
async fn processing_writes_one_terminal_status_per_row() {
    let (_db, repo) = queue().await;
    repo.enqueue(RTX_4070_URL, Some("3924"), "2025-11-01T00:00:00.000Z")
        .await
        .unwrap();
    // No fixture page for this one; every fetch attempt 404s.
    repo.enqueue(RX_7600_URL, Some("4153"), "2025-11-01T00:00:01.000Z")
        .await
        .unwrap();

    let fetcher = FixtureFetcher::new().with_page(RTX_4070_URL, RTX_4070_PAGE);
    let crawler = crawler(fetcher, repo.clone());

    let options = SpecCrawlOptions {
        process_only: true,
        ..SpecCrawlOptions::default()
    };
    crawler.run(&options).await.unwrap();

    let success = repo.get_by_url(RTX_4070_URL).await.unwrap().unwrap();
    assert_eq!(success.status, QueueStatus::Success);
    assert_eq!(success.attempt_count, 1);
    assert_eq!(success.gpu_name.as_deref(), Some("GeForce RTX 4070"));
    assert!(success.last_error.is_none());
    assert!(success.completed_at.is_some());

    let payload: Value = serde_json::from_str(success.payload_json.as_deref().unwrap()).unwrap();
    assert_eq!(payload["source"], "techpowerup");
    assert_eq!(payload["allSpecs"]["tgp"], "200 W");
    assert_eq!(payload["specs"]["architecture"], "Ada Lovelace");
    assert_eq!(payload["rawSpecs"]["Board Power"], "200 W");

    let failed = repo.get_by_url(RX_7600_URL).await.unwrap().unwrap();
    assert_eq!(failed.status, QueueStatus::Failed);
    assert_eq!(failed.attempt_count, 1);
    assert!(failed.last_error.as_deref().unwrap().contains("404"));
    assert!(failed.completed_at.is_none());
}

#[tokio::test]
async fn out_of_scope_pages_are_skipped_not_failed() {
    let (_db, repo) = queue().await;
    repo.enqueue(MISLABELED_URL, Some("9001"), "2025-11-01T00:00:00.000Z")
        .await
        .unwrap();

    let fetcher = FixtureFetcher::new().with_page(MISLABELED_URL, MISLABELED_PAGE);
    let crawler = crawler(fetcher, repo.clone());

    let options = SpecCrawlOptions {
        process_only: true,
        ..SpecCrawlOptions::default()
    };
    crawler.run(&options).await.unwrap();

    let row = repo.get_by_url(MISLABELED_URL).await.unwrap().unwrap();
    assert_eq!(row.status, QueueStatus::Skipped);
    assert_eq!(row.attempt_count, 1);
    assert!(row.last_error.is_none());

    let payload: Value = serde_json::from_str(row.payload_json.as_deref().unwrap()).unwrap();
    assert_eq!(payload["name"], "RTX A4000");
    assert!(payload["reason"].as_str().unwrap().contains("non-consumer"));
}

#[tokio::test]
async fn retry_failed_reprocesses_failed_rows() {
    let (_db, repo) = queue().await;
    repo.enqueue(RTX_4070_URL, Some("3924"), "2025-11-01T00:00:00.000Z")
        .await
        .unwrap();

    // First run: the page is unreachable and the row fails.
    let broken = crawler(FixtureFetcher::new(), repo.clone());
    let options = SpecCrawlOptions {
        process_only: true,
        ..SpecCrawlOptions::default()
    };
    broken.run(&options).await.unwrap();
    let row = repo.get_by_url(RTX_4070_URL).await.unwrap().unwrap();
    assert_eq!(row.status, QueueStatus::Failed);
    assert_eq!(row.attempt_count, 1);

    // A plain re-run leaves the failed row alone.
    let idle = crawler(FixtureFetcher::new(), repo.clone());
    idle.run(&options).await.unwrap();
    let row = repo.get_by_url(RTX_4070_URL).await.unwrap().unwrap();
    assert_eq!(row.attempt_count, 1);

    // The retry-failed run picks it up; the page is reachable now.
    let fixed = crawler(
        FixtureFetcher::new().with_page(RTX_4070_URL, RTX_4070_PAGE),
        repo.clone(),
    );
    let retry_options = SpecCrawlOptions {
        process_only: true,
        retry_failed: true,
        ..SpecCrawlOptions::default()
    };
    fixed.run(&retry_options).await.unwrap();

    let row = repo.get_by_url(RTX_4070_URL).await.unwrap().unwrap();
    assert_eq!(row.status, QueueStatus::Success);
    assert_eq!(row.attempt_count, 2);
    assert!(row.last_error.is_none());
}
