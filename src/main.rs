//! SpecTracker operator CLI
//!
//! Thin wrapper over the library: offer syncs, spec crawls, queue
//! introspection and the periodic scheduler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use spectracker::application::{IngestScheduler, SpecCrawlOptions, SpecCrawler, SyncEngine};
use spectracker::domain::CategorySlug;
use spectracker::infrastructure::clock::SystemClock;
use spectracker::infrastructure::connectors::kabum::KabumConnector;
use spectracker::infrastructure::connectors::OfferConnector;
use spectracker::infrastructure::http_client::HttpClientConfig;
use spectracker::infrastructure::{
    init_logging, AppConfig, DatabaseConnection, HttpClient, QueueRepository,
};

#[derive(Parser)]
#[command(name = "spectracker", version, about = "Hardware price/spec catalog ingestion")]
struct Cli {
    /// SQLite database path.
    #[arg(long, global = true, default_value = "data/spectracker.db", env = "SPECTRACKER_DB")]
    database: String,

    /// Optional JSON config file; defaults apply when absent.
    #[arg(long, global = true, env = "SPECTRACKER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch store offers and reconcile them into the catalog.
    Sync {
        /// Comma-separated category slugs (cpu,gpu,ram). Default: all.
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
    },
    /// Discover and process spec-detail pages through the durable queue.
    SpecCrawl {
        /// Only keep models matching these filters (e.g. "4070,rx 7600").
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        /// Max queue rows to process this run.
        #[arg(long, default_value_t = 80)]
        limit: i64,
        /// Max listing pages visited during discovery.
        #[arg(long, default_value_t = 80)]
        max_pages: u32,
        /// Also pick up previously failed rows.
        #[arg(long)]
        retry_failed: bool,
        /// Discovery phase only; leave the queue for a later run.
        #[arg(long, conflicts_with = "process_only")]
        discover_only: bool,
        /// Processing phase only; skip discovery.
        #[arg(long)]
        process_only: bool,
    },
    /// Print queue row counts per status.
    QueueStatus,
    /// Run the offer sync on an interval until interrupted.
    Schedule {
        #[arg(long, default_value_t = 120)]
        interval_minutes: u64,
    },
}

fn parse_categories(raw: &[String]) -> Result<Vec<CategorySlug>> {
    if raw.is_empty() {
        return Ok(CategorySlug::ALL.to_vec());
    }
    raw.iter()
        .map(|value| {
            CategorySlug::parse(value)
                .ok_or_else(|| anyhow::anyhow!("unknown category '{value}' (expected cpu, gpu or ram)"))
        })
        .collect()
}

fn build_connectors(
    categories: &[CategorySlug],
    fetcher: Arc<HttpClient>,
    config: &AppConfig,
) -> Vec<Box<dyn OfferConnector>> {
    categories
        .iter()
        .map(|category| -> Box<dyn OfferConnector> {
            match category {
                CategorySlug::Cpu => Box::new(KabumConnector::cpu(fetcher.clone(), config)),
                CategorySlug::Gpu => Box::new(KabumConnector::gpu(fetcher.clone(), config)),
                CategorySlug::Ram => Box::new(KabumConnector::ram(fetcher.clone(), config)),
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).await?,
        None => AppConfig::default(),
    };

    let db = DatabaseConnection::new(&cli.database).await?;
    db.migrate().await?;

    let http = Arc::new(HttpClient::new(HttpClientConfig::from(&config.http))?);
    let clock = Arc::new(SystemClock);

    match cli.command {
        Command::Sync { categories } => {
            let categories = parse_categories(&categories)?;
            let connectors = build_connectors(&categories, http, &config);
            let engine = SyncEngine::new(db.pool().clone(), clock);

            let report = engine.sync_all(&connectors).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_success() {
                bail!("{} categor(ies) failed to sync", report.failures.len());
            }
        }
        Command::SpecCrawl {
            models,
            limit,
            max_pages,
            retry_failed,
            discover_only,
            process_only,
        } => {
            let crawler =
                SpecCrawler::new(http, QueueRepository::new(db.pool().clone()), &config, clock);
            let options = SpecCrawlOptions {
                models,
                limit,
                max_pages,
                retry_failed,
                discover_only,
                process_only,
            };
            crawler.run(&options).await?;
        }
        Command::QueueStatus => {
            let queue = QueueRepository::new(db.pool().clone());
            let summary = queue.status_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Schedule { interval_minutes } => {
            let connectors = Arc::new(build_connectors(&CategorySlug::ALL, http, &config));
            let engine = Arc::new(SyncEngine::new(db.pool().clone(), clock));

            let mut scheduler =
                IngestScheduler::new(Duration::from_secs(interval_minutes * 60));
            scheduler.start(engine, connectors);

            tokio::signal::ctrl_c().await?;
            warn!("interrupt received, stopping scheduler");
            scheduler.stop().await;
        }
    }

    Ok(())
}
