//! SpecTracker ingestion pipeline
//!
//! Crawls a fixed set of hardware e-commerce and spec-database sites,
//! normalizes listings into a relational store and keeps a change-detected
//! price history. The crate is organized in three layers:
//!
//! * `domain` — entities and pure logic (offers, categories, normalization,
//!   queue state machine)
//! * `infrastructure` — HTTP, extraction utilities, sqlite repositories,
//!   configuration and logging
//! * `application` — the sync engine, the spec crawler and the scheduler

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod utils;

pub use application::{IngestScheduler, SpecCrawlOptions, SpecCrawler, SyncEngine};
pub use domain::{
    Category, CategorySlug, GpuSpecPayload, NormalizedOffer, QueueStatus, RawOffer, SpecQueueRow,
    SyncReport, SyncSummary,
};
pub use infrastructure::{
    AppConfig, DatabaseConnection, FetchError, HttpClient, HttpClientConfig, OfferConnector,
    PageFetcher, QueueRepository,
};
