//! Application layer: orchestration of connectors, parsing and persistence

pub mod scheduler;
pub mod spec_crawler;
pub mod sync_engine;

pub use scheduler::IngestScheduler;
pub use spec_crawler::{SpecCrawlOptions, SpecCrawler};
pub use sync_engine::SyncEngine;
