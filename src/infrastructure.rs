//! Infrastructure layer: HTTP, parsing, persistence, configuration, logging
//!
//! Everything that talks to the network or the database lives here, behind
//! small seams (`PageFetcher`, `Clock`, repository structs) so the
//! application layer can be driven by fixtures in tests.

pub mod category_repository;
pub mod clock;
pub mod config;
pub mod connectors;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod offer_repository;
pub mod parsing;
pub mod queue_repository;

pub use category_repository::CategoryRepository;
pub use clock::{Clock, SystemClock};
pub use config::AppConfig;
pub use connectors::OfferConnector;
pub use database_connection::DatabaseConnection;
pub use http_client::{FetchError, FixtureFetcher, HttpClient, HttpClientConfig, PageFetcher};
pub use logging::init_logging;
pub use offer_repository::OfferRepository;
pub use queue_repository::QueueRepository;
