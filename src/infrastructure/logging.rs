//! Logging infrastructure
//!
//! Console subscriber with env-filter support. `RUST_LOG` overrides the
//! default filter.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "spectracker=info,sqlx=warn,reqwest=info,hyper=warn";

/// Initialize the global tracing subscriber. Safe to call more than once;
/// later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
