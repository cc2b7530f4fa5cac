//! Periodic ingestion scheduler
//!
//! An explicit component owning its cancellation token and task handle, so
//! the lifecycle is start/stop instead of a fire-and-forget timer in
//! process-wide state. Tests drive it with short intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::infrastructure::connectors::OfferConnector;

use super::sync_engine::SyncEngine;

pub struct IngestScheduler {
    interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl IngestScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Token observed by the scheduler loop; callers may cancel it directly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the loop: one sync immediately, then one per interval until
    /// stopped. Starting twice is a no-op.
    pub fn start(
        &mut self,
        engine: Arc<SyncEngine>,
        connectors: Arc<Vec<Box<dyn OfferConnector>>>,
    ) {
        if self.handle.is_some() {
            return;
        }

        let cancel = self.cancel.clone();
        let interval = self.interval;
        info!("ingestion scheduler enabled, interval {interval:?}");

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately, giving the run-now-then-
            // repeat behavior.
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("ingestion scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = engine.sync_all(&connectors).await;
                        if report.is_success() {
                            info!("scheduled sync completed: {} categories", report.summaries.len());
                        } else {
                            error!(
                                "scheduled sync finished with {} failure(s) out of {} categories",
                                report.failures.len(),
                                report.failures.len() + report.summaries.len()
                            );
                        }
                    }
                }
            }
        }));
    }

    /// Cancel the loop and wait for the in-flight iteration to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for IngestScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
