//! Offer reconciliation engine
//!
//! Pulls raw offers from a connector, normalizes them and converges the
//! store toward the scraped state: deterministic-id upserts plus a price
//! history point whenever the (price, currency, stock) snapshot changed.
//! Running twice against unchanged source data is a no-op for history.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::domain::normalize::normalize_offer;
use crate::domain::offer::{SyncFailure, SyncReport, SyncSummary};
use crate::infrastructure::category_repository::CategoryRepository;
use crate::infrastructure::clock::Clock;
use crate::infrastructure::connectors::OfferConnector;
use crate::infrastructure::offer_repository::{offer_id, OfferRepository, PricePoint};

pub struct SyncEngine {
    categories: CategoryRepository,
    offers: OfferRepository,
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            categories: CategoryRepository::new(pool.clone()),
            offers: OfferRepository::new(pool),
            clock,
        }
    }

    /// Reconcile one (store, category) target and report what happened.
    pub async fn sync_category(&self, connector: &dyn OfferConnector) -> Result<SyncSummary> {
        let started_at = self.clock.now_iso();
        let store = connector.store();
        let category_slug = connector.category();

        let category = self.categories.ensure(category_slug).await?;

        let raw_offers = connector
            .fetch_offers()
            .await
            .with_context(|| format!("{store}/{category_slug} connector fetch failed"))?;

        let mut upserted_offers = 0usize;
        let mut inserted_history_points = 0usize;

        for raw in &raw_offers {
            let normalized = normalize_offer(category_slug, raw);
            let now = self.clock.now_iso();
            let id = offer_id(&raw.store, raw.external_id.as_deref(), &raw.url);

            self.offers
                .upsert_offer(&id, &category.id, &normalized, &now)
                .await
                .with_context(|| format!("failed to upsert offer {id}"))?;
            upserted_offers += 1;

            // The upsert has completed, so "latest" below cannot be a stale
            // read of this run's own write.
            let current = PricePoint {
                price: raw.price_cents,
                currency: raw.currency.clone(),
                in_stock: raw.in_stock.unwrap_or(true),
            };
            let latest = self.offers.latest_history_point(&id).await?;
            if latest.as_ref() != Some(&current) {
                self.offers
                    .insert_history_point(&id, &current, &now)
                    .await
                    .with_context(|| format!("failed to append history for offer {id}"))?;
                inserted_history_points += 1;
            }
        }

        let finished_at = self.clock.now_iso();
        let summary = SyncSummary {
            source: store.to_string(),
            category: category_slug.as_str().to_string(),
            total_fetched: raw_offers.len(),
            upserted_offers,
            inserted_history_points,
            started_at,
            finished_at,
        };
        info!(
            "✅ sync {store}/{category_slug}: fetched={} upserted={} history={}",
            summary.total_fetched, summary.upserted_offers, summary.inserted_history_points
        );
        Ok(summary)
    }

    /// Run every connector sequentially. A failing category is recorded and
    /// the remaining categories still run.
    pub async fn sync_all(&self, connectors: &[Box<dyn OfferConnector>]) -> SyncReport {
        let mut report = SyncReport::default();

        for connector in connectors {
            match self.sync_category(connector.as_ref()).await {
                Ok(summary) => report.summaries.push(summary),
                Err(cause) => {
                    let category = connector.category().as_str().to_string();
                    error!("sync {}/{category} failed: {cause:#}", connector.store());
                    report.failures.push(SyncFailure {
                        category,
                        error: format!("{cause:#}"),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::domain::category::CategorySlug;
    use crate::domain::offer::RawOffer;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::http_client::FetchError;

    /// Connector stub yielding a fixed offer list.
    struct StaticConnector {
        category: CategorySlug,
        offers: Vec<RawOffer>,
        fail: bool,
    }

    #[async_trait]
    impl OfferConnector for StaticConnector {
        fn store(&self) -> &'static str {
            "kabum"
        }

        fn category(&self) -> CategorySlug {
            self.category
        }

        async fn fetch_offers(&self) -> Result<Vec<RawOffer>, FetchError> {
            if self.fail {
                return Err(FetchError::status(503, "https://fixture.test/page1"));
            }
            Ok(self.offers.clone())
        }
    }

    fn cpu_offer(price_cents: i64) -> RawOffer {
        RawOffer {
            store: "kabum".to_string(),
            category_slug: CategorySlug::Cpu,
            title: "Processador AMD Ryzen 5 8600G AM5".to_string(),
            url: "https://www.kabum.com.br/produto/512345/cpu".to_string(),
            price_cents,
            currency: "BRL".to_string(),
            external_id: Some("512345".to_string()),
            image_url: None,
            in_stock: Some(true),
            stock_text: None,
            meta: None,
        }
    }

    async fn engine() -> Result<(DatabaseConnection, SyncEngine)> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        let clock = Arc::new(FixedClock(
            chrono::Utc.with_ymd_and_hms(2025, 11, 2, 10, 0, 0).unwrap(),
        ));
        let engine = SyncEngine::new(db.pool().clone(), clock);
        Ok((db, engine))
    }

    #[tokio::test]
    async fn second_run_with_unchanged_data_adds_no_history() -> Result<()> {
        let (_db, engine) = engine().await?;
        let connector = StaticConnector {
            category: CategorySlug::Cpu,
            offers: vec![cpu_offer(119_900)],
            fail: false,
        };

        let first = engine.sync_category(&connector).await?;
        assert_eq!(first.upserted_offers, 1);
        assert_eq!(first.inserted_history_points, 1);

        let second = engine.sync_category(&connector).await?;
        assert_eq!(second.upserted_offers, first.upserted_offers);
        assert_eq!(second.inserted_history_points, 0);
        Ok(())
    }

    #[tokio::test]
    async fn price_change_appends_exactly_one_point() -> Result<()> {
        let (db, engine) = engine().await?;
        let before = StaticConnector {
            category: CategorySlug::Cpu,
            offers: vec![cpu_offer(119_900)],
            fail: false,
        };
        let after = StaticConnector {
            category: CategorySlug::Cpu,
            offers: vec![cpu_offer(109_900)],
            fail: false,
        };

        engine.sync_category(&before).await?;
        let summary = engine.sync_category(&after).await?;
        assert_eq!(summary.inserted_history_points, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn failing_category_does_not_abort_the_rest() -> Result<()> {
        let (_db, engine) = engine().await?;
        let connectors: Vec<Box<dyn OfferConnector>> = vec![
            Box::new(StaticConnector {
                category: CategorySlug::Cpu,
                offers: vec![],
                fail: true,
            }),
            Box::new(StaticConnector {
                category: CategorySlug::Ram,
                offers: vec![RawOffer {
                    category_slug: CategorySlug::Ram,
                    title: "Memória RAM Corsair 16GB DDR5".to_string(),
                    url: "https://www.kabum.com.br/produto/600/ram".to_string(),
                    external_id: Some("600".to_string()),
                    ..cpu_offer(39_990)
                }],
                fail: false,
            }),
        ];

        let report = engine.sync_all(&connectors).await;
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].category, "cpu");
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].category, "ram");
        Ok(())
    }
}
