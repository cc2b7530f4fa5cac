//! Source offer and price history persistence
//!
//! Offers are keyed by a deterministic id derived from (store, external id or
//! url hash), so a re-run updates rows in place. History is append-only and
//! written by the sync engine only when the snapshot actually changed.

use std::sync::Arc;

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::offer::NormalizedOffer;
use crate::utils::short_hash;

/// Deterministic persisted identity for an offer.
pub fn offer_id(store: &str, external_id: Option<&str>, url: &str) -> String {
    let key = match external_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => short_hash(url),
    };
    format!("offer-{store}-{key}")
}

/// Persisted snapshot of one offer.
#[derive(Debug, Clone)]
pub struct SourceOffer {
    pub id: String,
    pub store: String,
    pub external_id: Option<String>,
    pub category_id: String,
    pub component_id: Option<String>,
    pub title: String,
    pub normalized_name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub price: i64,
    pub currency: String,
    pub in_stock: bool,
    pub stock_text: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub meta_json: Option<String>,
    pub last_seen_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The fields compared for history change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePoint {
    pub price: i64,
    pub currency: String,
    pub in_stock: bool,
}

#[derive(Clone)]
pub struct OfferRepository {
    pool: Arc<SqlitePool>,
}

impl OfferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Insert or update the offer snapshot. An insert sets every field; a
    /// conflict on the deterministic id updates every mutable field plus
    /// `updated_at`/`last_seen_at` while preserving `id` and `created_at`.
    pub async fn upsert_offer(
        &self,
        offer_id: &str,
        category_id: &str,
        offer: &NormalizedOffer,
        now: &str,
    ) -> Result<()> {
        let meta_json = offer
            .raw
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO source_offers (
                id, store, external_id, category_id, component_id,
                title, normalized_name, brand, model,
                price, currency, in_stock, stock_text,
                url, image_url, meta_json,
                last_seen_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                external_id = excluded.external_id,
                title = excluded.title,
                normalized_name = excluded.normalized_name,
                brand = excluded.brand,
                model = excluded.model,
                price = excluded.price,
                currency = excluded.currency,
                in_stock = excluded.in_stock,
                stock_text = excluded.stock_text,
                url = excluded.url,
                image_url = excluded.image_url,
                meta_json = excluded.meta_json,
                last_seen_at = excluded.last_seen_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(offer_id)
        .bind(&offer.raw.store)
        .bind(&offer.raw.external_id)
        .bind(category_id)
        .bind(&offer.raw.title)
        .bind(&offer.normalized_name)
        .bind(&offer.brand)
        .bind(&offer.model)
        .bind(offer.raw.price_cents)
        .bind(&offer.raw.currency)
        .bind(offer.raw.in_stock.unwrap_or(true))
        .bind(&offer.raw.stock_text)
        .bind(&offer.raw.url)
        .bind(&offer.raw.image_url)
        .bind(&meta_json)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// The most recently captured history point for an offer, if any.
    pub async fn latest_history_point(&self, offer_id: &str) -> Result<Option<PricePoint>> {
        let row = sqlx::query(
            r#"
            SELECT price, currency, in_stock
            FROM price_history
            WHERE source_offer_id = ?
            ORDER BY captured_at DESC
            LIMIT 1
            "#,
        )
        .bind(offer_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|row| PricePoint {
            price: row.get("price"),
            currency: row.get("currency"),
            in_stock: row.get("in_stock"),
        }))
    }

    /// Append a history point. Callers are responsible for change detection.
    pub async fn insert_history_point(
        &self,
        offer_id: &str,
        point: &PricePoint,
        captured_at: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (id, source_offer_id, price, currency, in_stock, captured_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(format!("ph-{}", Uuid::new_v4()))
        .bind(offer_id)
        .bind(point.price)
        .bind(&point.currency)
        .bind(point.in_stock)
        .bind(captured_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_offer(&self, offer_id: &str) -> Result<Option<SourceOffer>> {
        let row = sqlx::query("SELECT * FROM source_offers WHERE id = ?")
            .bind(offer_id)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|row| SourceOffer {
            id: row.get("id"),
            store: row.get("store"),
            external_id: row.get("external_id"),
            category_id: row.get("category_id"),
            component_id: row.get("component_id"),
            title: row.get("title"),
            normalized_name: row.get("normalized_name"),
            brand: row.get("brand"),
            model: row.get("model"),
            price: row.get("price"),
            currency: row.get("currency"),
            in_stock: row.get("in_stock"),
            stock_text: row.get("stock_text"),
            url: row.get("url"),
            image_url: row.get("image_url"),
            meta_json: row.get("meta_json"),
            last_seen_at: row.get("last_seen_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    pub async fn count_offers(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM source_offers")
            .fetch_one(&*self.pool)
            .await?)
    }

    pub async fn count_history_points(&self, offer_id: &str) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE source_offer_id = ?")
                .bind(offer_id)
                .fetch_one(&*self.pool)
                .await?,
        )
    }
}
