//! Source connectors
//!
//! One connector per (store, category) pair, all behind `OfferConnector`.
//! A connector owns its fetch strategy end to end: pagination, extraction,
//! target filtering and in-fetch deduplication. What comes out is a list of
//! valid `RawOffer`s ready for normalization.

pub mod kabum;
pub mod targets;

use async_trait::async_trait;

use crate::domain::category::CategorySlug;
use crate::domain::offer::RawOffer;

use super::http_client::FetchError;

#[async_trait]
pub trait OfferConnector: Send + Sync {
    /// Store identifier recorded on every offer.
    fn store(&self) -> &'static str;

    fn category(&self) -> CategorySlug;

    /// Fetch all offers for this target. Fails only when the first page
    /// cannot be fetched; later page failures degrade to partial results.
    async fn fetch_offers(&self) -> Result<Vec<RawOffer>, FetchError>;
}
