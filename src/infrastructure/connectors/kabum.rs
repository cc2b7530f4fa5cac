//! Kabum listing connector
//!
//! One instance per category. Every listing page runs two extraction
//! strategies: the Next.js embedded-state blob and the JSON-LD `Product`
//! nodes. The store has drifted between those representations more than
//! once, so both run on every page and the richer embedded result wins when
//! the same product URL shows up in both.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::category::CategorySlug;
use crate::domain::offer::{ExtractionSource, RawOffer};
use crate::infrastructure::config::{kabum, AppConfig};
use crate::infrastructure::http_client::{FetchError, PageFetcher};
use crate::infrastructure::parsing::embedded_state::{descend, extract_next_data, Hop};
use crate::infrastructure::parsing::json_ld::{
    as_array, collect_product_nodes, extract_json_ld_blocks, first_string,
};
use crate::infrastructure::parsing::price::json_price_to_cents;

use super::targets::classify_target;
use super::OfferConnector;

/// Hops from the blob root to the listing's product array.
const PRODUCT_HOPS: [Hop<'static>; 6] = [
    Hop::Key("props"),
    Hop::Key("pageProps"),
    Hop::Key("data"),
    Hop::ParseJson,
    Hop::Key("catalogServer"),
    Hop::Key("data"),
];

/// Hops from the blob root to the listing's pagination metadata.
const META_HOPS: [Hop<'static>; 6] = [
    Hop::Key("props"),
    Hop::Key("pageProps"),
    Hop::Key("data"),
    Hop::ParseJson,
    Hop::Key("catalogServer"),
    Hop::Key("meta"),
];

static PRODUCT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/produto/(\d+)").expect("product id regex"));
static PAGE_NUMBER_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]page_number=(\d+)").expect("page number regex"));
static OUT_OF_STOCK_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)outofstock|out_of_stock|indispon|esgotad").expect("stock regex"));
static IN_STOCK_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)instock|in_stock|dispon").expect("stock regex"));

/// Extract the numeric product id from a Kabum product URL.
pub fn extract_kabum_product_id(url: &str) -> Option<String> {
    PRODUCT_ID.captures(url).map(|captures| captures[1].to_string())
}

struct PageExtraction {
    /// Products the page listed before target filtering, for the
    /// under-full-page pagination stop.
    listed_products: usize,
    offers: Vec<RawOffer>,
}

pub struct KabumConnector {
    fetcher: Arc<dyn PageFetcher>,
    category: CategorySlug,
    listing_url: String,
    max_pages: u32,
    page_size: usize,
    request_timeout: Duration,
}

impl KabumConnector {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        category: CategorySlug,
        listing_url: impl Into<String>,
        config: &AppConfig,
    ) -> Self {
        Self {
            fetcher,
            category,
            listing_url: listing_url.into(),
            max_pages: config.sync.max_pages,
            page_size: config.sync.page_size_hint,
            request_timeout: Duration::from_secs(config.http.timeout_seconds),
        }
    }

    pub fn cpu(fetcher: Arc<dyn PageFetcher>, config: &AppConfig) -> Self {
        Self::new(fetcher, CategorySlug::Cpu, kabum::CPU_URL, config)
    }

    pub fn gpu(fetcher: Arc<dyn PageFetcher>, config: &AppConfig) -> Self {
        Self::new(fetcher, CategorySlug::Gpu, kabum::GPU_URL, config)
    }

    pub fn ram(fetcher: Arc<dyn PageFetcher>, config: &AppConfig) -> Self {
        Self::new(fetcher, CategorySlug::Ram, kabum::RAM_URL, config)
    }

    /// Convert one JSON-LD `Product` node. `None` drops the record: either
    /// it failed validation (missing title/url/price) or the target filter.
    fn product_node_to_offer(&self, node: &serde_json::Map<String, Value>) -> Option<RawOffer> {
        let offers_node = as_array(node.get("offers"))
            .into_iter()
            .find(|value| value.is_object());

        let image_url = match node.get("image") {
            Some(Value::Array(items)) => first_string(items.iter().map(Some)),
            Some(Value::String(text)) => Some(text.trim().to_string()),
            _ => None,
        };

        let title = first_string([node.get("name"), node.get("title")])?;
        let url = first_string([
            offers_node.and_then(|offers| offers.get("url")),
            node.get("url"),
        ])?;
        let price_cents = offers_node
            .and_then(|offers| offers.get("price"))
            .or_else(|| node.get("price"))
            .and_then(json_price_to_cents)?;

        let availability =
            first_string([offers_node.and_then(|offers| offers.get("availability"))]);
        // "Indisponível" contains "dispon", so the out-of-stock check runs
        // first. Text matching neither way stays unknown.
        let in_stock = availability.as_deref().and_then(|text| {
            if OUT_OF_STOCK_TEXT.is_match(text) {
                Some(false)
            } else if IN_STOCK_TEXT.is_match(text) {
                Some(true)
            } else {
                None
            }
        });

        let target = classify_target(self.category, &title)?;

        Some(RawOffer {
            store: kabum::STORE.to_string(),
            category_slug: self.category,
            external_id: extract_kabum_product_id(&url),
            title,
            url,
            price_cents,
            currency: "BRL".to_string(),
            image_url,
            in_stock,
            stock_text: availability,
            meta: Some(target.into_meta(ExtractionSource::JsonLd)),
        })
    }

    /// Convert one embedded-state product entry. Richer than JSON-LD: it
    /// carries the discounted price, stock quantity and image directly.
    fn embedded_item_to_offer(&self, item: &Value) -> Option<RawOffer> {
        let title = item.get("name")?.as_str()?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let code = match item.get("code") {
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            _ => return None,
        };
        let friendly_name = item.get("friendlyName")?.as_str()?.trim().to_string();
        if friendly_name.is_empty() {
            return None;
        }
        let url = kabum::product_url(&code, &friendly_name);

        let price_cents = item
            .get("priceWithDiscount")
            .and_then(json_price_to_cents)
            .filter(|cents| *cents > 0)
            .or_else(|| item.get("price").and_then(json_price_to_cents))?;

        let quantity = item.get("quantity").and_then(Value::as_i64);
        let in_stock = item
            .get("available")
            .and_then(Value::as_bool)
            .or(quantity.map(|q| q > 0));
        let stock_text = quantity.map(|q| format!("{q} em estoque"));

        let target = classify_target(self.category, &title)?;

        Some(RawOffer {
            store: kabum::STORE.to_string(),
            category_slug: self.category,
            external_id: Some(code),
            title,
            url,
            price_cents,
            currency: "BRL".to_string(),
            image_url: item
                .get("image")
                .and_then(Value::as_str)
                .map(str::to_string),
            in_stock,
            stock_text,
            meta: Some(target.into_meta(ExtractionSource::EmbeddedState)),
        })
    }

    /// Run both strategies over one page body and merge by product URL.
    fn extract_page(&self, html: &str) -> PageExtraction {
        let mut by_url: HashMap<String, RawOffer> = HashMap::new();
        let mut listed_products = 0usize;

        let mut json_ld_products = Vec::new();
        for block in extract_json_ld_blocks(html) {
            collect_product_nodes(&block, &mut json_ld_products);
        }
        listed_products = listed_products.max(json_ld_products.len());
        for node in &json_ld_products {
            if let Some(offer) = self.product_node_to_offer(node) {
                by_url.insert(offer.url.clone(), offer);
            }
        }

        let embedded_items = extract_next_data(html)
            .and_then(|state| descend(&state, &PRODUCT_HOPS))
            .and_then(|products| products.as_array().cloned());
        if let Some(items) = embedded_items {
            listed_products = listed_products.max(items.len());
            for item in &items {
                if let Some(offer) = self.embedded_item_to_offer(item) {
                    // Embedded state wins over a JSON-LD hit for the same URL.
                    by_url.insert(offer.url.clone(), offer);
                }
            }
        }

        let mut offers: Vec<RawOffer> = by_url.into_values().collect();
        offers.sort_by(|a, b| a.url.cmp(&b.url));
        PageExtraction {
            listed_products,
            offers,
        }
    }

    /// Total page count, from embedded pagination metadata or in-page
    /// pagination links. `None` when the page exposes neither.
    fn discover_total_pages(&self, html: &str) -> Option<u32> {
        if let Some(meta) = extract_next_data(html).and_then(|state| descend(&state, &META_HOPS)) {
            if let Some(total) = meta.get("totalPagesCount").and_then(Value::as_u64) {
                return u32::try_from(total).ok();
            }
        }

        PAGE_NUMBER_LINK
            .captures_iter(html)
            .filter_map(|captures| captures[1].parse::<u32>().ok())
            .max()
    }
}

#[async_trait]
impl OfferConnector for KabumConnector {
    fn store(&self) -> &'static str {
        kabum::STORE
    }

    fn category(&self) -> CategorySlug {
        self.category
    }

    async fn fetch_offers(&self) -> Result<Vec<RawOffer>, FetchError> {
        let mut merged: HashMap<String, RawOffer> = HashMap::new();
        let mut total_pages: Option<u32> = None;

        for page in 1..=self.max_pages {
            let page_url = kabum::listing_page_url(&self.listing_url, page, self.page_size);
            let body = match self.fetcher.fetch(&page_url, self.request_timeout).await {
                Ok(body) => body,
                Err(error) if page == 1 => {
                    // Page 1 seeds pagination discovery; losing it means
                    // losing the whole fetch.
                    return Err(error);
                }
                Err(error) => {
                    warn!("kabum {} page {page} failed, keeping partial results: {error}", self.category);
                    break;
                }
            };

            if total_pages.is_none() {
                total_pages = self.discover_total_pages(&body);
                if let Some(total) = total_pages {
                    debug!("kabum {} listing reports {total} pages", self.category);
                }
            }

            let extraction = self.extract_page(&body);
            if extraction.offers.is_empty() {
                debug!("kabum {} page {page} yielded no matching products, stopping", self.category);
                break;
            }
            for offer in extraction.offers {
                merged.insert(offer.url.clone(), offer);
            }

            match total_pages {
                Some(total) if page >= total => break,
                // No total discoverable: an under-full page is the last one.
                None if extraction.listed_products < self.page_size => break,
                _ => {}
            }
        }

        let mut offers: Vec<RawOffer> = merged.into_values().collect();
        offers.sort_by(|a, b| a.url.cmp(&b.url));
        debug!("kabum {} fetch complete: {} offers", self.category, offers.len());
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::FixtureFetcher;
    use serde_json::json;

    const LISTING: &str = "https://fixture.test/hardware/processadores";

    fn page_url(page: u32) -> String {
        page_url_with_size(page, 2)
    }

    fn page_url_with_size(page: u32, page_size: usize) -> String {
        kabum::listing_page_url(LISTING, page, page_size)
    }

    fn config(max_pages: u32, page_size: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.sync.max_pages = max_pages;
        config.sync.page_size_hint = page_size;
        config
    }

    /// A listing page whose embedded blob lists the given products.
    fn embedded_page(products: &[Value], total_pages: Option<u32>) -> String {
        let mut catalog = json!({"data": products});
        if let Some(total) = total_pages {
            catalog["meta"] = json!({"totalPagesCount": total});
        }
        let inner = json!({"catalogServer": catalog});
        let blob = json!({"props": {"pageProps": {"data": inner.to_string()}}});
        format!(
            "<html><body><script id=\"__NEXT_DATA__\" type=\"application/json\">{blob}</script></body></html>"
        )
    }

    fn cpu_product(code: u64, name: &str, price: f64) -> Value {
        json!({
            "code": code,
            "name": name,
            "friendlyName": format!("produto-{code}"),
            "price": price,
            "priceWithDiscount": price - 10.0,
            "available": true,
            "quantity": 5,
            "image": format!("https://img.fixture.test/{code}.jpg")
        })
    }

    fn connector(fetcher: FixtureFetcher, max_pages: u32, page_size: usize) -> KabumConnector {
        KabumConnector::new(
            Arc::new(fetcher),
            CategorySlug::Cpu,
            LISTING,
            &config(max_pages, page_size),
        )
    }

    #[tokio::test]
    async fn embedded_products_become_offers() {
        let page = embedded_page(
            &[cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90)],
            Some(1),
        );
        let fetcher = FixtureFetcher::new().with_page(&page_url(1), &page);

        let offers = connector(fetcher, 5, 2).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 1);
        let offer = &offers[0];
        assert_eq!(offer.external_id.as_deref(), Some("100"));
        assert_eq!(offer.url, "https://www.kabum.com.br/produto/100/produto-100");
        // priceWithDiscount wins over the list price.
        assert_eq!(offer.price_cents, 118_990);
        assert_eq!(offer.in_stock, Some(true));
        assert_eq!(offer.stock_text.as_deref(), Some("5 em estoque"));
        assert_eq!(
            offer.meta.as_ref().and_then(|meta| meta.source()),
            Some(ExtractionSource::EmbeddedState)
        );
    }

    #[tokio::test]
    async fn json_ld_fallback_and_embedded_precedence() {
        // Embedded blob and JSON-LD describe the same product URL with
        // different prices; the embedded result must win.
        let json_ld = json!({
            "@context": "https://schema.org",
            "@type": "Product",
            "name": "Processador AMD Ryzen 5 8600G AM5",
            "url": "https://www.kabum.com.br/produto/100/produto-100",
            "offers": {"@type": "Offer", "price": "1299.90", "availability": "https://schema.org/InStock", "url": "https://www.kabum.com.br/produto/100/produto-100"}
        });
        let embedded = embedded_page(
            &[cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90)],
            Some(1),
        );
        let page = format!(
            "<script type=\"application/ld+json\">{json_ld}</script>{embedded}"
        );
        let fetcher = FixtureFetcher::new().with_page(&page_url(1), &page);

        let offers = connector(fetcher, 5, 2).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].price_cents, 118_990);
        assert_eq!(
            offers[0].meta.as_ref().and_then(|meta| meta.source()),
            Some(ExtractionSource::EmbeddedState)
        );
    }

    #[tokio::test]
    async fn json_ld_alone_is_enough() {
        let json_ld = json!({
            "@type": "Product",
            "name": "Processador Intel Core i5-14400F LGA1700",
            "url": "https://www.kabum.com.br/produto/200/produto-200",
            "offers": {"price": "1.299,90", "availability": "InStock"}
        });
        let page = format!("<script type=\"application/ld+json\">{json_ld}</script>");
        let fetcher = FixtureFetcher::new().with_page(&page_url(1), &page);

        let offers = connector(fetcher, 1, 2).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].price_cents, 129_990);
        assert_eq!(offers[0].external_id.as_deref(), Some("200"));
        assert_eq!(
            offers[0].meta.as_ref().and_then(|meta| meta.source()),
            Some(ExtractionSource::JsonLd)
        );
    }

    #[tokio::test]
    async fn availability_text_maps_to_tri_state_stock() {
        let sold_out = json!({
            "@type": "Product",
            "name": "Processador AMD Ryzen 7 9700X AM5",
            "url": "https://www.kabum.com.br/produto/300/produto-300",
            "offers": {"price": "3.499,90", "availability": "https://schema.org/OutOfStock"}
        });
        let unknown = json!({
            "@type": "Product",
            "name": "Processador Intel Core i7-14700F LGA1700",
            "url": "https://www.kabum.com.br/produto/301/produto-301",
            "offers": {"price": "2.199,90", "availability": "https://schema.org/PreOrder"}
        });
        let page = format!(
            "<script type=\"application/ld+json\">{sold_out}</script><script type=\"application/ld+json\">{unknown}</script>"
        );
        let fetcher = FixtureFetcher::new().with_page(&page_url_with_size(1, 4), &page);

        let offers = connector(fetcher, 1, 4).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 2);
        let by_id = |id: &str| {
            offers
                .iter()
                .find(|offer| offer.external_id.as_deref() == Some(id))
                .unwrap()
        };
        assert_eq!(by_id("300").in_stock, Some(false));
        assert_eq!(by_id("301").in_stock, None);
    }

    #[tokio::test]
    async fn products_failing_the_target_filter_are_dropped() {
        let page = embedded_page(
            &[
                cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90),
                cpu_product(101, "Processador Intel Core 2 Duo LGA775", 99.90),
            ],
            Some(1),
        );
        let fetcher = FixtureFetcher::new().with_page(&page_url_with_size(1, 4), &page);

        let offers = connector(fetcher, 5, 4).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].external_id.as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn pagination_stops_on_under_full_page_without_total() {
        // Two full products on page 1, one on page 2, no total count
        // anywhere: the connector must stop after page 2.
        let page_one = embedded_page(
            &[
                cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90),
                cpu_product(101, "Processador AMD Ryzen 7 8700G AM5", 1899.90),
            ],
            None,
        );
        let page_two = embedded_page(
            &[cpu_product(102, "Processador AMD Ryzen 9 7900 AM5", 2599.90)],
            None,
        );
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .with_page(&page_url(1), &page_one)
                .with_page(&page_url(2), &page_two),
        );
        let connector =
            KabumConnector::new(fetcher.clone(), CategorySlug::Cpu, LISTING, &config(10, 2));

        let offers = connector.fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 3);
        // The under-full page 2 ended pagination; page 3 was never requested.
        assert_eq!(fetcher.requested_urls(), vec![page_url(1), page_url(2)]);
    }

    #[tokio::test]
    async fn pagination_respects_discovered_total() {
        let page_one = embedded_page(
            &[
                cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90),
                cpu_product(101, "Processador AMD Ryzen 7 8700G AM5", 1899.90),
            ],
            Some(2),
        );
        let page_two = embedded_page(
            &[
                cpu_product(102, "Processador AMD Ryzen 9 7900 AM5", 2599.90),
                cpu_product(103, "Processador AMD Ryzen 9 7950X AM5", 3299.90),
            ],
            Some(2),
        );
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .with_page(&page_url(1), &page_one)
                .with_page(&page_url(2), &page_two),
        );
        let connector =
            KabumConnector::new(fetcher.clone(), CategorySlug::Cpu, LISTING, &config(10, 2));

        let offers = connector.fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 4);
        assert_eq!(fetcher.requested_urls(), vec![page_url(1), page_url(2)]);
    }

    #[tokio::test]
    async fn first_page_failure_is_fatal() {
        let fetcher = FixtureFetcher::new().with_failure(&page_url(1), 503);
        let error = connector(fetcher, 5, 2).fetch_offers().await.unwrap_err();
        assert!(matches!(error, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn later_page_failure_keeps_partial_results() {
        let page_one = embedded_page(
            &[
                cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90),
                cpu_product(101, "Processador AMD Ryzen 7 8700G AM5", 1899.90),
            ],
            Some(3),
        );
        let fetcher = FixtureFetcher::new()
            .with_page(&page_url(1), &page_one)
            .with_failure(&page_url(2), 500);

        let offers = connector(fetcher, 10, 2).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_urls_within_a_fetch_collapse() {
        // The same product on two pages: last one wins, one offer total.
        let product = cpu_product(100, "Processador AMD Ryzen 5 8600G AM5", 1199.90);
        let page_one = embedded_page(
            &[product.clone(), cpu_product(101, "Processador AMD Ryzen 7 8700G AM5", 1899.90)],
            Some(2),
        );
        let page_two = embedded_page(&[product], Some(2));
        let fetcher = FixtureFetcher::new()
            .with_page(&page_url(1), &page_one)
            .with_page(&page_url(2), &page_two);

        let offers = connector(fetcher, 10, 2).fetch_offers().await.unwrap();
        assert_eq!(offers.len(), 2);
    }
}
