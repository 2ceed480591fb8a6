use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::config::ScraperConfig;
use crate::models::ScrapedSnapshot;
use crate::plugins::traits::SourceAdapter;
use crate::utils::error::{AppError, Result};

const TITLE_KEYS: &[(&str, &str)] = &[("property", "og:title"), ("name", "twitter:title")];
const PRICE_KEYS: &[(&str, &str)] = &[
    ("property", "product:price:amount"),
    ("property", "og:price:amount"),
    ("itemprop", "price"),
];
const AVAILABILITY_KEYS: &[(&str, &str)] = &[
    ("property", "product:availability"),
    ("property", "og:availability"),
    ("itemprop", "availability"),
];
const IMAGE_KEYS: &[(&str, &str)] = &[("property", "og:image"), ("name", "twitter:image")];

/// Product fields pulled out of one page, before they become a snapshot.
#[derive(Debug, Default, PartialEq)]
struct PageData {
    title: Option<String>,
    price: Option<f64>,
    availability: Option<String>,
    image_url: Option<String>,
}

impl PageData {
    fn fill_missing(&mut self, other: PageData) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.price.is_none() {
            self.price = other.price;
        }
        if self.availability.is_none() {
            self.availability = other.availability;
        }
        if self.image_url.is_none() {
            self.image_url = other.image_url;
        }
    }
}

/// Generic adapter for shop pages that publish OpenGraph product tags or a
/// schema.org `Product` in JSON-LD.
pub struct OpenGraphAdapter {
    client: Client,
    allowed_hosts: Vec<String>,
    price_regex: Regex,
}

impl OpenGraphAdapter {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(config.user_agent.clone())
            .build()?;

        let price_regex = Regex::new(r"\d[\d.,]*")
            .map_err(|e| AppError::Internal(format!("price pattern: {}", e)))?;

        Ok(Self {
            client,
            allowed_hosts: config
                .allowed_hosts
                .iter()
                .map(|host| host.trim().to_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
            price_regex,
        })
    }

    fn host_allowed(&self, host: &str) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        let host = host.to_lowercase();
        self.allowed_hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
    }

    /// Parse a display price such as "€ 29,99", "1.299,00" or "24.95".
    ///
    /// A trailing separator followed by one or two digits is the decimal
    /// separator; every other separator groups thousands.
    fn parse_price(&self, text: &str) -> Option<f64> {
        let token = self.price_regex.find(text)?.as_str().trim_end_matches(['.', ',']);

        let normalized = match token.rfind(['.', ',']) {
            Some(pos) if token.len() - pos - 1 <= 2 => {
                let (whole, fraction) = token.split_at(pos);
                format!("{}.{}", whole.replace(['.', ','], ""), &fraction[1..])
            }
            _ => token.replace(['.', ','], ""),
        };

        normalized.parse::<f64>().ok()
    }

    fn meta_content(document: &Html, keys: &[(&str, &str)]) -> Option<String> {
        keys.iter().find_map(|(attr, key)| {
            let selector = Selector::parse(&format!(r#"meta[{}="{}"]"#, attr, key)).ok()?;
            document
                .select(&selector)
                .filter_map(|element| element.value().attr("content"))
                .map(str::trim)
                .find(|content| !content.is_empty())
                .map(str::to_string)
        })
    }

    fn extract_meta(&self, document: &Html) -> PageData {
        PageData {
            title: Self::meta_content(document, TITLE_KEYS),
            price: Self::meta_content(document, PRICE_KEYS).and_then(|p| self.parse_price(&p)),
            availability: Self::meta_content(document, AVAILABILITY_KEYS),
            image_url: Self::meta_content(document, IMAGE_KEYS),
        }
    }

    fn extract_json_ld(&self, document: &Html) -> PageData {
        let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return PageData::default();
        };

        for script in document.select(&selector) {
            let raw = script.text().collect::<String>();
            let Ok(value) = serde_json::from_str::<Value>(&raw) else {
                tracing::debug!("Skipping malformed JSON-LD block");
                continue;
            };

            if let Some(product) = find_product(&value) {
                return self.product_from_json_ld(product);
            }
        }

        PageData::default()
    }

    fn product_from_json_ld(&self, product: &Value) -> PageData {
        let offer = match product.get("offers") {
            Some(Value::Array(offers)) => offers.first(),
            Some(offer @ Value::Object(_)) => Some(offer),
            _ => None,
        };

        let price = offer.and_then(|o| o.get("price")).and_then(|price| match price {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => self.parse_price(s),
            _ => None,
        });

        let image_url = match product.get("image") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(images)) => images.first().and_then(Value::as_str).map(str::to_string),
            Some(image @ Value::Object(_)) => image.get("url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };

        PageData {
            title: product.get("name").and_then(Value::as_str).map(|s| s.trim().to_string()),
            price,
            availability: offer
                .and_then(|o| o.get("availability"))
                .and_then(Value::as_str)
                .map(str::to_string),
            image_url,
        }
    }

    fn document_title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|title| title.text().collect::<String>().trim().to_string())
            .filter(|title| !title.is_empty())
    }

    /// Turn a fetched page into a snapshot. `None` when the page carries no
    /// usable product data at all.
    fn parse_document(&self, url: &str, source: &str, body: &str) -> Option<ScrapedSnapshot> {
        let document = Html::parse_document(body);

        let mut data = self.extract_meta(&document);
        data.fill_missing(self.extract_json_ld(&document));

        if data.title.is_none() && data.price.is_none() {
            return None;
        }

        let title = data
            .title
            .or_else(|| Self::document_title(&document))
            .unwrap_or_default();
        let price = data.price.unwrap_or(0.0);

        // Pages that don't state availability but do show a price are treated
        // as orderable.
        let in_stock = match data.availability.as_deref() {
            Some(availability) => is_available(availability),
            None => price > 0.0,
        };

        let mut snapshot = ScrapedSnapshot::new(url, source);
        snapshot.is_uhd_4k = is_uhd_title(&title);
        snapshot.title = title;
        snapshot.price = price;
        snapshot.in_stock = in_stock;
        snapshot.image_url = data.image_url;
        Some(snapshot)
    }
}

/// Locate a schema.org Product node: top level, inside an array, or inside
/// an `@graph`.
fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(t)) => t == "Product" || t == "Movie",
                Some(Value::Array(types)) => types
                    .iter()
                    .any(|t| matches!(t.as_str(), Some("Product") | Some("Movie"))),
                _ => false,
            };
            if is_product {
                return Some(value);
            }
            map.get("@graph").and_then(find_product)
        }
        _ => None,
    }
}

fn is_available(availability: &str) -> bool {
    let normalized = availability.to_lowercase().replace([' ', '_', '-'], "");
    if ["outofstock", "soldout", "discontinued", "nietopvoorraad", "uitverkocht"]
        .iter()
        .any(|marker| normalized.contains(marker))
    {
        return false;
    }
    normalized.contains("instock") || normalized.contains("limitedavailability")
}

fn is_uhd_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    ["4k", "uhd", "ultra hd", "ultra-hd"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn source_label(host: &str) -> String {
    host.trim_start_matches("www.").to_string()
}

#[async_trait]
impl SourceAdapter for OpenGraphAdapter {
    fn name(&self) -> &str {
        "open-graph"
    }

    fn can_handle(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        parsed.host_str().is_some_and(|host| self.host_allowed(host))
    }

    async fn fetch(&self, url: &str) -> Result<Option<ScrapedSnapshot>> {
        let parsed = Url::parse(url).map_err(|e| AppError::Scraping(format!("invalid url {}: {}", url, e)))?;
        let source = source_label(parsed.host_str().unwrap_or_default());

        tracing::debug!("Fetching {} via {}", url, self.name());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Scraping(format!("{} returned status {}", url, status)));
        }

        let body = response.text().await?;
        let snapshot = self.parse_document(url, &source, &body);

        match &snapshot {
            Some(s) => tracing::debug!(
                "Scraped {}: '{}' (€{:.2}, stock: {}, UHD: {})",
                url,
                s.title,
                s.price,
                s.in_stock,
                s.is_uhd_4k
            ),
            None => tracing::warn!("No product data found at {}", url),
        }

        Ok(snapshot)
    }
}
