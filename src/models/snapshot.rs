use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fetch attempt's result from a source adapter. Consumed by a single
/// merge and then dropped; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedSnapshot {
    pub url: String,
    pub title: String,
    pub price: f64,
    pub in_stock: bool,
    pub is_uhd_4k: bool,
    pub image_url: Option<String>,
    pub local_image_path: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl ScrapedSnapshot {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            price: 0.0,
            in_stock: false,
            is_uhd_4k: false,
            image_url: None,
            local_image_path: None,
            source: source.into(),
            fetched_at: Utc::now(),
        }
    }
}
