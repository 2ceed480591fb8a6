use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TrackedItem {
    pub id: i64,
    pub url: String,

    // Title is locked once a human edits it so scrapes stop overwriting it
    pub title: String,
    pub title_locked: bool,

    // Price and availability
    pub current_price: f64,
    pub desired_max_price: f64,
    pub in_stock: bool,
    pub is_uhd_4k: bool,

    // Artwork
    pub image_url: Option<String>,
    pub local_image_path: Option<String>,
    pub source: String,

    // Notification rules
    pub notify_on_price_drop: bool,
    pub notify_on_stock: bool,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTrackedItem {
    #[validate(url)]
    pub url: String,
    pub title: Option<String>,
    #[validate(range(min = 0.0))]
    pub desired_max_price: f64,
    pub notify_on_price_drop: Option<bool>,
    pub notify_on_stock: Option<bool>,
    /// Keep `title` fixed against scrape overwrites from the start
    #[serde(default)]
    pub lock_title: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTrackedItem {
    pub title: Option<String>,
    #[validate(range(min = 0.0))]
    pub desired_max_price: Option<f64>,
    pub notify_on_price_drop: Option<bool>,
    pub notify_on_stock: Option<bool>,
    pub title_locked: Option<bool>,
}

impl TrackedItem {
    pub fn new(id: i64, new_item: NewTrackedItem) -> Self {
        let title = new_item.title.unwrap_or_default();
        Self {
            id,
            url: new_item.url,
            title_locked: new_item.lock_title && !title.trim().is_empty(),
            title,
            current_price: 0.0,
            desired_max_price: new_item.desired_max_price,
            in_stock: false,
            is_uhd_4k: false,
            image_url: None,
            local_image_path: None,
            source: String::new(),
            notify_on_price_drop: new_item.notify_on_price_drop.unwrap_or(true),
            notify_on_stock: new_item.notify_on_stock.unwrap_or(true),
            created_at: Utc::now(),
            last_checked: None,
        }
    }

    /// Apply a user edit. Setting a title locks it against adapter overwrites
    /// unless the edit explicitly unlocks it.
    pub fn update(&mut self, update: UpdateTrackedItem) {
        if let Some(title) = update.title {
            self.title = title;
            self.title_locked = true;
        }
        if let Some(locked) = update.title_locked {
            self.title_locked = locked;
        }
        if let Some(max_price) = update.desired_max_price {
            self.desired_max_price = max_price;
        }
        if let Some(flag) = update.notify_on_price_drop {
            self.notify_on_price_drop = flag;
        }
        if let Some(flag) = update.notify_on_stock {
            self.notify_on_stock = flag;
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { &self.url } else { &self.title }
    }
}
