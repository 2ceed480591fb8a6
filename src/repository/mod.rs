pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::models::{HistoryEntry, NewTrackedItem, TrackedItem};
use crate::utils::error::Result;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Persistent state of the tracked items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// All tracked items, ordered by id
    async fn load_all(&self) -> Result<Vec<TrackedItem>>;

    /// Overwrite the stored state of `item`. `Ok(false)` when no row with the
    /// item's id exists any more.
    async fn save(&self, item: &TrackedItem) -> Result<bool>;

    /// Write only what a scrape observes: price, stock, format, artwork,
    /// source and check time, plus the title unless the stored row has it
    /// locked. User settings edited meanwhile are left alone. `Ok(false)` when
    /// the row no longer exists.
    async fn record_scrape(&self, item: &TrackedItem) -> Result<bool>;

    /// Start tracking a new URL. URLs are unique; a duplicate is a
    /// validation error.
    async fn insert(&self, item: NewTrackedItem) -> Result<TrackedItem>;

    async fn find_by_id(&self, id: i64) -> Result<Option<TrackedItem>>;

    async fn find_by_url(&self, url: &str) -> Result<Option<TrackedItem>>;

    /// Stop tracking an item and drop its history. `Ok(false)` if unknown.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Append-only price/stock observations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    async fn append(&self, item_id: i64, price: f64, in_stock: bool) -> Result<()>;

    /// Entries for `item_id` recorded in the last `days` days, oldest first
    async fn history(&self, item_id: i64, days: u32) -> Result<Vec<HistoryEntry>>;
}
