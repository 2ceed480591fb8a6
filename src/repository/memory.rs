use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use validator::Validate;

use super::{HistoryLedger, ItemRepository};
use crate::models::{HistoryEntry, NewTrackedItem, TrackedItem};
use crate::utils::error::{AppError, Result};

/// Process-local store backing both repository traits.
#[derive(Default)]
pub struct InMemoryStore {
    items: RwLock<BTreeMap<i64, TrackedItem>>,
    history: RwLock<Vec<HistoryEntry>>,
    next_item_id: AtomicI64,
    next_history_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing items, keeping their ids.
    pub async fn with_items(items: Vec<TrackedItem>) -> Self {
        let store = Self::new();
        {
            let mut map = store.items.write().await;
            for item in items {
                store.next_item_id.fetch_max(item.id, Ordering::SeqCst);
                map.insert(item.id, item);
            }
        }
        store
    }

    /// Every history entry recorded so far, in append order
    pub async fn all_history(&self) -> Vec<HistoryEntry> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn load_all(&self) -> Result<Vec<TrackedItem>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn save(&self, item: &TrackedItem) -> Result<bool> {
        let mut items = self.items.write().await;
        match items.get_mut(&item.id) {
            Some(stored) => {
                *stored = item.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_scrape(&self, item: &TrackedItem) -> Result<bool> {
        let mut items = self.items.write().await;
        let Some(stored) = items.get_mut(&item.id) else {
            return Ok(false);
        };

        if !stored.title_locked {
            stored.title = item.title.clone();
        }
        stored.current_price = item.current_price;
        stored.in_stock = item.in_stock;
        stored.is_uhd_4k = item.is_uhd_4k;
        stored.image_url = item.image_url.clone();
        stored.local_image_path = item.local_image_path.clone();
        stored.source = item.source.clone();
        stored.last_checked = item.last_checked;
        Ok(true)
    }

    async fn insert(&self, item: NewTrackedItem) -> Result<TrackedItem> {
        item.validate()?;

        let mut items = self.items.write().await;
        if items.values().any(|existing| existing.url == item.url) {
            return Err(AppError::Validation(format!("item already tracked: {}", item.url)));
        }

        let id = self.next_item_id.fetch_add(1, Ordering::SeqCst) + 1;
        let tracked = TrackedItem::new(id, item);
        items.insert(id, tracked.clone());
        Ok(tracked)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TrackedItem>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<TrackedItem>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .find(|item| item.url == url)
            .cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.items.write().await.remove(&id).is_some();
        if removed {
            self.history.write().await.retain(|entry| entry.item_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl HistoryLedger for InMemoryStore {
    async fn append(&self, item_id: i64, price: f64, in_stock: bool) -> Result<()> {
        let id = self.next_history_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.history.write().await.push(HistoryEntry {
            id,
            item_id,
            price,
            in_stock,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn history(&self, item_id: i64, days: u32) -> Result<Vec<HistoryEntry>> {
        let since = Utc::now() - Duration::days(i64::from(days));
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|entry| entry.item_id == item_id && entry.recorded_at >= since)
            .cloned()
            .collect())
    }
}
