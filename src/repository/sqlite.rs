use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use validator::Validate;

use super::{HistoryLedger, ItemRepository};
use crate::config::DatabaseConfig;
use crate::models::{HistoryEntry, NewTrackedItem, TrackedItem};
use crate::utils::error::{AppError, Result};

const ITEM_COLUMNS: &str = "id, url, title, title_locked, current_price, desired_max_price, in_stock, \
     is_uhd_4k, image_url, local_image_path, source, notify_on_price_drop, notify_on_stock, \
     created_at, last_checked";

/// SQLite-backed store for tracked items and their history.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and bring the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is its own database
        let max_connections = if config.url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        tracing::debug!("Database schema is up to date");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ItemRepository for SqliteStore {
    async fn load_all(&self) -> Result<Vec<TrackedItem>> {
        let items = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {} FROM tracked_items ORDER BY id",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn save(&self, item: &TrackedItem) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE tracked_items
            SET title = ?, title_locked = ?, current_price = ?, desired_max_price = ?,
                in_stock = ?, is_uhd_4k = ?, image_url = ?, local_image_path = ?, source = ?,
                notify_on_price_drop = ?, notify_on_stock = ?, last_checked = ?
            WHERE id = ?
            ",
        )
        .bind(&item.title)
        .bind(item.title_locked)
        .bind(item.current_price)
        .bind(item.desired_max_price)
        .bind(item.in_stock)
        .bind(item.is_uhd_4k)
        .bind(&item.image_url)
        .bind(&item.local_image_path)
        .bind(&item.source)
        .bind(item.notify_on_price_drop)
        .bind(item.notify_on_stock)
        .bind(item.last_checked)
        .bind(item.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_scrape(&self, item: &TrackedItem) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE tracked_items
            SET title = CASE WHEN title_locked THEN title ELSE ? END,
                current_price = ?, in_stock = ?, is_uhd_4k = ?, image_url = ?,
                local_image_path = ?, source = ?, last_checked = ?
            WHERE id = ?
            ",
        )
        .bind(&item.title)
        .bind(item.current_price)
        .bind(item.in_stock)
        .bind(item.is_uhd_4k)
        .bind(&item.image_url)
        .bind(&item.local_image_path)
        .bind(&item.source)
        .bind(item.last_checked)
        .bind(item.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert(&self, item: NewTrackedItem) -> Result<TrackedItem> {
        item.validate()?;

        let mut tracked = TrackedItem::new(0, item);
        let result = sqlx::query(
            r"
            INSERT INTO tracked_items
            (url, title, title_locked, current_price, desired_max_price, in_stock, is_uhd_4k,
             image_url, local_image_path, source, notify_on_price_drop, notify_on_stock,
             created_at, last_checked)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&tracked.url)
        .bind(&tracked.title)
        .bind(tracked.title_locked)
        .bind(tracked.current_price)
        .bind(tracked.desired_max_price)
        .bind(tracked.in_stock)
        .bind(tracked.is_uhd_4k)
        .bind(&tracked.image_url)
        .bind(&tracked.local_image_path)
        .bind(&tracked.source)
        .bind(tracked.notify_on_price_drop)
        .bind(tracked.notify_on_stock)
        .bind(tracked.created_at)
        .bind(tracked.last_checked)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(format!("item already tracked: {}", tracked.url))
            } else {
                AppError::Database(e)
            }
        })?;

        tracked.id = result.last_insert_rowid();
        tracing::info!("Tracking item {}: {}", tracked.id, tracked.url);
        Ok(tracked)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TrackedItem>> {
        let item = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {} FROM tracked_items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<TrackedItem>> {
        let item = sqlx::query_as::<_, TrackedItem>(&format!(
            "SELECT {} FROM tracked_items WHERE url = ?",
            ITEM_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tracked_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HistoryLedger for SqliteStore {
    async fn append(&self, item_id: i64, price: f64, in_stock: bool) -> Result<()> {
        sqlx::query("INSERT INTO price_history (item_id, price, in_stock, recorded_at) VALUES (?, ?, ?, ?)")
            .bind(item_id)
            .bind(price)
            .bind(in_stock)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn history(&self, item_id: i64, days: u32) -> Result<Vec<HistoryEntry>> {
        let since = Utc::now() - Duration::days(i64::from(days));

        let entries = sqlx::query_as::<_, HistoryEntry>(
            r"
            SELECT id, item_id, price, in_stock, recorded_at
            FROM price_history
            WHERE item_id = ? AND recorded_at >= ?
            ORDER BY recorded_at, id
            ",
        )
        .bind(item_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
