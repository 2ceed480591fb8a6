use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One append-only price/stock observation for a tracked item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub item_id: i64,
    pub price: f64,
    pub in_stock: bool,
    pub recorded_at: DateTime<Utc>,
}
