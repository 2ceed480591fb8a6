use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TrackedItem;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PriceDroppedBelowThreshold,
    BackInStock,
    PriceChanged,
    OutOfStock,
}

impl ChangeKind {
    /// Only threshold crossings and restocks reach notification sinks; the
    /// other kinds are informational.
    pub fn should_notify(self) -> bool {
        matches!(self, ChangeKind::PriceDroppedBelowThreshold | ChangeKind::BackInStock)
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::PriceDroppedBelowThreshold => "price_dropped_below_threshold",
            ChangeKind::BackInStock => "back_in_stock",
            ChangeKind::PriceChanged => "price_changed",
            ChangeKind::OutOfStock => "out_of_stock",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub item: TrackedItem,
    pub old_price: Option<f64>,
    pub new_price: Option<f64>,
    pub old_stock: Option<bool>,
    pub new_stock: Option<bool>,
    pub detected_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn describe(&self) -> String {
        let title = self.item.display_title();
        match self.kind {
            ChangeKind::PriceDroppedBelowThreshold => format!(
                "Price dropped below threshold for '{}': €{:.2} → €{:.2} (threshold: €{:.2})",
                title,
                self.old_price.unwrap_or(0.0),
                self.new_price.unwrap_or(0.0),
                self.item.desired_max_price
            ),
            ChangeKind::BackInStock => format!(
                "'{}' is back in stock! Current price: €{:.2}",
                title, self.item.current_price
            ),
            ChangeKind::PriceChanged => format!(
                "Price changed for '{}': €{:.2} → €{:.2}",
                title,
                self.old_price.unwrap_or(0.0),
                self.new_price.unwrap_or(0.0)
            ),
            ChangeKind::OutOfStock => format!("'{}' is now out of stock", title),
        }
    }
}
