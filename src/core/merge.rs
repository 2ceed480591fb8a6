use serde::{Deserialize, Serialize};

use crate::models::{ScrapedSnapshot, TrackedItem};

/// Prices at or below this are treated as "no price extracted".
pub const PRICE_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Title,
    CurrentPrice,
    InStock,
    IsUhd4k,
    ImageUrl,
    LocalImagePath,
    Source,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub item: TrackedItem,
    /// Fields whose value differs from the previous state
    pub changed: Vec<ItemField>,
    /// The snapshot claimed the item is in stock but carried no price
    pub suspect_zero_price: bool,
}

impl MergeOutcome {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn changed_field(&self, field: ItemField) -> bool {
        self.changed.contains(&field)
    }
}

/// Fold a fresh snapshot into the persisted state of an item.
///
/// Title follows the snapshot unless a human locked it or the snapshot has
/// none. Price follows only when a real price was extracted. Stock, format,
/// artwork and source always follow the snapshot; a cached image is dropped
/// when the image URL moved and no replacement was cached.
pub fn merge_snapshot(old: &TrackedItem, snapshot: &ScrapedSnapshot) -> MergeOutcome {
    let mut item = old.clone();
    let mut changed = Vec::new();

    if !item.title_locked && !snapshot.title.trim().is_empty() && item.title != snapshot.title {
        item.title = snapshot.title.clone();
        changed.push(ItemField::Title);
    }

    let suspect_zero_price = snapshot.price <= PRICE_EPSILON && snapshot.in_stock;
    if snapshot.price > PRICE_EPSILON && (item.current_price - snapshot.price).abs() > f64::EPSILON {
        item.current_price = snapshot.price;
        changed.push(ItemField::CurrentPrice);
    }

    if item.in_stock != snapshot.in_stock {
        item.in_stock = snapshot.in_stock;
        changed.push(ItemField::InStock);
    }

    if item.is_uhd_4k != snapshot.is_uhd_4k {
        item.is_uhd_4k = snapshot.is_uhd_4k;
        changed.push(ItemField::IsUhd4k);
    }

    let image_moved = item.image_url != snapshot.image_url;
    if image_moved {
        item.image_url = snapshot.image_url.clone();
        changed.push(ItemField::ImageUrl);
    }

    let local_image_path = match &snapshot.local_image_path {
        Some(path) => Some(path.clone()),
        None if image_moved => None,
        None => item.local_image_path.clone(),
    };
    if item.local_image_path != local_image_path {
        item.local_image_path = local_image_path;
        changed.push(ItemField::LocalImagePath);
    }

    if item.source != snapshot.source {
        item.source = snapshot.source.clone();
        changed.push(ItemField::Source);
    }

    item.last_checked = Some(snapshot.fetched_at);

    MergeOutcome {
        item,
        changed,
        suspect_zero_price,
    }
}
