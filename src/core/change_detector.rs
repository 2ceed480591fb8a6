use chrono::Utc;
use metrics::counter;

use crate::core::merge::PRICE_EPSILON;
use crate::models::{ChangeEvent, ChangeKind, TrackedItem};
use crate::plugins::manager::NotificationSinkRef;

/// Outcome of one fan-out over the registered sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub event: ChangeEvent,
    pub report: DispatchReport,
}

/// Classifies item transitions and fans eligible events out to sinks.
#[derive(Clone, Default)]
pub struct ChangeDetector {
    sinks: Vec<NotificationSinkRef>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the fan-out list. Sinks without a destination are
    /// rejected and `false` is returned.
    pub fn register(&mut self, sink: NotificationSinkRef) -> bool {
        if !sink.is_configured() {
            tracing::warn!("Notification sink '{}' is not configured, skipping", sink.name());
            return false;
        }
        tracing::info!("Registered notification sink: {}", sink.name());
        self.sinks.push(sink);
        true
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Classify the transition from `old` to `new`.
    ///
    /// First match wins: a drop below the threshold, a restock, a price move,
    /// then going out of stock. At most one event is produced.
    pub fn classify(old: &TrackedItem, new: &TrackedItem) -> Option<ChangeEvent> {
        let detected_at = new.last_checked.unwrap_or_else(Utc::now);
        let event = |kind, price: bool| ChangeEvent {
            kind,
            item: new.clone(),
            old_price: price.then_some(old.current_price),
            new_price: price.then_some(new.current_price),
            old_stock: (!price).then_some(old.in_stock),
            new_stock: (!price).then_some(new.in_stock),
            detected_at,
        };

        if new.notify_on_price_drop
            && new.in_stock
            && new.current_price <= new.desired_max_price
            && old.current_price > new.desired_max_price
        {
            Some(event(ChangeKind::PriceDroppedBelowThreshold, true))
        } else if new.notify_on_stock && !old.in_stock && new.in_stock {
            Some(event(ChangeKind::BackInStock, false))
        } else if (old.current_price - new.current_price).abs() > PRICE_EPSILON {
            Some(event(ChangeKind::PriceChanged, true))
        } else if old.in_stock && !new.in_stock {
            Some(event(ChangeKind::OutOfStock, false))
        } else {
            None
        }
    }

    /// Classify and, for notifiable kinds, deliver to every sink.
    pub async fn detect(&self, old: &TrackedItem, new: &TrackedItem) -> Option<Detection> {
        let event = Self::classify(old, new)?;
        tracing::info!("{}", event.describe());
        counter!("bluray_watcher_changes_total", "kind" => event.kind.label()).increment(1);

        let report = if event.kind.should_notify() {
            self.dispatch(&event).await
        } else {
            DispatchReport::default()
        };

        Some(Detection { event, report })
    }

    /// Deliver `event` to each sink in registration order. A failing sink is
    /// logged and does not stop the remaining ones.
    pub async fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for sink in &self.sinks {
            match sink.notify(event).await {
                Ok(()) => {
                    report.delivered += 1;
                    counter!("bluray_watcher_notifications_total", "sink" => sink.name(), "result" => "delivered")
                        .increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("bluray_watcher_notifications_total", "sink" => sink.name(), "result" => "failed")
                        .increment(1);
                    tracing::warn!(
                        "Notification sink '{}' failed for item {}: {}",
                        sink.name(),
                        event.item.id,
                        e
                    );
                }
            }
        }

        report
    }
}
