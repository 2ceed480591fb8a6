use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live counters for the current (or most recent) run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub active: bool,
}

impl RunProgress {
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub history_failures: usize,
    pub events_detected: usize,
    pub notifications_dispatched: usize,
    /// Set when another run held the exclusivity guard and nothing ran.
    pub skipped: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            processed: 0,
            succeeded: 0,
            failed: 0,
            history_failures: 0,
            events_detected: 0,
            notifications_dispatched: 0,
            skipped: false,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::new(Uuid::new_v4())
        }
    }
}
