use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::ScraperConfig;
use crate::core::change_detector::{ChangeDetector, DispatchReport};
use crate::core::merge::merge_snapshot;
use crate::models::{ChangeKind, RunProgress, RunSummary, TrackedItem};
use crate::plugins::manager::{AdapterRegistry, NotificationSinkRef};
use crate::repository::{HistoryLedger, ItemRepository};
use crate::utils::error::{AppError, ItemError, Result};

const MIN_LAUNCH_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Upper bound on item tasks in flight at once
    pub max_concurrent: usize,
    pub scrape_delay_seconds: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

impl From<&ScraperConfig> for OrchestratorSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_checks,
            scrape_delay_seconds: config.scrape_delay_seconds,
        }
    }
}

/// Pause between two task launches: the configured delay spread over the
/// concurrency limit, never under one second. `None` when no delay is set.
pub fn launch_throttle(scrape_delay_seconds: u64, max_concurrent: usize) -> Option<Duration> {
    if scrape_delay_seconds == 0 {
        return None;
    }
    let spread = scrape_delay_seconds.saturating_mul(1000) / max_concurrent.max(1) as u64;
    Some(Duration::from_millis(spread.max(MIN_LAUNCH_INTERVAL_MS)))
}

/// Counters shared between the control loop, item tasks and pollers.
#[derive(Debug, Default)]
struct RunState {
    active: AtomicBool,
    total: AtomicUsize,
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl RunState {
    fn begin(&self, total: usize) {
        self.processed.store(0, Ordering::SeqCst);
        self.succeeded.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn record(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> RunProgress {
        RunProgress {
            processed: self.processed.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
        }
    }
}

/// Holds the run-exclusivity flag for as long as it lives.
struct RunGuard {
    state: Arc<RunState>,
}

impl RunGuard {
    fn acquire(state: &Arc<RunState>) -> Option<Self> {
        state
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            state: Arc::clone(state),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.active.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ItemSuccess {
    event: Option<(ChangeKind, DispatchReport)>,
    history_written: bool,
}

type ItemOutcome = std::result::Result<ItemSuccess, ItemError>;

/// Everything an item task needs, detached from the orchestrator.
#[derive(Clone)]
struct TaskContext {
    repository: Arc<dyn ItemRepository>,
    ledger: Arc<dyn HistoryLedger>,
    adapters: Arc<AdapterRegistry>,
    detector: Arc<ChangeDetector>,
    state: Arc<RunState>,
}

/// Drives runs over every tracked item: fetch, merge, classify, persist and
/// record history, with bounded concurrency and a launch throttle.
pub struct ScrapeOrchestrator {
    repository: Arc<dyn ItemRepository>,
    ledger: Arc<dyn HistoryLedger>,
    adapters: Arc<AdapterRegistry>,
    detector: ChangeDetector,
    settings: OrchestratorSettings,
    state: Arc<RunState>,
}

impl ScrapeOrchestrator {
    pub fn new(
        repository: Arc<dyn ItemRepository>,
        ledger: Arc<dyn HistoryLedger>,
        adapters: AdapterRegistry,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            repository,
            ledger,
            adapters: Arc::new(adapters),
            detector: ChangeDetector::new(),
            settings: OrchestratorSettings {
                max_concurrent: settings.max_concurrent.max(1),
                ..settings
            },
            state: Arc::new(RunState::default()),
        }
    }

    /// Add a sink to the fan-out list. Only configured sinks are accepted.
    /// Sinks are fixed for the duration of each run.
    pub fn register_sink(&mut self, sink: NotificationSinkRef) -> bool {
        self.detector.register(sink)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.detector.sink_names()
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.settings
    }

    /// Current (or most recent) run's counters. Never blocks.
    pub fn get_progress(&self) -> RunProgress {
        self.state.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Run one pass and return the number of items processed; 0 if another
    /// run was already active.
    pub async fn run_once(&self) -> Result<usize> {
        Ok(self.run().await?.processed)
    }

    /// Run one pass over all tracked items.
    ///
    /// Per-item failures are counted, never returned. Only a failure to load
    /// the item list ends the run with an error.
    pub async fn run(&self) -> Result<RunSummary> {
        let Some(_guard) = RunGuard::acquire(&self.state) else {
            tracing::info!("A run is already in progress, skipping");
            return Ok(RunSummary::skipped());
        };

        let started = Instant::now();
        let mut summary = RunSummary::new(Uuid::new_v4());

        let items = self.repository.load_all().await?;
        if items.is_empty() {
            tracing::info!("No tracked items, nothing to do");
            return Ok(summary);
        }

        let total = items.len();
        self.state.begin(total);

        let throttle = launch_throttle(self.settings.scrape_delay_seconds, self.settings.max_concurrent);
        tracing::info!(
            "Run {} started: {} items, concurrency {}, throttle {:?}",
            summary.run_id,
            total,
            self.settings.max_concurrent,
            throttle
        );

        let context = TaskContext {
            repository: Arc::clone(&self.repository),
            ledger: Arc::clone(&self.ledger),
            adapters: Arc::clone(&self.adapters),
            detector: Arc::new(self.detector.clone()),
            state: Arc::clone(&self.state),
        };
        let slots = Arc::new(Semaphore::new(self.settings.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            while let Some(joined) = tasks.try_join_next() {
                Self::collect(&mut summary, &self.state, joined);
            }

            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(format!("concurrency limiter closed: {}", e)))?;

            let context = context.clone();
            tasks.spawn(async move {
                let item_id = item.id;
                let outcome = run_item_task(context.clone(), item).await;
                context.state.record(outcome.is_ok());
                drop(permit);
                (item_id, outcome)
            });

            if let Some(delay) = throttle {
                if index + 1 < total {
                    tracing::debug!("Throttling next launch by {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::collect(&mut summary, &self.state, joined);
        }

        let elapsed = started.elapsed();
        summary.duration_ms = elapsed.as_millis() as u64;
        histogram!("bluray_watcher_run_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            "Run {} finished in {:.1}s: {} processed, {} succeeded, {} failed, {} events, {} notifications",
            summary.run_id,
            elapsed.as_secs_f64(),
            summary.processed,
            summary.succeeded,
            summary.failed,
            summary.events_detected,
            summary.notifications_dispatched
        );

        Ok(summary)
    }

    fn collect(
        summary: &mut RunSummary,
        state: &RunState,
        joined: std::result::Result<(i64, ItemOutcome), JoinError>,
    ) {
        summary.processed += 1;

        let (item_id, outcome) = match joined {
            Ok(result) => result,
            Err(e) => {
                // The wrapper task itself died before recording progress
                state.record(false);
                summary.failed += 1;
                counter!("bluray_watcher_items_total", "outcome" => "aborted").increment(1);
                tracing::error!("Item task lost: {}", e);
                return;
            }
        };

        match outcome {
            Ok(success) => {
                summary.succeeded += 1;
                counter!("bluray_watcher_items_total", "outcome" => "succeeded").increment(1);
                if !success.history_written {
                    summary.history_failures += 1;
                }
                if let Some((_, report)) = success.event {
                    summary.events_detected += 1;
                    summary.notifications_dispatched += report.delivered;
                }
            }
            Err(e) => {
                summary.failed += 1;
                counter!("bluray_watcher_items_total", "outcome" => e.kind()).increment(1);
                tracing::warn!("Item {} failed: {}", item_id, e);
            }
        }
    }
}

/// Run the item pipeline on its own task so a panic surfaces as a failure
/// for this item only.
async fn run_item_task(context: TaskContext, item: TrackedItem) -> ItemOutcome {
    let item_id = item.id;
    match tokio::spawn(process_item(context, item)).await {
        Ok(outcome) => outcome,
        Err(e) => Err(ItemError::TaskAborted {
            item_id,
            reason: e.to_string(),
        }),
    }
}

async fn process_item(context: TaskContext, item: TrackedItem) -> ItemOutcome {
    let adapter = context
        .adapters
        .resolve(&item.url)
        .ok_or_else(|| ItemError::NoAdapterAvailable { url: item.url.clone() })?;

    let snapshot = match adapter.fetch(&item.url).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            return Err(ItemError::FetchFailure {
                url: item.url.clone(),
                reason: format!("{} returned no data", adapter.name()),
            });
        }
        Err(e) => {
            return Err(ItemError::FetchFailure {
                url: item.url.clone(),
                reason: e.to_string(),
            });
        }
    };

    let merged = merge_snapshot(&item, &snapshot);
    if merged.suspect_zero_price {
        tracing::warn!(
            "Item {} reported in stock without a price, keeping €{:.2} ({})",
            item.id,
            item.current_price,
            item.url
        );
    }

    let detection = context.detector.detect(&item, &merged.item).await;

    match context.repository.record_scrape(&merged.item).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::error!("Item {} disappeared before it could be saved", item.id);
            return Err(ItemError::PersistenceFailure {
                item_id: item.id,
                reason: "item no longer exists".to_string(),
            });
        }
        Err(e) => {
            tracing::error!("Failed to save item {}: {}", item.id, e);
            return Err(ItemError::PersistenceFailure {
                item_id: item.id,
                reason: e.to_string(),
            });
        }
    }

    let history_written = match context
        .ledger
        .append(item.id, merged.item.current_price, merged.item.in_stock)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Item {} saved but its history entry was not written: {}", item.id, e);
            false
        }
    };

    tracing::debug!(
        "Item {} checked: {} field(s) changed",
        item.id,
        merged.changed.len()
    );

    Ok(ItemSuccess {
        event: detection.map(|d| (d.event.kind, d.report)),
        history_written,
    })
}
