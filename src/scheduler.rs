use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::{AppConfig, SchedulerConfig};
use crate::core::ScrapeOrchestrator;
use crate::models::RunSummary;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStats {
    /// Runs that actually went ahead (completed or failed)
    pub runs_started: u64,
    /// Ticks that found another run active
    pub runs_skipped: u64,
    pub runs_failed: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_summary: Option<RunSummary>,
    pub last_error: Option<String>,
    pub uptime_seconds: u64,
}

/// Triggers orchestrator runs on a cron schedule.
pub struct RunScheduler {
    scheduler: JobScheduler,
    orchestrator: Arc<ScrapeOrchestrator>,
    stats: Arc<RwLock<SchedulerStats>>,
    config: SchedulerConfig,
    job_id: Option<Uuid>,
    start_time: DateTime<Utc>,
}

impl RunScheduler {
    pub async fn new(orchestrator: Arc<ScrapeOrchestrator>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            orchestrator,
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            config,
            job_id: None,
            start_time: Utc::now(),
        })
    }

    /// Register the periodic run (when enabled) and start ticking.
    pub async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled, no periodic runs");
            return Ok(());
        }

        if !AppConfig::is_valid_cron(&self.config.run_interval) {
            return Err(anyhow!("Invalid cron expression: {}", self.config.run_interval));
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let stats = Arc::clone(&self.stats);

        let job = Job::new_async(self.config.run_interval.as_str(), move |_uuid, _l| {
            let orchestrator = Arc::clone(&orchestrator);
            let stats = Arc::clone(&stats);

            Box::pin(async move {
                tracing::debug!("Scheduled run triggered");
                if let Err(e) = Self::execute_run(orchestrator, stats).await {
                    tracing::error!("Scheduled run failed: {}", e);
                }
            })
        })?;

        let job_id = self.scheduler.add(job).await?;
        self.job_id = Some(job_id);
        self.scheduler.start().await?;

        tracing::info!("Run scheduler started with interval: {}", self.config.run_interval);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(job_id) = self.job_id.take() {
            self.scheduler.remove(&job_id).await?;
        }
        self.scheduler.shutdown().await?;
        tracing::info!("Run scheduler shutdown");
        Ok(())
    }

    /// Run immediately, outside the schedule. Counted like a scheduled tick.
    pub async fn trigger_now(&self) -> Result<RunSummary> {
        Self::execute_run(Arc::clone(&self.orchestrator), Arc::clone(&self.stats)).await
    }

    pub fn is_scheduled(&self) -> bool {
        self.job_id.is_some()
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let mut stats = self.stats.read().await.clone();
        let uptime = Utc::now().signed_duration_since(self.start_time);
        stats.uptime_seconds = uptime.num_seconds().max(0) as u64;
        stats
    }

    async fn execute_run(
        orchestrator: Arc<ScrapeOrchestrator>,
        stats: Arc<RwLock<SchedulerStats>>,
    ) -> Result<RunSummary> {
        let result = orchestrator.run().await;

        let mut stats = stats.write().await;
        match &result {
            Ok(summary) if summary.skipped => {
                stats.runs_skipped += 1;
                tracing::info!("Skipped run: previous run still active");
            }
            Ok(summary) => {
                stats.runs_started += 1;
                stats.last_run = Some(summary.started_at);
                stats.last_summary = Some(summary.clone());
            }
            Err(e) => {
                stats.runs_started += 1;
                stats.runs_failed += 1;
                stats.last_run = Some(Utc::now());
                stats.last_error = Some(e.to_string());
            }
        }

        Ok(result?)
    }
}
