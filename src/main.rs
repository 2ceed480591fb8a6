use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bluray_watcher::config::{LoggingConfig, MetricsConfig};
use bluray_watcher::models::{NewTrackedItem, RunSummary, UpdateTrackedItem};
use bluray_watcher::plugins::initialize_default_plugins;
use bluray_watcher::{
    AppConfig, HistoryLedger, ItemRepository, OrchestratorSettings, RunScheduler, ScrapeOrchestrator,
    SqliteStore,
};

#[derive(Parser)]
#[command(name = "bluray-watcher")]
#[command(version, about = "Watches Blu-ray wishlist items for price drops and restocks")]
struct Cli {
    /// Extra configuration file layered over config/default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every tracked item once
    Run,

    /// Check tracked items on the configured schedule until Ctrl-C
    Watch {
        /// Start with an immediate run
        #[arg(long)]
        now: bool,
    },

    /// Start tracking a product page
    Add {
        url: String,

        /// Alert when the price drops to or below this
        #[arg(short, long)]
        max_price: f64,

        /// Fixed title; scrapes will not overwrite it
        #[arg(short, long)]
        title: Option<String>,

        #[arg(long)]
        no_price_alerts: bool,

        #[arg(long)]
        no_stock_alerts: bool,
    },

    /// Change a tracked item's title or alert settings
    Edit {
        id: i64,

        /// New title; locks it against scrapes
        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        max_price: Option<f64>,

        /// Let scrapes update the title again
        #[arg(long)]
        unlock_title: bool,

        #[arg(long)]
        price_alerts: Option<bool>,

        #[arg(long)]
        stock_alerts: Option<bool>,
    },

    /// List tracked items
    List,

    /// Stop tracking an item
    Remove { id: i64 },

    /// Show recorded prices for an item
    History {
        id: i64,

        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("bluray_watcher={}", config.level))?,
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("failed to install Prometheus exporter")?;

    info!("Prometheus metrics exposed on port {}", config.port);
    Ok(())
}

fn build_orchestrator(config: &AppConfig, store: Arc<SqliteStore>) -> Result<ScrapeOrchestrator> {
    let plugins = initialize_default_plugins(config)?;

    let mut orchestrator = ScrapeOrchestrator::new(
        store.clone(),
        store,
        plugins.adapters,
        OrchestratorSettings::from(&config.scraper),
    );

    for sink in plugins.sinks {
        orchestrator.register_sink(sink);
    }

    Ok(orchestrator)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Run {}: {} processed, {} succeeded, {} failed in {:.1}s",
        summary.run_id,
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.duration_ms as f64 / 1000.0
    );
    println!(
        "  {} change(s) detected, {} notification(s) sent",
        summary.events_detected, summary.notifications_dispatched
    );
    if summary.history_failures > 0 {
        println!("  {} history entries could not be written", summary.history_failures);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;
    init_metrics(&config.metrics)?;

    let store = Arc::new(SqliteStore::connect(&config.database).await?);

    match cli.command {
        Commands::Run => {
            let orchestrator = build_orchestrator(&config, store)?;
            let summary = orchestrator.run().await?;
            print_summary(&summary);
        }

        Commands::Watch { now } => {
            info!("Starting Blu-ray Watcher...");
            let orchestrator = Arc::new(build_orchestrator(&config, store)?);
            let mut scheduler = RunScheduler::new(orchestrator, config.scheduler.clone()).await?;
            scheduler.start().await?;

            if now {
                let summary = scheduler.trigger_now().await?;
                print_summary(&summary);
            }

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await?;

            let stats = scheduler.get_stats().await;
            info!(
                "Scheduler ran {} time(s), {} skipped, {} failed over {}s",
                stats.runs_started, stats.runs_skipped, stats.runs_failed, stats.uptime_seconds
            );
        }

        Commands::Add {
            url,
            max_price,
            title,
            no_price_alerts,
            no_stock_alerts,
        } => {
            let lock_title = title.is_some();
            let item = store
                .insert(NewTrackedItem {
                    url,
                    title,
                    desired_max_price: max_price,
                    notify_on_price_drop: Some(!no_price_alerts),
                    notify_on_stock: Some(!no_stock_alerts),
                    lock_title,
                })
                .await?;

            println!("Tracking item {}: {}", item.id, item.url);
        }

        Commands::Edit {
            id,
            title,
            max_price,
            unlock_title,
            price_alerts,
            stock_alerts,
        } => {
            let mut item = store
                .find_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("No tracked item with id {}", id))?;

            let update = UpdateTrackedItem {
                title,
                desired_max_price: max_price,
                notify_on_price_drop: price_alerts,
                notify_on_stock: stock_alerts,
                title_locked: unlock_title.then_some(false),
            };
            validator::Validate::validate(&update)?;
            item.update(update);

            if !store.save(&item).await? {
                return Err(anyhow!("Item {} was removed while editing", id));
            }
            println!("Updated item {}: {}", item.id, item.display_title());
        }

        Commands::List => {
            let items = store.load_all().await?;
            if items.is_empty() {
                println!("No tracked items");
            }
            for item in items {
                let stock = if item.in_stock { "in stock" } else { "out of stock" };
                let checked = item
                    .last_checked
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>4}  €{:>7.2} (max €{:.2})  {:<12}  {}  [checked {}]",
                    item.id,
                    item.current_price,
                    item.desired_max_price,
                    stock,
                    item.display_title(),
                    checked
                );
            }
        }

        Commands::Remove { id } => {
            if store.delete(id).await? {
                println!("Stopped tracking item {}", id);
            } else {
                return Err(anyhow!("No tracked item with id {}", id));
            }
        }

        Commands::History { id, days } => {
            let item = store
                .find_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("No tracked item with id {}", id))?;
            let entries = store.history(id, days).await?;

            println!("{} ({} entries, last {} days)", item.display_title(), entries.len(), days);
            for entry in entries {
                println!(
                    "  {}  €{:.2}  {}",
                    entry.recorded_at.format("%Y-%m-%d %H:%M"),
                    entry.price,
                    if entry.in_stock { "in stock" } else { "out of stock" }
                );
            }
        }
    }

    Ok(())
}
