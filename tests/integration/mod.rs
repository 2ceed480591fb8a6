// Shared fixtures for the integration tests

pub mod config_tests;
pub mod notification_tests;
pub mod orchestrator_tests;

use std::sync::Arc;

use bluray_watcher::config::{DatabaseConfig, DiscordConfig, ScraperConfig};
use bluray_watcher::models::{HistoryEntry, NewTrackedItem, TrackedItem};
use bluray_watcher::plugins::adapters::OpenGraphAdapter;
use bluray_watcher::plugins::notifiers::DiscordSink;
use bluray_watcher::plugins::{AdapterRegistry, NotificationSinkRef};
use bluray_watcher::{HistoryLedger, ItemRepository, OrchestratorSettings, ScrapeOrchestrator, SqliteStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn test_scraper_config() -> ScraperConfig {
    ScraperConfig {
        max_concurrent_checks: 4,
        scrape_delay_seconds: 0,
        request_timeout: 5,
        user_agent: "BlurayWatcher-Test/1.0".to_string(),
        allowed_hosts: Vec::new(),
    }
}

pub async fn memory_store() -> anyhow::Result<Arc<SqliteStore>> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    Ok(Arc::new(SqliteStore::connect(&config).await?))
}

pub fn open_graph_registry(config: &ScraperConfig) -> anyhow::Result<AdapterRegistry> {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(OpenGraphAdapter::new(config)?));
    Ok(adapters)
}

/// Orchestrator over `store` with the OpenGraph adapter, no throttle and no sinks
pub fn orchestrator(store: &Arc<SqliteStore>) -> anyhow::Result<ScrapeOrchestrator> {
    let config = test_scraper_config();
    Ok(ScrapeOrchestrator::new(
        store.clone(),
        store.clone(),
        open_graph_registry(&config)?,
        OrchestratorSettings::from(&config),
    ))
}

pub fn discord_sink(webhook: &MockServer) -> NotificationSinkRef {
    discord_sink_with_timeout(webhook, DiscordConfig::default().timeout_seconds)
}

pub fn discord_sink_with_timeout(webhook: &MockServer, timeout_seconds: u64) -> NotificationSinkRef {
    let sink = DiscordSink::new(DiscordConfig {
        webhook_url: Some(format!("{}/webhook", webhook.uri())),
        timeout_seconds,
        ..DiscordConfig::default()
    })
    .expect("discord client");
    Arc::new(sink)
}

pub async fn track(store: &Arc<SqliteStore>, url: &str, max_price: f64) -> anyhow::Result<TrackedItem> {
    Ok(store
        .insert(NewTrackedItem {
            url: url.to_string(),
            title: None,
            desired_max_price: max_price,
            notify_on_price_drop: None,
            notify_on_stock: None,
            lock_title: false,
        })
        .await?)
}

/// Overwrite an item's last known price and stock, as if an earlier run saw them
pub async fn seed_state(
    store: &Arc<SqliteStore>,
    item: &TrackedItem,
    price: f64,
    in_stock: bool,
) -> anyhow::Result<()> {
    let mut seeded = item.clone();
    seeded.current_price = price;
    seeded.in_stock = in_stock;
    assert!(store.save(&seeded).await?);
    Ok(())
}

pub async fn store_item(store: &Arc<SqliteStore>, id: i64) -> anyhow::Result<TrackedItem> {
    store
        .find_by_id(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("item {} missing", id))
}

pub async fn ledger_history(store: &Arc<SqliteStore>, id: i64) -> anyhow::Result<Vec<HistoryEntry>> {
    Ok(store.history(id, 30).await?)
}

pub fn product_page(title: &str, price: &str, availability: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>{title} | Test Shop</title>
  <meta property="og:title" content="{title}">
  <meta property="og:image" content="https://img.example.com/cover.jpg">
  <meta property="product:price:amount" content="{price}">
  <meta property="product:availability" content="{availability}">
</head>
<body><h1>{title}</h1></body>
</html>"#
    )
}

pub async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
        .mount(server)
        .await;
}

pub async fn mount_webhook(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
