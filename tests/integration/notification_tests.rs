use super::*;
use bluray_watcher::plugins::initialize_default_plugins;
use bluray_watcher::AppConfig;

async fn webhook_payloads(webhook: &MockServer) -> Vec<serde_json::Value> {
    webhook
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| serde_json::from_slice(&request.body).ok())
        .collect()
}

#[tokio::test]
async fn test_price_drop_below_threshold_notifies() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_page(&shop, "/film/the-thing", &product_page("The Thing 4K UHD", "19,99", "in stock")).await;
    mount_webhook(&webhook, 204).await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/the-thing", shop.uri()), 25.0).await?;
    seed_state(&store, &item, 34.99, true).await?;

    let mut orchestrator = orchestrator(&store)?;
    orchestrator.register_sink(discord_sink(&webhook));

    let summary = orchestrator.run().await?;
    assert_eq!(summary.events_detected, 1);
    assert_eq!(summary.notifications_dispatched, 1);

    let payloads = webhook_payloads(&webhook).await;
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert!(payload["content"].as_str().unwrap_or_default().contains("Price Alert"));

    let embed = &payload["embeds"][0];
    assert_eq!(embed["title"], "The Thing 4K UHD");
    assert_eq!(embed["color"], 0x00ff00);
    let fields = embed["fields"].as_array().cloned().unwrap_or_default();
    assert!(fields
        .iter()
        .any(|field| field["name"] == "Current Price" && field["value"] == "€19.99"));
    assert!(fields
        .iter()
        .any(|field| field["name"] == "Your Max Price" && field["value"] == "€25.00"));
    Ok(())
}

#[tokio::test]
async fn test_price_change_above_threshold_is_silent() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_page(&shop, "/film/heat", &product_page("Heat", "28.00", "in stock")).await;
    mount_webhook(&webhook, 204).await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/heat", shop.uri()), 25.0).await?;
    seed_state(&store, &item, 30.0, true).await?;

    let mut orchestrator = orchestrator(&store)?;
    orchestrator.register_sink(discord_sink(&webhook));

    let summary = orchestrator.run().await?;
    assert_eq!(summary.events_detected, 1);
    assert_eq!(summary.notifications_dispatched, 0);
    assert!(webhook_payloads(&webhook).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_restock_notifies_once() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_page(&shop, "/film/alien", &product_page("Alien", "39.99", "in stock")).await;
    mount_webhook(&webhook, 204).await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/alien", shop.uri()), 25.0).await?;
    seed_state(&store, &item, 39.99, false).await?;

    let mut orchestrator = orchestrator(&store)?;
    orchestrator.register_sink(discord_sink(&webhook));

    let first = orchestrator.run().await?;
    assert_eq!(first.events_detected, 1);
    assert_eq!(first.notifications_dispatched, 1);

    // Same page again: nothing moved, nothing to report
    let second = orchestrator.run().await?;
    assert_eq!(second.events_detected, 0);
    assert_eq!(second.notifications_dispatched, 0);

    let payloads = webhook_payloads(&webhook).await;
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0]["content"].as_str().unwrap_or_default().contains("Back in Stock"));
    Ok(())
}

#[tokio::test]
async fn test_muted_item_is_not_notified() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_page(&shop, "/film/ran", &product_page("Ran", "15.00", "in stock")).await;
    mount_webhook(&webhook, 204).await;

    let store = memory_store().await?;
    let item = store
        .insert(NewTrackedItem {
            url: format!("{}/film/ran", shop.uri()),
            title: None,
            desired_max_price: 20.0,
            notify_on_price_drop: Some(false),
            notify_on_stock: Some(false),
            lock_title: false,
        })
        .await?;
    seed_state(&store, &item, 30.0, false).await?;

    let mut orchestrator = orchestrator(&store)?;
    orchestrator.register_sink(discord_sink(&webhook));

    // Both rules are off, so only the informational price change remains
    let summary = orchestrator.run().await?;
    assert_eq!(summary.events_detected, 1);
    assert_eq!(summary.notifications_dispatched, 0);
    assert!(webhook_payloads(&webhook).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_webhook_failure_does_not_fail_item() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_page(&shop, "/film/the-thing", &product_page("The Thing", "19.99", "in stock")).await;
    mount_webhook(&webhook, 500).await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/the-thing", shop.uri()), 25.0).await?;
    seed_state(&store, &item, 34.99, true).await?;

    let mut orchestrator = orchestrator(&store)?;
    orchestrator.register_sink(discord_sink(&webhook));

    let summary = orchestrator.run().await?;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.events_detected, 1);
    assert_eq!(summary.notifications_dispatched, 0);

    // The item state still advanced
    assert_eq!(store_item(&store, item.id).await?.current_price, 19.99);
    Ok(())
}

#[tokio::test]
async fn test_stalled_webhook_does_not_hang_run() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_page(&shop, "/film/alien", &product_page("Alien", "39.99", "in stock")).await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204).set_delay(std::time::Duration::from_secs(3600)))
        .mount(&webhook)
        .await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/alien", shop.uri()), 25.0).await?;
    seed_state(&store, &item, 39.99, false).await?;

    let mut orchestrator = orchestrator(&store)?;
    orchestrator.register_sink(discord_sink_with_timeout(&webhook, 1));

    let summary = tokio::time::timeout(std::time::Duration::from_secs(10), orchestrator.run()).await??;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.events_detected, 1);
    assert_eq!(summary.notifications_dispatched, 0);

    // The run guard was released, so the next run goes ahead
    assert!(!orchestrator.is_running());
    assert!(store_item(&store, item.id).await?.in_stock);
    Ok(())
}

#[tokio::test]
async fn test_only_configured_default_sinks_register() -> anyhow::Result<()> {
    let store = memory_store().await?;

    let mut config = AppConfig::default();
    config.scraper = test_scraper_config();

    let plugins = initialize_default_plugins(&config)?;
    let mut bare = ScrapeOrchestrator::new(
        store.clone(),
        store.clone(),
        plugins.adapters,
        OrchestratorSettings::from(&config.scraper),
    );
    for sink in plugins.sinks {
        assert!(!bare.register_sink(sink));
    }
    assert!(bare.sink_names().is_empty());

    config.notifications.discord.webhook_url = Some("https://discord.test/api/webhooks/1/abc".to_string());
    let plugins = initialize_default_plugins(&config)?;
    let mut wired = orchestrator(&store)?;
    for sink in plugins.sinks {
        wired.register_sink(sink);
    }
    assert_eq!(wired.sink_names(), vec!["discord"]);
    Ok(())
}
