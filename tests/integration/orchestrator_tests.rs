use super::*;
use bluray_watcher::models::UpdateTrackedItem;
use std::time::Duration;

#[tokio::test]
async fn test_first_check_fills_in_item() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    mount_page(&shop, "/film/dune-part-two", &product_page("Dune: Part Two 4K UHD", "19.99", "InStock")).await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/dune-part-two", shop.uri()), 25.0).await?;

    let summary = orchestrator(&store)?.run().await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.history_failures, 0);

    let stored = store_item(&store, item.id).await?;
    assert_eq!(stored.title, "Dune: Part Two 4K UHD");
    assert!(!stored.title_locked);
    assert_eq!(stored.current_price, 19.99);
    assert!(stored.in_stock);
    assert!(stored.is_uhd_4k);
    assert_eq!(stored.image_url.as_deref(), Some("https://img.example.com/cover.jpg"));
    assert_eq!(stored.source, "127.0.0.1");
    assert!(stored.last_checked.is_some());

    assert_eq!(ledger_history(&store, item.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failing_pages_do_not_stop_the_run() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    mount_page(&shop, "/film/good", &product_page("Heat", "14,99", "in stock")).await;
    mount_page(&shop, "/film/empty", "<html><body>Nothing to see</body></html>").await;
    Mock::given(method("GET"))
        .and(path("/film/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&shop)
        .await;

    let store = memory_store().await?;
    let good = track(&store, &format!("{}/film/good", shop.uri()), 20.0).await?;
    let empty = track(&store, &format!("{}/film/empty", shop.uri()), 20.0).await?;
    let broken = track(&store, &format!("{}/film/broken", shop.uri()), 20.0).await?;

    let orchestrator = orchestrator(&store)?;
    let summary = orchestrator.run().await?;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);

    let progress = orchestrator.get_progress();
    assert!(!progress.active);
    assert_eq!(progress.total, 3);
    assert_eq!(progress.processed, 3);
    assert_eq!(progress.failed, 2);

    assert!(store_item(&store, good.id).await?.last_checked.is_some());
    assert!(store_item(&store, empty.id).await?.last_checked.is_none());
    assert!(store_item(&store, broken.id).await?.last_checked.is_none());
    assert!(ledger_history(&store, broken.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_locked_title_survives_scrape() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    mount_page(&shop, "/film/akira", &product_page("AKIRA (1988) - 4K Ultra HD + Blu-ray", "29.99", "in stock")).await;

    let store = memory_store().await?;
    let mut item = track(&store, &format!("{}/film/akira", shop.uri()), 30.0).await?;
    item.update(UpdateTrackedItem {
        title: Some("Akira 4K Steelbook".to_string()),
        ..Default::default()
    });
    store.save(&item).await?;

    orchestrator(&store)?.run().await?;

    let stored = store_item(&store, item.id).await?;
    assert_eq!(stored.title, "Akira 4K Steelbook");
    assert!(stored.title_locked);
    assert_eq!(stored.current_price, 29.99);
    Ok(())
}

#[tokio::test]
async fn test_edit_during_run_is_kept() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/film/stalker"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Stalker 4K UHD", "21.00", "in stock"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&shop)
        .await;

    let store = memory_store().await?;
    let item = track(&store, &format!("{}/film/stalker", shop.uri()), 30.0).await?;
    let orchestrator = orchestrator(&store)?;

    let (summary, edit) = tokio::join!(orchestrator.run(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut edited = store_item(&store, item.id).await?;
        edited.update(UpdateTrackedItem {
            title: Some("Stalker (Criterion)".to_string()),
            desired_max_price: Some(18.0),
            notify_on_stock: Some(false),
            ..Default::default()
        });
        store.save(&edited).await?;
        anyhow::Ok(())
    });
    edit?;
    assert_eq!(summary?.succeeded, 1);

    let stored = store_item(&store, item.id).await?;
    assert_eq!(stored.title, "Stalker (Criterion)");
    assert!(stored.title_locked);
    assert_eq!(stored.desired_max_price, 18.0);
    assert!(!stored.notify_on_stock);
    assert_eq!(stored.current_price, 21.0);
    assert!(stored.in_stock);
    Ok(())
}

#[tokio::test]
async fn test_url_without_adapter_fails_item() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    mount_page(&shop, "/film/heat", &product_page("Heat", "14.99", "in stock")).await;

    let store = memory_store().await?;
    track(&store, &format!("{}/film/heat", shop.uri()), 20.0).await?;

    let config = ScraperConfig {
        allowed_hosts: vec!["bol.com".to_string()],
        ..test_scraper_config()
    };
    let orchestrator = ScrapeOrchestrator::new(
        store.clone(),
        store.clone(),
        open_graph_registry(&config)?,
        OrchestratorSettings::from(&config),
    );

    let summary = orchestrator.run().await?;
    assert_eq!(summary.failed, 1);

    let requests = shop.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_run_is_skipped() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/film/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Blade Runner 4K", "24.99", "in stock"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&shop)
        .await;

    let store = memory_store().await?;
    track(&store, &format!("{}/film/slow", shop.uri()), 20.0).await?;
    let orchestrator = orchestrator(&store)?;

    let (first, second) = tokio::join!(orchestrator.run(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(orchestrator.is_running());
        orchestrator.run().await
    });

    let first = first?;
    let second = second?;
    assert!(!first.skipped);
    assert_eq!(first.processed, 1);
    assert!(second.skipped);
    assert_eq!(second.processed, 0);

    // The guard is released once the first run finishes
    assert!(!orchestrator.is_running());
    assert_eq!(orchestrator.run_once().await?, 1);
    Ok(())
}
