use bluray_watcher::AppConfig;
use std::io::Write;

fn config_file(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_default_configuration_is_valid() {
    let config = AppConfig::default();

    assert!(config.validate().is_ok());
    assert!(!config.database.url.is_empty());
    assert!(config.scraper.max_concurrent_checks > 0);
    assert!(AppConfig::is_valid_cron(&config.scheduler.run_interval));
    assert!(!config.metrics.enabled);
}

#[test]
fn test_explicit_file_overrides_defaults() -> anyhow::Result<()> {
    let file = config_file(
        r#"
[scraper]
max_concurrent_checks = 2
scrape_delay_seconds = 3
allowed_hosts = ["bol.com", "amazon.nl"]

[notifications.discord]
webhook_url = "https://discord.test/api/webhooks/1/abc"
"#,
    )?;

    let config = AppConfig::load(Some(file.path()))?;
    assert_eq!(config.scraper.max_concurrent_checks, 2);
    assert_eq!(config.scraper.scrape_delay_seconds, 3);
    assert_eq!(config.scraper.allowed_hosts, vec!["bol.com", "amazon.nl"]);
    assert_eq!(
        config.notifications.discord.webhook_url.as_deref(),
        Some("https://discord.test/api/webhooks/1/abc")
    );
    // Untouched sections keep their defaults
    assert_eq!(config.notifications.smtp.port, 587);
    Ok(())
}

#[test]
fn test_invalid_file_is_rejected() -> anyhow::Result<()> {
    let bad_cron = config_file("[scheduler]\nrun_interval = \"*/5 * * * *\"\n")?;
    assert!(AppConfig::load(Some(bad_cron.path())).is_err());

    let no_workers = config_file("[scraper]\nmax_concurrent_checks = 0\n")?;
    assert!(AppConfig::load(Some(no_workers.path())).is_err());
    Ok(())
}
