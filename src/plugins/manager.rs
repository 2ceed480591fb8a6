use std::sync::Arc;

use super::adapters::OpenGraphAdapter;
use super::notifiers::{DiscordSink, EmailSink};
use super::traits::{NotificationSink, SourceAdapter};
use crate::config::AppConfig;
use crate::utils::error::Result;

pub type SourceAdapterRef = Arc<dyn SourceAdapter>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;

/// Ordered list of source adapters. Resolution tries adapters in registration
/// order and the first one that claims the URL wins.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<SourceAdapterRef>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter after all previously registered ones
    pub fn register(&mut self, adapter: SourceAdapterRef) {
        tracing::debug!("Registered source adapter: {}", adapter.name());
        self.adapters.push(adapter);
    }

    /// Find the first adapter that can handle `url`
    pub fn resolve(&self, url: &str) -> Option<SourceAdapterRef> {
        self.adapters
            .iter()
            .find(|adapter| adapter.can_handle(url))
            .map(Arc::clone)
    }

    /// List adapter names in resolution order
    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// The built-in plugin set, ready to hand to the orchestrator.
pub struct DefaultPlugins {
    pub adapters: AdapterRegistry,
    /// Candidate sinks; unconfigured ones are rejected at registration.
    pub sinks: Vec<NotificationSinkRef>,
}

/// Build the built-in adapters and sinks from configuration
pub fn initialize_default_plugins(config: &AppConfig) -> Result<DefaultPlugins> {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(OpenGraphAdapter::new(&config.scraper)?));

    let sinks: Vec<NotificationSinkRef> = vec![
        Arc::new(DiscordSink::new(config.notifications.discord.clone())?),
        Arc::new(EmailSink::new(config.notifications.smtp.clone())),
    ];

    Ok(DefaultPlugins { adapters, sinks })
}
