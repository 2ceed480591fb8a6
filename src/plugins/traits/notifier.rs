use async_trait::async_trait;

use crate::models::ChangeEvent;
use crate::utils::error::Result;

/// A delivery channel (webhook, email, ...) for eligible change events.
///
/// Only sinks reporting `is_configured() == true` are accepted for fan-out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &'static str;

    /// Whether a destination (address, webhook, ...) is set up
    fn is_configured(&self) -> bool;

    /// Deliver one event
    async fn notify(&self, event: &ChangeEvent) -> Result<()>;
}
