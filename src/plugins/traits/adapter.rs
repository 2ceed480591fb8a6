use async_trait::async_trait;

use crate::models::ScrapedSnapshot;
use crate::utils::error::Result;

/// A pluggable fetcher for one family of product pages.
///
/// Adapters are stateless per call: `can_handle` must be cheap and side-effect
/// free, `fetch` performs the network round trip. `Ok(None)` means the page was
/// reachable but yielded no usable product data.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;

    /// Whether this adapter claims the URL
    fn can_handle(&self, url: &str) -> bool;

    /// Fetch a point-in-time snapshot of the product behind `url`
    async fn fetch(&self, url: &str) -> Result<Option<ScrapedSnapshot>>;
}
