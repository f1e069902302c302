//! Scraper capability surface.
//!
//! Each source implements `JobScraper`; the aggregation service owns the
//! registry and fans out over it. Scrapers fetch and normalize only — they
//! never persist.

pub mod board;
pub mod remote_feed;
pub mod skills;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::AppError;
use crate::models::job::ScrapedJob;

pub use crate::limiter::TokenBucket;

/// HTTP timeout applied to every outbound scraper request.
pub const SCRAPE_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A single job source.
///
/// Contract: `scrape` is cancellable through `ctx` and may legally return
/// fewer than `max_jobs` (source exhausted). Every returned job carries a
/// non-empty `apply_url` and `source == name()`.
#[async_trait]
pub trait JobScraper: Send + Sync {
    fn name(&self) -> &str;
    fn base_url(&self) -> &str;
    fn rate_limit_rpm(&self) -> u32;
    async fn scrape(
        &self,
        ctx: &CancellationToken,
        max_jobs: usize,
    ) -> Result<Vec<ScrapedJob>, AppError>;
}
