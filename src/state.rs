use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::aggregator::AggregationService;
use crate::config::Config;
use crate::cvproc::queue::CvQueue;
use crate::matching::MatchingService;
use crate::repository::{CvStore, JobStore, UserDirectory};
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum
/// extractors. Everything behind a trait object can be swapped at startup
/// (and by tests).
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub cvs: Arc<dyn CvStore>,
    pub users: Arc<dyn UserDirectory>,
    pub aggregator: Arc<AggregationService>,
    pub matcher: Arc<MatchingService>,
    pub cv_queue: Arc<dyn CvQueue>,
    /// Absent when object storage is not configured; CV uploads then
    /// return a storage error instead of accepting files.
    pub storage: Option<Arc<dyn ObjectStore>>,
    pub config: Config,
    /// Process-wide shutdown signal; admin-triggered aggregation runs are
    /// parented to it.
    pub shutdown: CancellationToken,
}
