//! Fan-out job aggregation across registered scrapers.
//!
//! The registry is reader-many/writer-one: aggregation snapshots it under a
//! read lock; register/unregister take the write lock. One failing scraper
//! never cancels the others — per-source failures are collected into the
//! run report.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::job::{ScrapeSource, ScrapedJob};
use crate::repository::JobStore;
use crate::scrapers::{skills, JobScraper};

/// Upper bound for a whole aggregation run and for each per-source task.
const SCRAPE_DEADLINE: Duration = Duration::from_secs(10 * 60);
/// Delay between task starts, so sources are not all hit at once.
const SCRAPE_STAGGER: Duration = Duration::from_secs(2);
/// Per-source cap on jobs fetched in one run.
const MAX_JOBS_PER_SOURCE: usize = 100;

/// One source's failure within an aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Outcome of an aggregation run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AggregationReport {
    pub upserted: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<SourceFailure>,
}

impl AggregationReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AggregationService {
    jobs: Arc<dyn JobStore>,
    scrapers: RwLock<HashMap<String, Arc<dyn JobScraper>>>,
    last_scraped: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AggregationService {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self {
            jobs,
            scrapers: RwLock::new(HashMap::new()),
            last_scraped: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, scraper: Arc<dyn JobScraper>) {
        let mut registry = self.scrapers.write().await;
        registry.insert(scraper.name().to_string(), scraper);
    }

    pub async fn unregister(&self, name: &str) {
        let mut registry = self.scrapers.write().await;
        registry.remove(name);
    }

    /// Lists registered sources for the API surface.
    pub async fn sources(&self) -> Vec<ScrapeSource> {
        let registry = self.scrapers.read().await;
        let last_scraped = self.last_scraped.read().await;
        let mut sources: Vec<ScrapeSource> = registry
            .values()
            .map(|scraper| ScrapeSource {
                name: scraper.name().to_string(),
                base_url: scraper.base_url().to_string(),
                is_active: true,
                rate_limit_rpm: scraper.rate_limit_rpm(),
                last_scraped_at: last_scraped.get(scraper.name()).copied(),
            })
            .collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        sources
    }

    /// Runs every registered scraper concurrently, staggered, each under its
    /// own deadline, and upserts the enriched results per source.
    pub async fn aggregate_all(&self, ctx: &CancellationToken) -> AggregationReport {
        let snapshot: Vec<Arc<dyn JobScraper>> = {
            let registry = self.scrapers.read().await;
            registry.values().cloned().collect()
        };

        let mut tasks: JoinSet<(String, Result<usize, AppError>)> = JoinSet::new();
        for (index, scraper) in snapshot.into_iter().enumerate() {
            let jobs = Arc::clone(&self.jobs);
            let ctx = ctx.clone();
            let stagger = SCRAPE_STAGGER * index as u32;
            // Each task gets whatever remains of the run deadline after its
            // staggered start.
            let deadline = SCRAPE_DEADLINE.saturating_sub(stagger);
            tasks.spawn(async move {
                let name = scraper.name().to_string();
                tokio::select! {
                    _ = tokio::time::sleep(stagger) => {}
                    _ = ctx.cancelled() => return (name, Err(AppError::Cancelled)),
                }
                let result = aggregate_one(&*scraper, jobs.as_ref(), &ctx, deadline).await;
                (name, result)
            });
        }

        let mut report = AggregationReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Ok(count))) => {
                    info!(source = %source, upserted = count, "aggregated source");
                    self.last_scraped
                        .write()
                        .await
                        .insert(source.clone(), Utc::now());
                    report.upserted += count;
                    report.succeeded.push(source);
                }
                Ok((source, Err(e))) => {
                    warn!(source = %source, "aggregation failed: {e}");
                    report.failed.push(SourceFailure {
                        source,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("aggregation task panicked: {e}");
                    report.failed.push(SourceFailure {
                        source: "<unknown>".to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.succeeded.sort();
        report
    }

    /// Runs the pipeline for a single named source. Unknown names fail fast.
    pub async fn aggregate_from(
        &self,
        ctx: &CancellationToken,
        source_name: &str,
    ) -> Result<usize, AppError> {
        let scraper = {
            let registry = self.scrapers.read().await;
            registry.get(source_name).cloned()
        }
        .ok_or_else(|| {
            AppError::SourceUnavailable(format!("no scraper registered for '{source_name}'"))
        })?;

        let count = aggregate_one(&*scraper, self.jobs.as_ref(), ctx, SCRAPE_DEADLINE).await?;
        self.last_scraped
            .write()
            .await
            .insert(source_name.to_string(), Utc::now());
        Ok(count)
    }
}

/// Scrape one source, enrich, and bulk-upsert. Shared by both entry points.
async fn aggregate_one(
    scraper: &dyn JobScraper,
    jobs: &dyn JobStore,
    ctx: &CancellationToken,
    deadline: Duration,
) -> Result<usize, AppError> {
    let scraped = tokio::time::timeout(deadline, scraper.scrape(ctx, MAX_JOBS_PER_SOURCE))
        .await
        .map_err(|_| {
            AppError::SourceUnavailable(format!("{}: scrape deadline exceeded", scraper.name()))
        })??;

    if scraped.is_empty() {
        info!(source = %scraper.name(), "no jobs found");
        return Ok(0);
    }

    let enriched: Vec<ScrapedJob> = scraped
        .into_iter()
        .map(|mut job| {
            job.extracted_skills = skills::enrich(&job);
            job
        })
        .collect();

    let outcome = jobs.bulk_upsert(&enriched).await?;
    if outcome.failed > 0 {
        warn!(
            source = %scraper.name(),
            failed = outcome.failed,
            "some documents were skipped during upsert"
        );
    }
    Ok(outcome.upserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FailingScraper, InMemoryJobStore, StaticScraper};

    fn scraped(url: &str, title: &str) -> ScrapedJob {
        ScrapedJob {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            description: "Rust and PostgreSQL".to_string(),
            apply_url: url.to_string(),
            source: "test".to_string(),
            posted_at: Utc::now(),
            is_sponsorship_available: false,
            extracted_skills: Vec::new(),
            tags: Vec::new(),
            salary: None,
            source_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_reports_only_failed_source() {
        let store = Arc::new(InMemoryJobStore::default());
        let service = AggregationService::new(store.clone());

        service
            .register(Arc::new(StaticScraper::new(
                "S1",
                vec![scraped("https://a/1", "A")],
            )))
            .await;
        service
            .register(Arc::new(FailingScraper::new("S2", "listing returned 503")))
            .await;
        service
            .register(Arc::new(StaticScraper::new(
                "S3",
                vec![scraped("https://c/1", "C")],
            )))
            .await;

        let ctx = CancellationToken::new();
        let report = service.aggregate_all(&ctx).await;

        assert_eq!(report.succeeded, vec!["S1".to_string(), "S3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source, "S2");
        assert_eq!(report.upserted, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_aggregate_from_unknown_source_fails_fast() {
        let service = AggregationService::new(Arc::new(InMemoryJobStore::default()));
        let ctx = CancellationToken::new();
        let err = service.aggregate_from(&ctx, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_aggregate_from_enriches_before_upsert() {
        let store = Arc::new(InMemoryJobStore::default());
        let service = AggregationService::new(store.clone());
        service
            .register(Arc::new(StaticScraper::new(
                "S1",
                vec![scraped("https://a/1", "Backend Engineer")],
            )))
            .await;

        let ctx = CancellationToken::new();
        let count = service.aggregate_from(&ctx, "S1").await.unwrap();
        assert_eq!(count, 1);

        let job = store.get_by_apply_url("https://a/1").await.unwrap().unwrap();
        assert!(job.extracted_skills.contains(&"rust".to_string()));
        assert!(job.extracted_skills.contains(&"postgresql".to_string()));
    }

    #[tokio::test]
    async fn test_sources_reflect_registry_and_last_scraped() {
        let service = AggregationService::new(Arc::new(InMemoryJobStore::default()));
        service
            .register(Arc::new(StaticScraper::new("Alpha", vec![])))
            .await;
        service
            .register(Arc::new(StaticScraper::new("Beta", vec![])))
            .await;

        let sources = service.sources().await;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "Alpha");
        assert!(sources[0].last_scraped_at.is_none());

        let ctx = CancellationToken::new();
        service.aggregate_from(&ctx, "Alpha").await.unwrap();
        let sources = service.sources().await;
        assert!(sources[0].last_scraped_at.is_some());

        service.unregister("Beta").await;
        assert_eq!(service.sources().await.len(), 1);
    }
}
