use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A single job posting. `apply_url` is the canonical external link and the
/// idempotency key for deduplication across scrapers.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub apply_url: String,
    pub source: String,
    pub posted_at: DateTime<Utc>,
    pub is_sponsorship_available: bool,
    /// Lower-cased, duplicate-free (case-insensitive) skill set.
    pub extracted_skills: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    /// Source-specific listing id, when the feed provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Computed at read time against a user's preferences; never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(skip)]
    pub match_score: Option<f64>,
}

/// A job as produced by a scraper, before it has a stable identity.
#[derive(Debug, Clone)]
pub struct ScrapedJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub apply_url: String,
    pub source: String,
    pub posted_at: DateTime<Utc>,
    pub is_sponsorship_available: bool,
    pub extracted_skills: Vec<String>,
    pub tags: Vec<String>,
    pub salary: Option<String>,
    pub source_id: Option<String>,
}

/// Search and filter criteria for job listings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub query: Option<String>,
    pub skills: Option<Vec<String>>,
    pub location: Option<String>,
    pub sponsorship: Option<bool>,
    pub source: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Sortable columns. Anything outside this set falls back to `posted_at`.
const SORTABLE: &[&str] = &["posted_at", "created_at", "title", "company"];

impl JobFilter {
    /// Returns `(page, limit, sort_by, sort_descending)` with out-of-range
    /// values clamped: page >= 1, limit in [1, 100], sort column whitelisted.
    pub fn normalized(&self) -> (u32, u32, &str, bool) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        let sort_by = self
            .sort_by
            .as_deref()
            .filter(|s| SORTABLE.contains(s))
            .unwrap_or("posted_at");
        let descending = !matches!(self.sort_order.as_deref(), Some("asc"));
        (page, limit, sort_by, descending)
    }
}

/// A registered scrape source, as reported by the aggregation service.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSource {
    pub name: String,
    pub base_url: String,
    pub is_active: bool,
    pub rate_limit_rpm: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Aggregate counters for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total_jobs: i64,
    pub jobs_by_source: std::collections::HashMap<String, i64>,
    pub recent_jobs_7_days: i64,
    pub supported_sources: usize,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults() {
        let filter = JobFilter::default();
        let (page, limit, sort_by, desc) = filter.normalized();
        assert_eq!(page, 1);
        assert_eq!(limit, 10);
        assert_eq!(sort_by, "posted_at");
        assert!(desc);
    }

    #[test]
    fn test_filter_clamps_limit_and_page() {
        let filter = JobFilter {
            page: Some(0),
            limit: Some(500),
            ..Default::default()
        };
        let (page, limit, _, _) = filter.normalized();
        assert_eq!(page, 1);
        assert_eq!(limit, 100);
    }

    #[test]
    fn test_filter_rejects_unknown_sort_column() {
        let filter = JobFilter {
            sort_by: Some("apply_url; DROP TABLE jobs".to_string()),
            sort_order: Some("asc".to_string()),
            ..Default::default()
        };
        let (_, _, sort_by, desc) = filter.normalized();
        assert_eq!(sort_by, "posted_at");
        assert!(!desc);
    }
}
