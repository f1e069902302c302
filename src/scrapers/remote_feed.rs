//! API-client scraper for RemoteOK-style structured JSON feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{JobScraper, TokenBucket, SCRAPE_HTTP_TIMEOUT};
use crate::errors::AppError;
use crate::models::job::ScrapedJob;

const USER_AGENT: &str = "JobHiveBot/1.0 (+https://jobhive.dev/bot)";

/// One entry of the feed. The feed's first element is a legal notice with
/// none of these fields set, which the mapper naturally skips.
#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    salary_min: Option<i64>,
    #[serde(default)]
    salary_max: Option<i64>,
}

pub struct RemoteFeedScraper {
    name: String,
    base_url: String,
    feed_url: String,
    rate_limit_rpm: u32,
    client: Client,
    bucket: TokenBucket,
}

impl RemoteFeedScraper {
    pub fn new(name: &str, base_url: &str, feed_url: &str, rate_limit_rpm: u32) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            feed_url: feed_url.to_string(),
            rate_limit_rpm,
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(SCRAPE_HTTP_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            bucket: TokenBucket::per_minute(rate_limit_rpm),
        }
    }

    /// The canonical public instance.
    pub fn remoteok() -> Self {
        Self::new("RemoteOK", "https://remoteok.io", "https://remoteok.io/api", 10)
    }

    fn convert(&self, entry: FeedEntry) -> Option<ScrapedJob> {
        let title = entry.position?;
        if title.trim().is_empty() {
            return None;
        }

        let source_id = entry.id.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        let apply_url = entry.url.filter(|u| !u.is_empty()).or_else(|| {
            source_id
                .as_deref()
                .map(|id| format!("{}/remote-jobs/{id}", self.base_url))
        })?;

        let skills: Vec<String> = entry
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let salary = match (entry.salary_min, entry.salary_max) {
            (Some(min), Some(max)) => Some(format!("${min} - ${max}")),
            (Some(min), None) => Some(format!("From ${min}")),
            (None, Some(max)) => Some(format!("Up to ${max}")),
            (None, None) => None,
        };

        Some(ScrapedJob {
            title,
            company: entry
                .company
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Unknown Company".to_string()),
            location: entry
                .location
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "Remote".to_string()),
            description: entry.description.unwrap_or_default(),
            apply_url,
            source: self.name.clone(),
            posted_at: entry.date.unwrap_or_else(Utc::now),
            is_sponsorship_available: false,
            extracted_skills: skills.clone(),
            tags: skills,
            salary,
            source_id,
        })
    }
}

#[async_trait]
impl JobScraper for RemoteFeedScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rate_limit_rpm(&self) -> u32 {
        self.rate_limit_rpm
    }

    async fn scrape(
        &self,
        ctx: &CancellationToken,
        max_jobs: usize,
    ) -> Result<Vec<ScrapedJob>, AppError> {
        const MAX_ATTEMPTS: u32 = 3;

        let mut entries: Option<Vec<FeedEntry>> = None;
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(source = %self.name, "feed attempt {attempt} failed, retrying after {}ms", delay.as_millis());
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancelled() => return Err(AppError::Cancelled),
                }
            }
            self.bucket.acquire(ctx).await?;

            let request = self.client.get(&self.feed_url).send();
            let response = tokio::select! {
                r = request => r,
                _ = ctx.cancelled() => return Err(AppError::Cancelled),
            };
            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = format!("feed returned {status}");
                continue;
            }
            if !status.is_success() {
                return Err(AppError::SourceUnavailable(format!(
                    "{}: feed returned {status}",
                    self.name
                )));
            }

            match response.json().await {
                Ok(parsed) => {
                    entries = Some(parsed);
                    break;
                }
                Err(e) => {
                    last_error = format!("bad feed body: {e}");
                    continue;
                }
            }
        }

        let entries = entries.ok_or_else(|| {
            AppError::SourceUnavailable(format!("{}: {last_error}", self.name))
        })?;

        let mut jobs = Vec::new();
        for entry in entries {
            if max_jobs > 0 && jobs.len() >= max_jobs {
                break;
            }
            match self.convert(entry) {
                Some(job) => jobs.push(job),
                None => debug!(source = %self.name, "skipping feed entry without title or url"),
            }
        }

        if jobs.is_empty() {
            warn!(source = %self.name, "feed produced no usable jobs");
        }
        Ok(jobs)
    }
}
