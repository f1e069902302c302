//! HTML-collector scraper driven by per-board CSS selector rules.
//!
//! One collector covers every listing-page board; the boards differ only in
//! their `BoardRules`. A fresh visited-URL set is built per run, so a link
//! seen on a previous run is never an error.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{JobScraper, TokenBucket, SCRAPE_HTTP_TIMEOUT};
use crate::errors::AppError;
use crate::models::job::ScrapedJob;

const USER_AGENT: &str = "JobHiveBot/1.0 (+https://jobhive.dev/bot)";

/// Selector rules describing how to read one board's listing page.
#[derive(Debug, Clone)]
pub struct BoardRules {
    pub name: &'static str,
    pub base_url: &'static str,
    pub listing_url: &'static str,
    pub rate_limit_rpm: u32,
    /// Selects one listing row.
    pub row: &'static str,
    pub title: &'static str,
    pub company: &'static str,
    /// Optional selectors; an empty string disables the field.
    pub location: &'static str,
    pub category: &'static str,
    pub date: &'static str,
    pub salary: &'static str,
}

/// The boards this deployment collects from.
pub fn known_boards() -> Vec<BoardRules> {
    vec![
        BoardRules {
            name: "WeWorkRemotely",
            base_url: "https://weworkremotely.com",
            listing_url: "https://weworkremotely.com/remote-jobs",
            rate_limit_rpm: 10,
            row: ".jobs li",
            title: ".title",
            company: ".company",
            location: ".region",
            category: ".category",
            date: "",
            salary: "",
        },
        BoardRules {
            name: "Remote.co",
            base_url: "https://remote.co",
            listing_url: "https://remote.co/remote-jobs/",
            rate_limit_rpm: 8,
            row: ".job_board_table tbody tr",
            title: "td.job_title a",
            company: "td.company",
            location: "td.location",
            category: "td.category",
            date: "td.date",
            salary: "",
        },
        BoardRules {
            name: "NoDesk",
            base_url: "https://nodesk.co",
            listing_url: "https://nodesk.co/remote-jobs/",
            rate_limit_rpm: 6,
            row: ".job-board-item",
            title: ".job-title",
            company: ".company-name",
            location: "",
            category: ".job-category",
            date: "",
            salary: ".salary",
        },
    ]
}

pub struct BoardScraper {
    rules: BoardRules,
    client: Client,
    bucket: TokenBucket,
}

impl BoardScraper {
    pub fn new(rules: BoardRules) -> Self {
        let bucket = TokenBucket::per_minute(rules.rate_limit_rpm);
        Self {
            rules,
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(SCRAPE_HTTP_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            bucket,
        }
    }

    /// Parses a fetched listing page. Kept synchronous so the parsed DOM
    /// never lives across an await point.
    fn parse_listing(&self, html: &str, max_jobs: usize) -> Vec<ScrapedJob> {
        let document = Html::parse_document(html);
        let Ok(row_selector) = Selector::parse(self.rules.row) else {
            warn!(source = self.rules.name, "invalid row selector");
            return Vec::new();
        };

        let mut jobs = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();

        for row in document.select(&row_selector) {
            if max_jobs > 0 && jobs.len() >= max_jobs {
                break;
            }

            let title = select_text(&row, self.rules.title);
            if title.is_empty() {
                continue;
            }

            let href = select_href(&row, self.rules.title)
                .or_else(|| select_href(&row, "a"))
                .unwrap_or_default();
            if href.is_empty() {
                continue;
            }
            let apply_url = absolutize(self.rules.base_url, &href);
            if !visited.insert(apply_url.clone()) {
                continue; // duplicate link within this run
            }

            let company = non_empty_or(select_text(&row, self.rules.company), "Unknown Company");
            let location = non_empty_or(select_text(&row, self.rules.location), "Remote");
            let category = select_text(&row, self.rules.category);
            let salary = Some(select_text(&row, self.rules.salary)).filter(|s| !s.is_empty());

            let posted_at = {
                let raw = select_text(&row, self.rules.date);
                if raw.is_empty() {
                    Utc::now()
                } else {
                    parse_relative_date(&raw, Utc::now())
                }
            };

            let mut description = format!("Remote {category} position at {company}");
            if let Some(s) = &salary {
                description.push_str(&format!(" - {s}"));
            }

            let skills = if category.is_empty() {
                Vec::new()
            } else {
                vec![category.clone()]
            };

            jobs.push(ScrapedJob {
                title,
                company,
                location,
                description,
                apply_url,
                source: self.rules.name.to_string(),
                posted_at,
                is_sponsorship_available: false,
                extracted_skills: skills,
                tags: Vec::new(),
                salary,
                source_id: None,
            });
        }

        jobs
    }
}

#[async_trait]
impl JobScraper for BoardScraper {
    fn name(&self) -> &str {
        self.rules.name
    }

    fn base_url(&self) -> &str {
        self.rules.base_url
    }

    fn rate_limit_rpm(&self) -> u32 {
        self.rules.rate_limit_rpm
    }

    async fn scrape(
        &self,
        ctx: &CancellationToken,
        max_jobs: usize,
    ) -> Result<Vec<ScrapedJob>, AppError> {
        self.bucket.acquire(ctx).await?;

        let request = self.client.get(self.rules.listing_url).send();
        let response = tokio::select! {
            r = request => r,
            _ = ctx.cancelled() => return Err(AppError::Cancelled),
        }
        .map_err(|e| AppError::SourceUnavailable(format!("{}: {e}", self.rules.name)))?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "{}: listing returned {}",
                self.rules.name,
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::SourceUnavailable(format!("{}: bad listing body: {e}", self.rules.name))
        })?;

        Ok(self.parse_listing(&body, max_jobs))
    }
}

fn select_text(row: &scraper::ElementRef<'_>, selector: &str) -> String {
    if selector.is_empty() {
        return String::new();
    }
    let Ok(sel) = Selector::parse(selector) else {
        return String::new();
    };
    row.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn select_href(row: &scraper::ElementRef<'_>, selector: &str) -> Option<String> {
    if selector.is_empty() {
        return None;
    }
    let sel = Selector::parse(selector).ok()?;
    for el in row.select(&sel) {
        if let Some(href) = el.value().attr("href") {
            return Some(href.to_string());
        }
        // The anchor may wrap the selected node rather than be it.
        if let Some(href) = el
            .select(&Selector::parse("a").ok()?)
            .next()
            .and_then(|a| a.value().attr("href"))
        {
            return Some(href.to_string());
        }
    }
    None
}

fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

static RELATIVE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(day|week|month)").expect("valid regex"));

/// Parses relative listing dates like "2 days ago" or "1 week ago" against
/// `now`. Unparseable input yields `now`.
fn parse_relative_date(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.to_lowercase();
    let Some(caps) = RELATIVE_DATE_RE.captures(&raw) else {
        return now;
    };
    let Ok(count) = caps[1].parse::<i64>() else {
        return now;
    };
    match &caps[2] {
        "day" => now - Duration::days(count),
        "week" => now - Duration::weeks(count),
        "month" => now - Duration::days(count * 30),
        _ => now,
    }
}
