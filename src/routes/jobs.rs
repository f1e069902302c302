use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser, OptionalUser};
use crate::errors::AppError;
use crate::matching::match_score;
use crate::models::job::{Job, JobFilter, JobStats, ScrapeSource, ScrapedJob};
use crate::response::{ApiResponse, Paginated};
use crate::state::AppState;

/// Query-string shape for job listing endpoints. `skills` arrives as a
/// comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub query: Option<String>,
    pub skills: Option<String>,
    pub location: Option<String>,
    pub sponsorship: Option<bool>,
    pub source: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl From<JobListQuery> for JobFilter {
    fn from(q: JobListQuery) -> Self {
        let skills = q.skills.map(|s| {
            s.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
        });
        JobFilter {
            query: q.query,
            skills: skills.filter(|s| !s.is_empty()),
            location: q.location,
            sponsorship: q.sponsorship,
            source: q.source,
            page: q.page,
            limit: q.limit,
            sort_by: q.sort_by,
            sort_order: q.sort_order,
        }
    }
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<ApiResponse<Paginated<Job>>>, AppError> {
    let filter: JobFilter = query.into();
    let (page, limit, _, _) = filter.normalized();
    let (jobs, total) = state.jobs.list(&filter).await?;
    Ok(Json(ApiResponse::ok(
        "jobs retrieved",
        Paginated::new(jobs, page, limit, total),
    )))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Job>>, AppError> {
    let job = state
        .jobs
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;
    Ok(Json(ApiResponse::ok("job retrieved", job)))
}

/// GET /api/v1/jobs/search — personalized when a valid token is present:
/// the user's own skills backfill an absent skills filter, and results gain
/// match scores (re-sorted by score unless the caller chose a sort).
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<JobListQuery>,
) -> Result<Json<ApiResponse<Paginated<Job>>>, AppError> {
    let mut filter: JobFilter = query.into();
    let prefs = match user {
        Some(CurrentUser { user_id, .. }) => state.users.preferences(user_id).await?,
        None => None,
    };

    if let Some(prefs) = &prefs {
        if filter.skills.as_ref().map_or(true, |s| s.is_empty()) && !prefs.skills.is_empty() {
            filter.skills = Some(prefs.skills.clone());
        }
    }

    let (page, limit, _, _) = filter.normalized();
    let (mut jobs, total) = state.jobs.list(&filter).await?;

    if let Some(prefs) = &prefs {
        for job in &mut jobs {
            job.match_score = Some(match_score(job, prefs));
        }
        if filter.sort_by.is_none() {
            jobs.sort_by(|a, b| {
                b.match_score
                    .unwrap_or(0.0)
                    .total_cmp(&a.match_score.unwrap_or(0.0))
            });
        }
    }

    Ok(Json(ApiResponse::ok(
        "jobs retrieved",
        Paginated::new(jobs, page, limit, total),
    )))
}

#[derive(Debug, Deserialize)]
pub struct MatchedQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/v1/jobs/matched — scored recommendations for the caller.
pub async fn handle_matched_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MatchedQuery>,
) -> Result<Json<ApiResponse<Paginated<Job>>>, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = query.offset.unwrap_or(0);

    let matches = state.matcher.get_matches(user.user_id, limit, offset).await?;

    // The matcher has no total count; approximate like a cursor feed.
    let page = offset / limit + 1;
    let total = matches.len() as i64;
    Ok(Json(ApiResponse::ok(
        "matched jobs retrieved",
        Paginated::new(matches, page, limit, total),
    )))
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u32>,
}

/// GET /api/v1/jobs/trending — recency is the only trend signal.
pub async fn handle_trending_jobs(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<ApiResponse<Vec<Job>>>, AppError> {
    let filter = JobFilter {
        limit: query.limit,
        ..Default::default()
    };
    let (jobs, _) = state.jobs.list(&filter).await?;
    Ok(Json(ApiResponse::ok("trending jobs retrieved", jobs)))
}

/// GET /api/v1/jobs/stats
pub async fn handle_job_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<JobStats>>, AppError> {
    let jobs_by_source = state.jobs.count_by_source().await?;
    let total_jobs = jobs_by_source.values().sum();
    let recent_jobs_7_days = state
        .jobs
        .count_posted_since(Utc::now() - Duration::days(7))
        .await?;
    let supported_sources = state.aggregator.sources().await.len();

    Ok(Json(ApiResponse::ok(
        "job stats retrieved",
        JobStats {
            total_jobs,
            jobs_by_source,
            recent_jobs_7_days,
            supported_sources,
            last_updated: Utc::now(),
        },
    )))
}

/// GET /api/v1/jobs/sources
pub async fn handle_job_sources(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ScrapeSource>>>, AppError> {
    Ok(Json(ApiResponse::ok(
        "sources retrieved",
        state.aggregator.sources().await,
    )))
}

/// POST /api/v1/admin/jobs/aggregate — kicks off a full aggregation run in
/// the background and returns immediately.
pub async fn handle_aggregate(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    let aggregator = state.aggregator.clone();
    let ctx = state.shutdown.child_token();
    tokio::spawn(async move {
        let report = aggregator.aggregate_all(&ctx).await;
        if report.all_ok() {
            info!(upserted = report.upserted, "aggregation run completed");
        } else {
            let failed: Vec<&str> = report.failed.iter().map(|f| f.source.as_str()).collect();
            error!(
                upserted = report.upserted,
                failed = ?failed,
                "aggregation run completed with failures"
            );
        }
    });
    Ok(Json(ApiResponse::ok("aggregation started", "started")))
}

/// POST /api/v1/admin/jobs/aggregate/:source — synchronous single-source run.
pub async fn handle_aggregate_source(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<usize>>, AppError> {
    let ctx = state.shutdown.child_token();
    let count = state.aggregator.aggregate_from(&ctx, &source).await?;
    Ok(Json(ApiResponse::ok("source aggregated", count)))
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub company: String,
    pub apply_url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub source: Option<String>,
    pub posted_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub is_sponsorship_available: bool,
    #[serde(default)]
    pub extracted_skills: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub salary: Option<String>,
}

/// POST /api/v1/admin/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<ApiResponse<Job>>, AppError> {
    if req.title.is_empty() || req.company.is_empty() || req.apply_url.is_empty() {
        return Err(AppError::Validation(
            "title, company, and apply_url are required".to_string(),
        ));
    }

    let job = ScrapedJob {
        title: req.title,
        company: req.company,
        location: req.location,
        description: req.description,
        apply_url: req.apply_url,
        source: req.source.unwrap_or_else(|| "Manual".to_string()),
        posted_at: req.posted_at.unwrap_or_else(Utc::now),
        is_sponsorship_available: req.is_sponsorship_available,
        extracted_skills: req.extracted_skills,
        tags: req.tags,
        salary: req.salary,
        source_id: None,
    };

    let created = state.jobs.create(&job).await?;
    Ok(Json(ApiResponse::ok("job created", created)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub extracted_skills: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub salary: Option<String>,
    pub is_sponsorship_available: Option<bool>,
}

/// PUT /api/v1/admin/jobs/:id — partial update of mutable fields.
pub async fn handle_update_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<ApiResponse<Job>>, AppError> {
    let mut job = state
        .jobs
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

    if let Some(title) = req.title.filter(|t| !t.is_empty()) {
        job.title = title;
    }
    if let Some(company) = req.company.filter(|c| !c.is_empty()) {
        job.company = company;
    }
    if let Some(location) = req.location {
        job.location = location;
    }
    if let Some(description) = req.description {
        job.description = description;
    }
    if let Some(skills) = req.extracted_skills {
        job.extracted_skills = skills;
    }
    if let Some(tags) = req.tags {
        job.tags = tags;
    }
    if let Some(salary) = req.salary {
        job.salary = Some(salary);
    }
    if let Some(sponsorship) = req.is_sponsorship_available {
        job.is_sponsorship_available = sponsorship;
    }

    state.jobs.update(&job).await?;
    Ok(Json(ApiResponse::ok("job updated", job)))
}

/// DELETE /api/v1/admin/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    state.jobs.delete(id).await?;
    Ok(Json(ApiResponse::ok("job deleted", "deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skills_query_param_splits_on_commas() {
        let query = JobListQuery {
            skills: Some("rust, go,,python ".to_string()),
            ..Default::default()
        };
        let filter: JobFilter = query.into();
        assert_eq!(
            filter.skills,
            Some(vec!["rust".to_string(), "go".to_string(), "python".to_string()])
        );
    }

    #[test]
    fn test_empty_skills_param_means_no_filter() {
        let query = JobListQuery {
            skills: Some(" , ".to_string()),
            ..Default::default()
        };
        let filter: JobFilter = query.into();
        assert_eq!(filter.skills, None);
    }
}
