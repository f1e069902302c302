pub mod cv;
pub mod health;
pub mod jobs;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

/// Upload bodies may exceed axum's 2 MB default; the per-file cap from
/// `MAX_ALLOWED_FILE_SIZE` is enforced in the CV handler.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // ── Jobs ───────────────────────────────────────────────────────────
        // Note: specific routes before the :id param route (Axum priority)
        .route("/api/v1/jobs", get(jobs::handle_list_jobs))
        .route("/api/v1/jobs/search", get(jobs::handle_search_jobs))
        .route("/api/v1/jobs/matched", get(jobs::handle_matched_jobs))
        .route("/api/v1/jobs/trending", get(jobs::handle_trending_jobs))
        .route("/api/v1/jobs/stats", get(jobs::handle_job_stats))
        .route("/api/v1/jobs/sources", get(jobs::handle_job_sources))
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        // ── Admin job management ───────────────────────────────────────────
        .route("/api/v1/admin/jobs", post(jobs::handle_create_job))
        .route("/api/v1/admin/jobs/aggregate", post(jobs::handle_aggregate))
        .route(
            "/api/v1/admin/jobs/aggregate/:source",
            post(jobs::handle_aggregate_source),
        )
        .route(
            "/api/v1/admin/jobs/:id",
            put(jobs::handle_update_job).delete(jobs::handle_delete_job),
        )
        // ── CV pipeline ────────────────────────────────────────────────────
        .route("/api/v1/cv", post(cv::handle_upload_cv))
        .route("/api/v1/cv/:id", get(cv::handle_get_cv))
        .route("/api/v1/cv/:id/download", get(cv::handle_download_url))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
