use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::cv::CvRecord;
use crate::repository::cvs::new_pending_record;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::storage::FileRef;

#[derive(Debug, Serialize)]
pub struct CvJobStarted {
    pub job_id: Uuid,
}

/// POST /api/v1/cv — multipart upload of a PDF; stores the document,
/// creates the pending CV record, and enqueues it for the worker.
pub async fn handle_upload_cv(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<CvJobStarted>>, AppError> {
    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| AppError::StorageIo("file storage is not configured".to_string()))?;

    let mut file_name = None;
    let mut bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("bad multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(sanitize_file_name);
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file: {e}")))?,
            );
            break;
        }
    }

    let file_name = file_name.ok_or_else(|| {
        AppError::Validation("multipart field 'file' with a filename is required".to_string())
    })?;
    let bytes = bytes
        .ok_or_else(|| AppError::Validation("multipart field 'file' is required".to_string()))?;

    if bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    if bytes.len() as i64 > state.config.max_allowed_file_size {
        return Err(AppError::Validation(format!(
            "file size exceeds the {} byte limit",
            state.config.max_allowed_file_size
        )));
    }

    let file_ref = storage
        .put_document(user.user_id, &file_name, bytes.to_vec())
        .await?;

    let record = new_pending_record(user.user_id, file_ref.as_str().to_string(), file_name);
    let job_id = record.id;
    state.cvs.create(&record).await?;
    state.cv_queue.enqueue(job_id).await?;

    info!(cv_id = %job_id, user_id = %user.user_id, "CV parsing job enqueued");
    Ok(Json(ApiResponse::ok(
        "CV parsing job created",
        CvJobStarted { job_id },
    )))
}

/// GET /api/v1/cv/:id — status and, once completed, the parsed results.
pub async fn handle_get_cv(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CvRecord>>, AppError> {
    let record = load_owned_cv(&state, &user, id).await?;
    Ok(Json(ApiResponse::ok("CV job retrieved", record)))
}

#[derive(Debug, Serialize)]
pub struct DownloadUrl {
    pub url: String,
    pub expires_in_secs: u64,
}

/// GET /api/v1/cv/:id/download — presigned one-shot GET for the original
/// document.
pub async fn handle_download_url(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DownloadUrl>>, AppError> {
    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| AppError::StorageIo("file storage is not configured".to_string()))?;

    let record = load_owned_cv(&state, &user, id).await?;
    let file_ref = FileRef::parse(&record.file_ref)?;
    let ttl = Duration::from_secs(state.config.max_file_url_life_secs);
    let url = storage.presign_get(&file_ref, ttl).await?;

    Ok(Json(ApiResponse::ok(
        "download URL created",
        DownloadUrl {
            url,
            expires_in_secs: ttl.as_secs(),
        },
    )))
}

async fn load_owned_cv(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
) -> Result<CvRecord, AppError> {
    let record = state
        .cvs
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV job {id} not found")))?;
    if record.user_id != user.user_id && !user.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(record)
}

/// Strips path components and control characters from client file names.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control() && *c != '|')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_separator() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\cv\\resume.pdf"), "resume.pdf");
        assert_eq!(sanitize_file_name("my|cv.pdf"), "mycv.pdf");
        assert_eq!(sanitize_file_name("resume.pdf"), "resume.pdf");
    }
}
