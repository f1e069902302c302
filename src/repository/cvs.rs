use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cv::{CvRecord, CvResults, CvStatus};

/// CV persistence capability surface. The transition methods encode the
/// `Pending -> Processing -> {Completed, Failed}` state machine: each one
/// only fires from the expected predecessor state, so a CV being processed
/// has exactly one writer.
#[async_trait]
pub trait CvStore: Send + Sync {
    async fn create(&self, cv: &CvRecord) -> Result<(), AppError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<CvRecord>, AppError>;
    /// Claims a pending CV for processing. Returns `false` when the record
    /// was not in `Pending` (already claimed or finished).
    async fn claim(&self, id: Uuid) -> Result<bool, AppError>;
    /// `Processing -> Failed`, recording the error string.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError>;
    /// `Processing -> Completed`, persisting parsed results, suggestions,
    /// score, and any non-fatal warning.
    async fn complete(&self, id: Uuid, results: &CvResults) -> Result<(), AppError>;
}

pub struct PgCvRepository {
    pool: PgPool,
}

impl PgCvRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CvStore for PgCvRepository {
    async fn create(&self, cv: &CvRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO cvs (id, user_id, file_ref, file_name, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(cv.id)
        .bind(cv.user_id)
        .bind(&cv.file_ref)
        .bind(&cv.file_name)
        .bind(cv.status)
        .bind(cv.created_at)
        .bind(cv.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<CvRecord>, AppError> {
        let cv = sqlx::query_as(
            "SELECT id, user_id, file_ref, file_name, status, processing_error, raw_text, \
             profile_summary, experiences, educations, skills, suggestions, score, \
             created_at, updated_at FROM cvs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cv)
    }

    async fn claim(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE cvs SET status = 'processing', updated_at = now() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE cvs SET status = 'failed', processing_error = $2, updated_at = now() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cv {id} not in processing state")));
        }
        Ok(())
    }

    async fn complete(&self, id: Uuid, results: &CvResults) -> Result<(), AppError> {
        let experiences = serde_json::to_value(&results.experiences)
            .map_err(|e| AppError::Internal(e.into()))?;
        let educations = serde_json::to_value(&results.educations)
            .map_err(|e| AppError::Internal(e.into()))?;
        let suggestions = serde_json::to_value(&results.suggestions)
            .map_err(|e| AppError::Internal(e.into()))?;

        let result = sqlx::query(
            "UPDATE cvs SET status = 'completed', raw_text = $2, skills = $3, \
             experiences = $4, educations = $5, suggestions = $6, score = $7, \
             processing_error = $8, updated_at = now() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(&results.raw_text)
        .bind(&results.skills)
        .bind(experiences)
        .bind(educations)
        .bind(suggestions)
        .bind(results.score)
        .bind(&results.warning)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cv {id} not in processing state")));
        }
        Ok(())
    }
}

/// Helper shared by the worker and the upload handler.
pub fn new_pending_record(user_id: Uuid, file_ref: String, file_name: String) -> CvRecord {
    let now = chrono::Utc::now();
    CvRecord {
        id: Uuid::new_v4(),
        user_id,
        file_ref,
        file_name,
        status: CvStatus::Pending,
        processing_error: None,
        raw_text: None,
        profile_summary: None,
        experiences: Vec::new(),
        educations: Vec::new(),
        skills: Vec::new(),
        suggestions: Vec::new(),
        score: 0,
        created_at: now,
        updated_at: now,
    }
}
