use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{Job, JobFilter, ScrapedJob};

/// Outcome of a bulk upsert. The operation is unordered: rows that fail to
/// persist are counted and skipped, never aborting the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct BulkUpsertOutcome {
    pub upserted: usize,
    pub failed: usize,
}

/// Job persistence capability surface.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &ScrapedJob) -> Result<Job, AppError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Job>, AppError>;
    async fn get_by_apply_url(&self, apply_url: &str) -> Result<Option<Job>, AppError>;
    async fn update(&self, job: &Job) -> Result<(), AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
    /// Filtered listing plus the total count matching the filter.
    async fn list(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64), AppError>;
    /// Idempotent upsert keyed on `apply_url`. Inserts assign a fresh id and
    /// `created_at`; updates preserve the original `created_at`.
    async fn bulk_upsert(&self, jobs: &[ScrapedJob]) -> Result<BulkUpsertOutcome, AppError>;
    /// Candidate feed for the matcher: newest first.
    async fn get_for_matching(&self, limit: u32, offset: u32) -> Result<Vec<Job>, AppError>;
    async fn count_by_source(&self) -> Result<HashMap<String, i64>, AppError>;
    async fn count_posted_since(&self, since: DateTime<Utc>) -> Result<i64, AppError>;
}

const JOB_COLUMNS: &str = "id, title, company, location, description, apply_url, source, \
     posted_at, is_sponsorship_available, extracted_skills, tags, salary, source_id, \
     created_at, updated_at";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
        let mut first = true;
        let mut sep = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(if std::mem::take(&mut first) {
                " WHERE "
            } else {
                " AND "
            });
        };

        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            sep(qb);
            qb.push(
                "to_tsvector('english', title || ' ' || company || ' ' || description) \
                 @@ plainto_tsquery('english', ",
            );
            qb.push_bind(query.to_string());
            qb.push(")");
        }
        if let Some(skills) = filter.skills.as_ref().filter(|s| !s.is_empty()) {
            sep(qb);
            qb.push("extracted_skills && ");
            qb.push_bind(skills.clone());
        }
        if let Some(location) = filter.location.as_deref().filter(|l| !l.is_empty()) {
            sep(qb);
            qb.push("location ILIKE ");
            qb.push_bind(format!("%{location}%"));
        }
        if let Some(sponsorship) = filter.sponsorship {
            sep(qb);
            qb.push("is_sponsorship_available = ");
            qb.push_bind(sponsorship);
        }
        if let Some(source) = filter.source.as_deref().filter(|s| !s.is_empty()) {
            sep(qb);
            qb.push("source = ");
            qb.push_bind(source.to_string());
        }
    }
}

#[async_trait]
impl JobStore for PgJobRepository {
    async fn create(&self, job: &ScrapedJob) -> Result<Job, AppError> {
        let id = Uuid::new_v4();
        let created: Result<Job, sqlx::Error> = sqlx::query_as(&format!(
            "INSERT INTO jobs (id, title, company, location, description, apply_url, source, \
             posted_at, is_sponsorship_available, extracted_skills, tags, salary, source_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(&job.apply_url)
        .bind(&job.source)
        .bind(job.posted_at)
        .bind(job.is_sponsorship_available)
        .bind(&job.extracted_skills)
        .bind(&job.tags)
        .bind(&job.salary)
        .bind(&job.source_id)
        .fetch_one(&self.pool)
        .await;

        created.map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::AlreadyExists(
                format!("job with apply_url {} already exists", job.apply_url),
            ),
            other => AppError::Database(other),
        })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Job>, AppError> {
        let job = sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn get_by_apply_url(&self, apply_url: &str) -> Result<Option<Job>, AppError> {
        let job = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE apply_url = $1"
        ))
        .bind(apply_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn update(&self, job: &Job) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE jobs SET title = $2, company = $3, location = $4, description = $5, \
             is_sponsorship_available = $6, extracted_skills = $7, tags = $8, salary = $9, \
             updated_at = now() WHERE id = $1",
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(job.is_sponsorship_available)
        .bind(&job.extracted_skills)
        .bind(&job.tags)
        .bind(&job.salary)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("job {} not found", job.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("job {id} not found")));
        }
        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64), AppError> {
        let (page, limit, sort_by, descending) = filter.normalized();

        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM jobs");
        Self::push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build().fetch_one(&self.pool).await?.get(0);

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
        Self::push_filters(&mut qb, filter);

        // Full-text queries rank by relevance unless the caller asked for an
        // explicit sort column.
        let query_present = filter.query.as_deref().is_some_and(|q| !q.is_empty());
        if query_present && filter.sort_by.is_none() {
            qb.push(
                " ORDER BY ts_rank(to_tsvector('english', title || ' ' || company || ' ' || \
                 description), plainto_tsquery('english', ",
            );
            qb.push_bind(filter.query.clone().unwrap_or_default());
            qb.push(")) DESC");
        } else {
            qb.push(format!(
                " ORDER BY {sort_by} {}",
                if descending { "DESC" } else { "ASC" }
            ));
        }

        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(((page - 1) * limit) as i64);

        let jobs = qb.build_query_as::<Job>().fetch_all(&self.pool).await?;
        Ok((jobs, total))
    }

    async fn bulk_upsert(&self, jobs: &[ScrapedJob]) -> Result<BulkUpsertOutcome, AppError> {
        let mut outcome = BulkUpsertOutcome::default();

        for job in jobs {
            let result = sqlx::query(
                "INSERT INTO jobs (id, title, company, location, description, apply_url, \
                 source, posted_at, is_sponsorship_available, extracted_skills, tags, salary, \
                 source_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (apply_url) DO UPDATE SET \
                 title = EXCLUDED.title, company = EXCLUDED.company, \
                 location = EXCLUDED.location, description = EXCLUDED.description, \
                 source = EXCLUDED.source, posted_at = EXCLUDED.posted_at, \
                 is_sponsorship_available = EXCLUDED.is_sponsorship_available, \
                 extracted_skills = EXCLUDED.extracted_skills, tags = EXCLUDED.tags, \
                 salary = EXCLUDED.salary, source_id = EXCLUDED.source_id, \
                 updated_at = now()",
            )
            .bind(Uuid::new_v4())
            .bind(&job.title)
            .bind(&job.company)
            .bind(&job.location)
            .bind(&job.description)
            .bind(&job.apply_url)
            .bind(&job.source)
            .bind(job.posted_at)
            .bind(job.is_sponsorship_available)
            .bind(&job.extracted_skills)
            .bind(&job.tags)
            .bind(&job.salary)
            .bind(&job.source_id)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => outcome.upserted += 1,
                Err(e) => {
                    warn!(apply_url = %job.apply_url, "skipping bad document in bulk upsert: {e}");
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn get_for_matching(&self, limit: u32, offset: u32) -> Result<Vec<Job>, AppError> {
        let jobs = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY posted_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn count_by_source(&self) -> Result<HashMap<String, i64>, AppError> {
        let rows = sqlx::query("SELECT source, COUNT(*) FROM jobs GROUP BY source")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>(0), row.get::<i64, _>(1)))
            .collect())
    }

    async fn count_posted_since(&self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM jobs WHERE posted_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?
            .get(0);
        Ok(count)
    }
}
