//! In-memory fakes for the persistence, storage, extraction, and AI seams.
//! Test-only; the pipelines under test run unchanged against these.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ai::{AiError, CvAnalyzer};
use crate::cvproc::extract::TextExtractor;
use crate::errors::AppError;
use crate::models::cv::{CvRecord, CvResults, CvStatus, Suggestion};
use crate::models::job::{Job, JobFilter, ScrapedJob};
use crate::models::user::UserJobPreferences;
use crate::repository::{BulkUpsertOutcome, CvStore, JobStore, UserDirectory};
use crate::scrapers::JobScraper;
use crate::storage::{FileRef, ObjectStore};

pub fn test_job(apply_url: &str, title: &str) -> Job {
    let now = Utc::now();
    Job {
        id: Uuid::new_v4(),
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        description: String::new(),
        apply_url: apply_url.to_string(),
        source: "test".to_string(),
        posted_at: now,
        is_sponsorship_available: false,
        extracted_skills: Vec::new(),
        tags: Vec::new(),
        salary: None,
        source_id: None,
        created_at: now,
        updated_at: now,
        match_score: None,
    }
}

// ── Job store ───────────────────────────────────────────────────────────────

/// Keyed by `apply_url`, mirroring the unique index the real store relies on.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn seed(&self, jobs: Vec<Job>) {
        let mut map = self.jobs.lock().await;
        for job in jobs {
            map.insert(job.apply_url.clone(), job);
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &ScrapedJob) -> Result<Job, AppError> {
        let mut map = self.jobs.lock().await;
        if map.contains_key(&job.apply_url) {
            return Err(AppError::AlreadyExists(job.apply_url.clone()));
        }
        let now = Utc::now();
        let stored = Job {
            id: Uuid::new_v4(),
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            description: job.description.clone(),
            apply_url: job.apply_url.clone(),
            source: job.source.clone(),
            posted_at: job.posted_at,
            is_sponsorship_available: job.is_sponsorship_available,
            extracted_skills: job.extracted_skills.clone(),
            tags: job.tags.clone(),
            salary: job.salary.clone(),
            source_id: job.source_id.clone(),
            created_at: now,
            updated_at: now,
            match_score: None,
        };
        map.insert(stored.apply_url.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Job>, AppError> {
        let map = self.jobs.lock().await;
        Ok(map.values().find(|j| j.id == id).cloned())
    }

    async fn get_by_apply_url(&self, apply_url: &str) -> Result<Option<Job>, AppError> {
        let map = self.jobs.lock().await;
        Ok(map.get(apply_url).cloned())
    }

    async fn update(&self, job: &Job) -> Result<(), AppError> {
        let mut map = self.jobs.lock().await;
        let existing = map
            .values_mut()
            .find(|j| j.id == job.id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job.id)))?;
        let created_at = existing.created_at;
        *existing = job.clone();
        existing.created_at = created_at;
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut map = self.jobs.lock().await;
        let url = map
            .values()
            .find(|j| j.id == id)
            .map(|j| j.apply_url.clone())
            .ok_or_else(|| AppError::NotFound(format!("job {id}")))?;
        map.remove(&url);
        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64), AppError> {
        let map = self.jobs.lock().await;
        let (page, limit, _, descending) = filter.normalized();

        let mut jobs: Vec<Job> = map
            .values()
            .filter(|job| {
                let query_ok = filter.query.as_deref().map_or(true, |q| {
                    let q = q.to_lowercase();
                    job.title.to_lowercase().contains(&q)
                        || job.company.to_lowercase().contains(&q)
                        || job.description.to_lowercase().contains(&q)
                });
                let skills_ok = filter.skills.as_ref().map_or(true, |wanted| {
                    wanted.iter().any(|w| {
                        job.extracted_skills.iter().any(|s| s.eq_ignore_ascii_case(w))
                    })
                });
                let location_ok = filter.location.as_deref().map_or(true, |l| {
                    job.location.to_lowercase().contains(&l.to_lowercase())
                });
                let sponsorship_ok = filter
                    .sponsorship
                    .map_or(true, |s| job.is_sponsorship_available == s);
                let source_ok = filter.source.as_deref().map_or(true, |s| job.source == s);
                query_ok && skills_ok && location_ok && sponsorship_ok && source_ok
            })
            .cloned()
            .collect();

        jobs.sort_by(|a, b| {
            if descending {
                b.posted_at.cmp(&a.posted_at)
            } else {
                a.posted_at.cmp(&b.posted_at)
            }
        });

        let total = jobs.len() as i64;
        let start = ((page - 1) * limit) as usize;
        let jobs = jobs
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();
        Ok((jobs, total))
    }

    async fn bulk_upsert(&self, jobs: &[ScrapedJob]) -> Result<BulkUpsertOutcome, AppError> {
        let mut map = self.jobs.lock().await;
        let mut outcome = BulkUpsertOutcome::default();
        let now = Utc::now();

        for job in jobs {
            if job.apply_url.is_empty() {
                outcome.failed += 1;
                continue;
            }
            match map.get_mut(&job.apply_url) {
                Some(existing) => {
                    existing.title = job.title.clone();
                    existing.company = job.company.clone();
                    existing.location = job.location.clone();
                    existing.description = job.description.clone();
                    existing.source = job.source.clone();
                    existing.posted_at = job.posted_at;
                    existing.is_sponsorship_available = job.is_sponsorship_available;
                    existing.extracted_skills = job.extracted_skills.clone();
                    existing.tags = job.tags.clone();
                    existing.salary = job.salary.clone();
                    existing.source_id = job.source_id.clone();
                    existing.updated_at = now;
                }
                None => {
                    map.insert(
                        job.apply_url.clone(),
                        Job {
                            id: Uuid::new_v4(),
                            title: job.title.clone(),
                            company: job.company.clone(),
                            location: job.location.clone(),
                            description: job.description.clone(),
                            apply_url: job.apply_url.clone(),
                            source: job.source.clone(),
                            posted_at: job.posted_at,
                            is_sponsorship_available: job.is_sponsorship_available,
                            extracted_skills: job.extracted_skills.clone(),
                            tags: job.tags.clone(),
                            salary: job.salary.clone(),
                            source_id: job.source_id.clone(),
                            created_at: now,
                            updated_at: now,
                            match_score: None,
                        },
                    );
                }
            }
            outcome.upserted += 1;
        }
        Ok(outcome)
    }

    async fn get_for_matching(&self, limit: u32, offset: u32) -> Result<Vec<Job>, AppError> {
        let map = self.jobs.lock().await;
        let mut jobs: Vec<Job> = map.values().cloned().collect();
        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Ok(jobs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_by_source(&self) -> Result<HashMap<String, i64>, AppError> {
        let map = self.jobs.lock().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for job in map.values() {
            *counts.entry(job.source.clone()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn count_posted_since(&self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let map = self.jobs.lock().await;
        Ok(map.values().filter(|j| j.posted_at >= since).count() as i64)
    }
}

// ── CV store ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCvStore {
    cvs: Mutex<HashMap<Uuid, CvRecord>>,
}

#[async_trait]
impl CvStore for InMemoryCvStore {
    async fn create(&self, cv: &CvRecord) -> Result<(), AppError> {
        self.cvs.lock().await.insert(cv.id, cv.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<CvRecord>, AppError> {
        Ok(self.cvs.lock().await.get(&id).cloned())
    }

    async fn claim(&self, id: Uuid) -> Result<bool, AppError> {
        let mut map = self.cvs.lock().await;
        match map.get_mut(&id) {
            Some(cv) if cv.status == CvStatus::Pending => {
                cv.status = CvStatus::Processing;
                cv.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError> {
        let mut map = self.cvs.lock().await;
        let cv = map
            .get_mut(&id)
            .filter(|cv| cv.status == CvStatus::Processing)
            .ok_or_else(|| AppError::NotFound(format!("cv {id} not in processing state")))?;
        cv.status = CvStatus::Failed;
        cv.processing_error = Some(error.to_string());
        cv.updated_at = Utc::now();
        Ok(())
    }

    async fn complete(&self, id: Uuid, results: &CvResults) -> Result<(), AppError> {
        let mut map = self.cvs.lock().await;
        let cv = map
            .get_mut(&id)
            .filter(|cv| cv.status == CvStatus::Processing)
            .ok_or_else(|| AppError::NotFound(format!("cv {id} not in processing state")))?;
        cv.status = CvStatus::Completed;
        cv.raw_text = Some(results.raw_text.clone());
        cv.skills = results.skills.clone();
        cv.experiences = results.experiences.clone();
        cv.educations = results.educations.clone();
        cv.suggestions = results.suggestions.clone();
        cv.score = results.score;
        cv.processing_error = results.warning.clone();
        cv.updated_at = Utc::now();
        Ok(())
    }
}

// ── User directory ──────────────────────────────────────────────────────────

pub struct StaticUserDirectory {
    user_id: Uuid,
    prefs: UserJobPreferences,
}

impl StaticUserDirectory {
    pub fn new(user_id: Uuid, prefs: UserJobPreferences) -> Self {
        Self { user_id, prefs }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn preferences(&self, user_id: Uuid) -> Result<Option<UserJobPreferences>, AppError> {
        Ok((user_id == self.user_id).then(|| self.prefs.clone()))
    }
}

// ── Scrapers ────────────────────────────────────────────────────────────────

pub struct StaticScraper {
    name: String,
    jobs: Vec<ScrapedJob>,
}

impl StaticScraper {
    pub fn new(name: &str, jobs: Vec<ScrapedJob>) -> Self {
        Self {
            name: name.to_string(),
            jobs,
        }
    }
}

#[async_trait]
impl JobScraper for StaticScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        "https://example.test"
    }

    fn rate_limit_rpm(&self) -> u32 {
        60
    }

    async fn scrape(
        &self,
        _ctx: &CancellationToken,
        max_jobs: usize,
    ) -> Result<Vec<ScrapedJob>, AppError> {
        let mut jobs: Vec<ScrapedJob> = self
            .jobs
            .iter()
            .cloned()
            .map(|mut job| {
                job.source = self.name.clone();
                job
            })
            .collect();
        if max_jobs > 0 {
            jobs.truncate(max_jobs);
        }
        Ok(jobs)
    }
}

pub struct FailingScraper {
    name: String,
    error: String,
}

impl FailingScraper {
    pub fn new(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
impl JobScraper for FailingScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        "https://example.test"
    }

    fn rate_limit_rpm(&self) -> u32 {
        60
    }

    async fn scrape(
        &self,
        _ctx: &CancellationToken,
        _max_jobs: usize,
    ) -> Result<Vec<ScrapedJob>, AppError> {
        Err(AppError::SourceUnavailable(format!(
            "{}: {}",
            self.name, self.error
        )))
    }
}

// ── Object store ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_document(
        &self,
        user_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileRef, AppError> {
        let key = format!("documents/{user_id}/{}-{file_name}", Uuid::new_v4());
        let file_ref = FileRef::new("documents", &key);
        self.objects
            .lock()
            .await
            .insert(file_ref.as_str().to_string(), bytes);
        Ok(file_ref)
    }

    async fn get(&self, file_ref: &FileRef) -> Result<Vec<u8>, AppError> {
        self.objects
            .lock()
            .await
            .get(file_ref.as_str())
            .cloned()
            .ok_or_else(|| AppError::StorageIo("object not found".to_string()))
    }

    async fn presign_get(&self, file_ref: &FileRef, _ttl: Duration) -> Result<String, AppError> {
        Ok(format!("https://storage.test/{}", file_ref.as_str()))
    }
}

// ── Extractor and analyzer ──────────────────────────────────────────────────

pub struct StaticExtractor {
    text: String,
}

impl StaticExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<String, AppError> {
        Ok(self.text.clone())
    }
}

pub struct FailingExtractor;

#[async_trait]
impl TextExtractor for FailingExtractor {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<String, AppError> {
        Err(AppError::StorageIo("corrupt pdf".to_string()))
    }
}

pub struct StaticAnalyzer {
    suggestions: Vec<Suggestion>,
}

impl StaticAnalyzer {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }
}

#[async_trait]
impl CvAnalyzer for StaticAnalyzer {
    async fn analyze_cv(
        &self,
        _ctx: &CancellationToken,
        _raw_text: &str,
    ) -> Result<Vec<Suggestion>, AiError> {
        Ok(self.suggestions.clone())
    }
}

pub struct FailingAnalyzer;

#[async_trait]
impl CvAnalyzer for FailingAnalyzer {
    async fn analyze_cv(
        &self,
        _ctx: &CancellationToken,
        _raw_text: &str,
    ) -> Result<Vec<Suggestion>, AiError> {
        Err(AiError::Api {
            status: 503,
            message: "model overloaded".to_string(),
        })
    }
}

// ── Contract tests for the fakes themselves ─────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scraped(url: &str, title: &str) -> ScrapedJob {
        ScrapedJob {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            description: String::new(),
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

    #[tokio::test]
    async fn test_bulk_upsert_is_idempotent_and_preserves_created_at() {
        let store = InMemoryJobStore::default();

        let first = vec![scraped("u1", "A"), scraped("u2", "B")];
        store.bulk_upsert(&first).await.unwrap();
        let original = store.get_by_apply_url("u1").await.unwrap().unwrap();

        // Second run retitles u1 and repeats u2 unchanged.
        let second = vec![scraped("u1", "A2"), scraped("u2", "B")];
        store.bulk_upsert(&second).await.unwrap();
        store.bulk_upsert(&second).await.unwrap(); // rerun: same end state

        assert_eq!(store.len().await, 2);
        let updated = store.get_by_apply_url("u1").await.unwrap().unwrap();
        assert_eq!(updated.title, "A2");
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.id, original.id);

        let untouched = store.get_by_apply_url("u2").await.unwrap().unwrap();
        assert_eq!(untouched.title, "B");
    }

    #[tokio::test]
    async fn test_apply_url_unique_across_store() {
        let store = InMemoryJobStore::default();
        store.create(&scraped("u1", "A")).await.unwrap();
        let err = store.create(&scraped("u1", "A again")).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_bulk_upsert_skips_bad_documents() {
        let store = InMemoryJobStore::default();
        let batch = vec![scraped("", "bad"), scraped("u1", "good")];
        let outcome = store.bulk_upsert(&batch).await.unwrap();
        assert_eq!(outcome.upserted, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(store.len().await, 1);
    }
}
