//! The CV processing worker.
//!
//! Single-threaded loop per worker: dequeue an id, claim the record, run
//! download -> extract -> parse -> analyze -> score, and persist the
//! terminal state. Download/extraction/persistence errors are fatal
//! (`Failed`); AI errors and low-confidence parses complete the job with a
//! recorded warning.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::extract::TextExtractor;
use super::parser;
use super::queue::CvQueue;
use super::scoring::calculate_score;
use crate::ai::CvAnalyzer;
use crate::errors::AppError;
use crate::models::cv::CvResults;
use crate::repository::CvStore;
use crate::storage::{FileRef, ObjectStore};

/// Warning recorded when the AI collaborator is down or misbehaving.
pub const WARN_AI_UNAVAILABLE: &str = "ai_unavailable";
/// Warning recorded when no section of the CV was recognized.
pub const WARN_LOW_CONFIDENCE: &str = "low_confidence_parse";

pub struct CvWorker {
    queue: Arc<dyn CvQueue>,
    cvs: Arc<dyn CvStore>,
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    /// Absent when the AI provider is not configured; the pipeline then
    /// always degrades to `ai_unavailable`.
    analyzer: Option<Arc<dyn CvAnalyzer>>,
}

impl CvWorker {
    pub fn new(
        queue: Arc<dyn CvQueue>,
        cvs: Arc<dyn CvStore>,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Option<Arc<dyn CvAnalyzer>>,
    ) -> Self {
        Self {
            queue,
            cvs,
            store,
            extractor,
            analyzer,
        }
    }

    /// Runs until `ctx` is cancelled.
    pub async fn run(&self, ctx: CancellationToken) {
        info!("CV worker started, waiting for jobs");
        loop {
            let id = match self.queue.dequeue(&ctx).await {
                Ok(id) => id,
                Err(AppError::Cancelled) => {
                    info!("CV worker shutting down");
                    return;
                }
                Err(e) => {
                    error!("dequeue failed: {e}");
                    continue;
                }
            };

            info!(cv_id = %id, "processing CV job");
            if let Err(e) = self.process(&ctx, id).await {
                // `process` already records the terminal state; this only
                // covers repository failures while doing so.
                error!(cv_id = %id, "unrecoverable worker error: {e}");
            }
        }
    }

    /// Walks one CV through the state machine.
    pub async fn process(&self, ctx: &CancellationToken, id: Uuid) -> Result<(), AppError> {
        if !self.cvs.claim(id).await? {
            warn!(cv_id = %id, "skipping: not in pending state (already claimed?)");
            return Ok(());
        }

        let record = match self.cvs.get_by_id(id).await? {
            Some(record) => record,
            None => {
                self.cvs.mark_failed(id, "record vanished after claim").await?;
                return Ok(());
            }
        };

        let file_ref = match FileRef::parse(&record.file_ref) {
            Ok(r) => r,
            Err(e) => {
                self.cvs.mark_failed(id, &e.to_string()).await?;
                return Ok(());
            }
        };

        let bytes = match self.store.get(&file_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(cv_id = %id, "download failed: {e}");
                self.cvs.mark_failed(id, &format!("download failed: {e}")).await?;
                return Ok(());
            }
        };

        let raw_text = match self.extractor.extract_text(&bytes).await {
            Ok(text) => text,
            Err(e) => {
                warn!(cv_id = %id, "text extraction failed: {e}");
                self.cvs
                    .mark_failed(id, &format!("text extraction failed: {e}"))
                    .await?;
                return Ok(());
            }
        };

        let parsed = parser::parse(&raw_text);

        let (suggestions, mut warning) = match &self.analyzer {
            Some(analyzer) => match analyzer.analyze_cv(ctx, &raw_text).await {
                Ok(suggestions) => (suggestions, None),
                Err(e) => {
                    warn!(cv_id = %id, "AI analysis unavailable: {e}");
                    (Vec::new(), Some(WARN_AI_UNAVAILABLE.to_string()))
                }
            },
            None => (Vec::new(), Some(WARN_AI_UNAVAILABLE.to_string())),
        };

        if parsed.is_low_confidence() && warning.is_none() {
            warning = Some(WARN_LOW_CONFIDENCE.to_string());
        }

        let results = CvResults {
            raw_text,
            skills: parsed.skills,
            experiences: parsed.experiences,
            educations: parsed.educations,
            score: calculate_score(&suggestions),
            suggestions,
            warning,
        };

        self.cvs.complete(id, &results).await?;
        info!(cv_id = %id, score = results.score, "CV job completed");
        Ok(())
    }
}
