use async_trait::async_trait;

use crate::errors::AppError;

/// PDF text extraction collaborator. The worker only ever sees this trait;
/// the concrete backend is chosen at startup.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, AppError>;
}

/// `pdf-extract`-backed implementation. Extraction is CPU-bound, so it runs
/// on the blocking pool.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, AppError> {
        let bytes = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
            .map_err(|e| AppError::StorageIo(format!("pdf extraction failed: {e}")))?;
        Ok(text)
    }
}
