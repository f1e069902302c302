//! AI collaborator surface: chat-style generation and structured CV
//! analysis. The concrete Gemini client lives in `gemini`; the worker and
//! handlers depend only on these traits.

#![allow(dead_code)]

pub mod gemini;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::cv::Suggestion;

/// One prior turn of a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("no available model among candidates")]
    NoModelAvailable,

    #[error("AI returned no usable content")]
    InvalidResponse,

    #[error("rate limit wait aborted")]
    Cancelled,
}

/// Chat-style completion.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        ctx: &CancellationToken,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<String, AiError>;
}

/// Structured CV analysis: a JSON array of improvement suggestions.
#[async_trait]
pub trait CvAnalyzer: Send + Sync {
    async fn analyze_cv(
        &self,
        ctx: &CancellationToken,
        raw_text: &str,
    ) -> Result<Vec<Suggestion>, AiError>;
}
