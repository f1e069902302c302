//! Gemini-backed AI client.
//!
//! Calls the provider's v1 `generateContent` endpoint, normalizing model
//! aliases and falling back through a fixed candidate list when a model is
//! reported missing. The first candidate that answers is adopted for
//! subsequent calls (in memory only, behind a write-exclusive guard). When
//! every candidate fails that way, a direct v1beta call retries the same
//! candidates with a `-latest` suffix.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::prompts::analyze_cv_prompt;
use super::{AiError, ChatTurn, CvAnalyzer, Generator};
use crate::limiter::TokenBucket;
use crate::models::cv::Suggestion;

const V1_BASE: &str = "https://generativelanguage.googleapis.com/v1";
const V1BETA_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const AI_HTTP_TIMEOUT: Duration = Duration::from_secs(20);
/// CV text is truncated to this many bytes before prompting.
const MAX_CV_PROMPT_LEN: usize = 8_000;

/// Fallback models tried, in order, after the configured one.
const FALLBACK_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-flash-8b", "gemini-1.5-pro"];

/// Resolves common aliases and strips the `-latest` suffix other SDKs use.
pub fn normalize_model(name: &str) -> String {
    let n = name.trim().to_lowercase();
    if n.is_empty() {
        return "gemini-1.5-pro".to_string();
    }
    match n.as_str() {
        "gemini-1.5-pro" | "gemini-pro" | "pro" => "gemini-1.5-pro".to_string(),
        "gemini-1.5-flash" | "gemini-flash" | "flash" => "gemini-1.5-flash".to_string(),
        "gemini-1.5-flash-8b" | "flash-8b" => "gemini-1.5-flash-8b".to_string(),
        _ => n.trim_end_matches("-latest").to_string(),
    }
}

/// Whether an API failure means "this model does not exist here".
fn is_model_not_found(status: u16, message: &str) -> bool {
    let message = message.to_lowercase();
    status == 404 || message.contains("not found") || message.contains("not supported")
}

/// Isolates the first JSON array in model output: strips markdown fences
/// and takes the substring between the first `[` and the last `]`.
pub fn extract_json_array(text: &str) -> &str {
    let mut text = text.trim();
    text = text.strip_prefix("```json").unwrap_or(text);
    text = text.strip_prefix("```").unwrap_or(text);
    text = text.strip_suffix("```").unwrap_or(text);
    let text = text.trim();

    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

// ── Client ──────────────────────────────────────────────────────────────────

pub struct GeminiClient {
    api_key: String,
    configured_model: String,
    /// The model adopted after a successful fallback. In-memory only.
    adopted_model: RwLock<String>,
    rate_limiter: Option<TokenBucket>,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, rpm: u32) -> Self {
        let configured_model = normalize_model(model);
        Self {
            api_key,
            adopted_model: RwLock::new(configured_model.clone()),
            configured_model,
            rate_limiter: (rpm > 0).then(|| TokenBucket::per_minute(rpm)),
            http: Client::builder()
                .timeout(AI_HTTP_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    /// The configured model followed by the fixed fallback list, deduped.
    fn candidates(&self) -> Vec<String> {
        let mut out = vec![self.configured_model.clone()];
        for fallback in FALLBACK_MODELS {
            if !out.iter().any(|m| m == fallback) {
                out.push(fallback.to_string());
            }
        }
        out
    }

    async fn wait_for_permit(&self, ctx: &CancellationToken) -> Result<(), AiError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire(ctx).await.map_err(|_| AiError::Cancelled)?;
        }
        Ok(())
    }

    async fn call_model(
        &self,
        base: &str,
        model: &str,
        contents: &[Content],
    ) -> Result<String, AiError> {
        let url = format!("{base}/models/{model}:generateContent?key={}", self.api_key);
        let response = self
            .http
            .post(&url)
            .json(&GenerateRequest {
                contents: contents.to_vec(),
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body: GenerateResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if !(200..300).contains(&status) => {
                return Err(AiError::Api {
                    status,
                    message: "unreadable error body".to_string(),
                })
            }
            Err(e) => return Err(AiError::Http(e)),
        };

        if let Some(error) = body.error {
            return Err(AiError::Api {
                status,
                message: error.message,
            });
        }
        if !(200..300).contains(&status) {
            return Err(AiError::Api {
                status,
                message: "request failed".to_string(),
            });
        }

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or(AiError::InvalidResponse)
    }

    /// Tries the adopted model, then walks the candidate list on
    /// model-not-found failures, then retries over v1beta with `-latest`
    /// variants. Any other failure propagates immediately.
    async fn call_with_fallback(&self, contents: &[Content]) -> Result<String, AiError> {
        let adopted = self.adopted_model.read().await.clone();
        match self.call_model(V1_BASE, &adopted, contents).await {
            Ok(text) => return Ok(text),
            Err(AiError::Api { status, message })
                if is_model_not_found(status, &message) =>
            {
                warn!(model = %adopted, "model rejected, walking fallback candidates");
            }
            Err(e) => return Err(e),
        }

        for candidate in self.candidates() {
            let model = normalize_model(&candidate);
            match self.call_model(V1_BASE, &model, contents).await {
                Ok(text) => {
                    debug!(model = %model, "adopting working model");
                    *self.adopted_model.write().await = model;
                    return Ok(text);
                }
                Err(AiError::Api { status, message })
                    if is_model_not_found(status, &message) => {}
                Err(e) => return Err(e),
            }
        }

        // Final fallback: direct v1beta call, candidates with -latest too.
        let mut last_err = AiError::NoModelAvailable;
        for candidate in self.candidates() {
            let base_model = normalize_model(&candidate);
            let mut variants = vec![base_model.clone()];
            if !base_model.ends_with("-latest") {
                variants.push(format!("{base_model}-latest"));
            }
            for model in variants {
                match self.call_model(V1BETA_BASE, &model, contents).await {
                    Ok(text) => return Ok(text),
                    Err(AiError::Api { status, message })
                        if is_model_not_found(status, &message) =>
                    {
                        last_err = AiError::Api { status, message };
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Err(last_err)
    }

    fn chat_contents(prompt: &str, history: &[ChatTurn]) -> Vec<Content> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: Some(if turn.role == "assistant" {
                    "model".to_string()
                } else {
                    "user".to_string()
                }),
                parts: vec![Part {
                    text: turn.content.clone(),
                }],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        });
        contents
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(
        &self,
        ctx: &CancellationToken,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<String, AiError> {
        self.wait_for_permit(ctx).await?;
        let contents = Self::chat_contents(prompt, history);
        self.call_with_fallback(&contents).await
    }
}

#[async_trait]
impl CvAnalyzer for GeminiClient {
    async fn analyze_cv(
        &self,
        ctx: &CancellationToken,
        raw_text: &str,
    ) -> Result<Vec<Suggestion>, AiError> {
        self.wait_for_permit(ctx).await?;

        let mut raw_text = raw_text;
        if raw_text.len() > MAX_CV_PROMPT_LEN {
            let mut cut = MAX_CV_PROMPT_LEN;
            while !raw_text.is_char_boundary(cut) {
                cut -= 1;
            }
            raw_text = &raw_text[..cut];
        }

        let prompt = analyze_cv_prompt(raw_text);
        let contents = Self::chat_contents(&prompt, &[]);
        let text = self.call_with_fallback(&contents).await?;

        decode_suggestions(&text)
    }
}

/// Decodes the model's reply into suggestions; zero items is a protocol
/// violation, not an empty result.
fn decode_suggestions(text: &str) -> Result<Vec<Suggestion>, AiError> {
    let json = extract_json_array(text);
    let mut suggestions: Vec<Suggestion> =
        serde_json::from_str(json).map_err(|_| AiError::InvalidResponse)?;
    if suggestions.is_empty() {
        return Err(AiError::InvalidResponse);
    }
    for suggestion in &mut suggestions {
        suggestion.applied = false;
    }
    Ok(suggestions)
}
