use anyhow::{Context, Result};
use tracing::warn;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing; optional blocks
/// (AI, object storage, Redis) degrade gracefully when absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    pub environment: String,

    // Object storage (S3-compatible)
    pub storage_access_key: Option<String>,
    pub storage_secret_key: Option<String>,
    pub file_storage_url: Option<String>,
    pub documents_bucket: String,
    pub max_allowed_file_size: i64,
    pub max_file_url_life_secs: u64,

    // AI provider
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_rpm: u32,

    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            jwt_secret: require_env("JWT_SECRET")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            storage_access_key: optional_env("STORAGE_ACCESS_KEY"),
            storage_secret_key: optional_env("STORAGE_SECRET_KEY"),
            file_storage_url: optional_env("FILE_STORAGE_URL"),
            documents_bucket: std::env::var("DOCUMENTS_BUCKET")
                .unwrap_or_else(|_| "documents".to_string()),
            max_allowed_file_size: std::env::var("MAX_ALLOWED_FILE_SIZE")
                .unwrap_or_else(|_| "3000000".to_string())
                .parse::<i64>()
                .context("MAX_ALLOWED_FILE_SIZE must be an integer byte count")?,
            max_file_url_life_secs: std::env::var("MAX_FILE_URL_LIFE")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .context("MAX_FILE_URL_LIFE must be an integer number of seconds")?,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            gemini_rpm: std::env::var("GEMINI_RPM")
                .unwrap_or_else(|_| "0".to_string())
                .parse::<u32>()
                .context("GEMINI_RPM must be a non-negative integer")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        if config.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY not set — CV analysis will degrade to ai_unavailable");
        }
        if config.redis_url.is_none() {
            warn!("REDIS_URL not set — falling back to the in-process CV queue");
        }
        if config.file_storage_url.is_none() {
            warn!("FILE_STORAGE_URL not set — CV uploads are disabled");
        }

        Ok(config)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
