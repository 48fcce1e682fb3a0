use anyhow::{anyhow, Context, Result};

use crate::llm_client::cache::DEFAULT_CAPACITY;
use crate::llm_client::image_gen::RetryPolicy;
use crate::llm_client::DEFAULT_API_BASE;

/// Application configuration loaded from environment variables.
/// Startup fails if `GEMINI_API_KEY` is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    /// Key for the image-capable model. Falls back to `gemini_api_key`.
    pub gemini_image_api_key: String,
    pub gemini_api_base: String,
    pub cache_capacity: usize,
    pub image_retry_policy: RetryPolicy,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gemini_api_key = require(&lookup, "GEMINI_API_KEY")?;

        Ok(Config {
            gemini_image_api_key: lookup("GEMINI_IMAGE_API_KEY")
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| gemini_api_key.clone()),
            gemini_api_key,
            gemini_api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            cache_capacity: lookup("CACHE_CAPACITY")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("CACHE_CAPACITY must be a non-negative integer")?
                .unwrap_or(DEFAULT_CAPACITY),
            image_retry_policy: lookup("IMAGE_RETRY_POLICY")
                .map(|v| v.parse::<RetryPolicy>())
                .transpose()
                .map_err(|e| anyhow!(e))
                .context("IMAGE_RETRY_POLICY is invalid")?
                .unwrap_or_default(),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}
