//! Image generation: the only remote call in CareerCraft that is retried.
//!
//! Attempts are numbered from 1. After failed attempt `n` the task sleeps
//! `2^n` seconds, for at most [`MAX_IMAGE_ATTEMPTS`] attempts (2+4+8+16+32 =
//! 62s worst case). Running out of attempts yields `None`, never an error.
//! A response without an inline image also yields `None`, immediately.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::llm_client::cache::{cache_key, ResponseCache};
use crate::llm_client::{
    Content, GeminiClient, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    LlmError, RequestPart,
};
use crate::models::generation::{PromptPart, PromptTask};

pub const MAX_IMAGE_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_SECS: u64 = 2;

/// Which failures consume an attempt and trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Transport errors, rate limiting and 5xx are retried. Any other failure
    /// (4xx, malformed JSON) ends the loop at once.
    #[default]
    TransportOnly,
    /// Every failure is retried until the attempt budget runs out.
    AnyFailure,
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transport-only" | "transport_only" => Ok(RetryPolicy::TransportOnly),
            "any-failure" | "any_failure" => Ok(RetryPolicy::AnyFailure),
            other => Err(format!(
                "unknown retry policy '{other}' (expected 'transport-only' or 'any-failure')"
            )),
        }
    }
}

/// Delay after failed attempt `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(BACKOFF_BASE_SECS.pow(attempt))
}

/// Single-part text request asking for TEXT and IMAGE modalities.
pub fn image_request(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: None,
            parts: vec![RequestPart::Text {
                text: prompt.to_string(),
            }],
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["TEXT", "IMAGE"],
        }),
    }
}

/// Transport to an image-capable model. One call is one attempt.
#[async_trait]
pub trait ImageEndpoint: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError>;
}

#[async_trait]
impl ImageEndpoint for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        self.send(request).await
    }
}

pub struct ImageGenerator {
    endpoint: Arc<dyn ImageEndpoint>,
    policy: RetryPolicy,
    cache: ResponseCache<String>,
}

impl ImageGenerator {
    pub fn new(endpoint: Arc<dyn ImageEndpoint>, policy: RetryPolicy, cache_capacity: usize) -> Self {
        Self {
            endpoint,
            policy,
            cache: ResponseCache::new(cache_capacity),
        }
    }

    fn should_retry(&self, error: &LlmError) -> bool {
        match self.policy {
            RetryPolicy::TransportOnly => error.is_transient(),
            RetryPolicy::AnyFailure => true,
        }
    }

    /// Generates an image for `prompt` and returns it as a PNG data URL, or
    /// `None` when no image could be produced.
    pub async fn generate_image(&self, prompt: &str) -> Option<String> {
        let key = cache_key(
            self.endpoint.model_name(),
            PromptTask::ImageGeneration.name(),
            &[PromptPart::text(prompt)],
        );
        if let Some(hit) = self.cache.get(&key) {
            debug!("Image generation served from cache");
            return Some(hit);
        }

        let request = image_request(prompt);

        for attempt in 1..=MAX_IMAGE_ATTEMPTS {
            match self.endpoint.generate(&request).await {
                Ok(response) => {
                    let Some(data) = response.first_inline_data() else {
                        debug!("Image response carried no inline image");
                        return None;
                    };
                    let data_url = format!("data:image/png;base64,{data}");
                    self.cache.insert(key, data_url.clone());
                    return Some(data_url);
                }
                Err(e) if self.should_retry(&e) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Image generation attempt {}/{} failed: {}; backing off {}s",
                        attempt,
                        MAX_IMAGE_ATTEMPTS,
                        e,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("Image generation failed with non-retryable error: {e}");
                    return None;
                }
            }
        }

        warn!("Image generation gave up after {MAX_IMAGE_ATTEMPTS} attempts");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    type Responder = fn(u32) -> Result<GenerateContentResponse, LlmError>;

    /// Answers attempt `n` (1-based) with `respond(n)` and counts calls.
    struct StubEndpoint {
        calls: AtomicU32,
        respond: Responder,
    }

    impl StubEndpoint {
        fn new(respond: Responder) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                respond,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageEndpoint for StubEndpoint {
        fn model_name(&self) -> &str {
            "stub-image-model"
        }

        async fn generate(
            &self,
            _request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse, LlmError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            (self.respond)(attempt)
        }
    }

    fn image_response() -> GenerateContentResponse {
        serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "A lighthouse at dusk"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
            ]}}]
        }))
        .unwrap()
    }

    fn transport_error() -> LlmError {
        LlmError::Transport("connection reset by peer".to_string())
    }

    fn malformed_json() -> LlmError {
        LlmError::Parse(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
    }

    fn generator(endpoint: Arc<StubEndpoint>, policy: RetryPolicy) -> ImageGenerator {
        ImageGenerator::new(endpoint, policy, 16)
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_fourth_attempt_after_backoff() {
        let endpoint = StubEndpoint::new(|attempt| {
            if attempt <= 3 {
                Err(transport_error())
            } else {
                Ok(image_response())
            }
        });
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        let start = Instant::now();
        let result = images.generate_image("a lighthouse").await;

        assert_eq!(
            result.as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
        assert_eq!(endpoint.calls(), 4);
        assert!(start.elapsed() >= Duration::from_secs(2 + 4 + 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_transport_gives_up_after_five_attempts() {
        let endpoint = StubEndpoint::new(|_| Err(transport_error()));
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        let start = Instant::now();
        let result = images.generate_image("a lighthouse").await;

        assert!(result.is_none());
        assert_eq!(endpoint.calls(), MAX_IMAGE_ATTEMPTS);
        assert!(start.elapsed() >= Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_candidates_returns_none_without_retry() {
        let endpoint =
            StubEndpoint::new(|_| Ok(serde_json::from_value(json!({"candidates": []})).unwrap()));
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        let start = Instant::now();
        assert!(images.generate_image("a lighthouse").await.is_none());
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_only_candidate_returns_none_without_retry() {
        let endpoint = StubEndpoint::new(|_| {
            Ok(serde_json::from_value(json!({
                "candidates": [{"content": {"parts": [{"text": "I cannot draw that"}]}}]
            }))
            .unwrap())
        });
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        assert!(images.generate_image("a lighthouse").await.is_none());
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_json_is_not_retried_under_transport_only() {
        let endpoint = StubEndpoint::new(|_| Err(malformed_json()));
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        assert!(images.generate_image("a lighthouse").await.is_none());
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_json_is_retried_under_any_failure() {
        let endpoint = StubEndpoint::new(|_| Err(malformed_json()));
        let images = generator(endpoint.clone(), RetryPolicy::AnyFailure);

        assert!(images.generate_image("a lighthouse").await.is_none());
        assert_eq!(endpoint.calls(), MAX_IMAGE_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried() {
        let endpoint = StubEndpoint::new(|attempt| {
            if attempt == 1 {
                Err(LlmError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            } else {
                Ok(image_response())
            }
        });
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        assert!(images.generate_image("a lighthouse").await.is_some());
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_image_is_cached_by_prompt() {
        let endpoint = StubEndpoint::new(|_| Ok(image_response()));
        let images = generator(endpoint.clone(), RetryPolicy::TransportOnly);

        let first = images.generate_image("a lighthouse").await;
        let second = images.generate_image("a lighthouse").await;
        let other = images.generate_image("a harbour").await;

        assert_eq!(first, second);
        assert!(other.is_some());
        assert_eq!(endpoint.calls(), 2);
    }

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<u64> = (1..=MAX_IMAGE_ATTEMPTS)
            .map(|a| backoff_delay(a).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_image_request_wire_shape() {
        let value = serde_json::to_value(image_request("a lighthouse")).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"parts": [{"text": "a lighthouse"}]}],
                "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}
            })
        );
    }

    #[test]
    fn test_retry_policy_from_str() {
        assert_eq!(
            "transport-only".parse::<RetryPolicy>(),
            Ok(RetryPolicy::TransportOnly)
        );
        assert_eq!(
            "ANY-FAILURE".parse::<RetryPolicy>(),
            Ok(RetryPolicy::AnyFailure)
        );
        assert!("sometimes".parse::<RetryPolicy>().is_err());
    }
}
