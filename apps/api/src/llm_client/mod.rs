//! LLM Client: the single point of entry for all Gemini API calls in CareerCraft.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! Task code talks to the `GenerativeModel` trait; the image path talks to
//! `image_gen::ImageEndpoint`. Both are implemented by `GeminiClient`.
//!
//! The text path is single-attempt. Retries exist only on the image path.
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::generation::PromptPart;

pub mod cache;
pub mod image_gen;
pub mod prompts;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Text and multimodal model. Hardcoded to prevent drift between deployments.
pub const TEXT_MODEL: &str = "gemini-1.5-flash-latest";
/// Image-capable model used by the image generation path.
pub const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Transport(e.to_string())
    }
}

impl LlmError {
    /// Transport failures, rate limiting and 5xx responses. Everything else
    /// will fail the same way if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::QuotaExhausted(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Parse(_) | LlmError::EmptyContent => false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (generateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default)]
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    fn first_candidate_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate. `None` when there is no
    /// candidate or it carries no text, so unknown shapes fail closed.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .first_candidate_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    /// Base64 payload of the first inline image in the first candidate.
    pub fn first_inline_data(&self) -> Option<&str> {
        self.first_candidate_parts()
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|blob| blob.data.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

/// Builds a single-turn request from ordered prompt parts.
pub fn build_request(parts: &[PromptPart], system: Option<&str>) -> GenerateContentRequest {
    let parts = parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => RequestPart::Text { text: text.clone() },
            PromptPart::Image { mime_type, data } => RequestPart::InlineData {
                inline_data: Blob {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                },
            },
        })
        .collect();

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts,
        }],
        system_instruction: system.map(|s| Content {
            role: None,
            parts: vec![RequestPart::Text {
                text: s.to_string(),
            }],
        }),
        generation_config: None,
    }
}

/// Maps a non-success HTTP response onto the error taxonomy.
fn classify_failure(status: u16, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<GeminiError>(body).ok();
    let exhausted = status == 429
        || parsed
            .as_ref()
            .and_then(|e| e.error.status.as_deref())
            .is_some_and(|s| s == "RESOURCE_EXHAUSTED");
    let message = parsed
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    if exhausted {
        LlmError::QuotaExhausted(message)
    } else {
        LlmError::Api { status, message }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The seam between prompt tasks and the remote model. Swapped for a stub in
/// tests.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Identifies the model in cache keys.
    fn model_name(&self) -> &str;

    /// Sends the ordered parts and returns the primary textual output.
    async fn generate_content(&self, parts: &[PromptPart]) -> Result<String, LlmError>;
}

/// Gemini `generateContent` over HTTPS, bound to one model.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// One POST to the model. No retries here.
    pub async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Gemini API returned {} for {}", status, self.model);
            return Err(classify_failure(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Gemini call succeeded: model={}, prompt_tokens={}, output_tokens={}",
                self.model, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(parsed)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_content(&self, parts: &[PromptPart]) -> Result<String, LlmError> {
        let request = build_request(parts, Some(prompts::SYSTEM_CONTEXT));
        let response = self.send(&request).await?;
        response.text().ok_or(LlmError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use serde_json::json;
    use std::net::SocketAddr;

    const TEST_KEY: &str = "test-key";

    /// Stands in for the Gemini REST API. The model name picks the reply.
    async fn stub_generate(
        Path(call): Path<String>,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(TEST_KEY) {
            return (StatusCode::UNAUTHORIZED, "missing api key".to_string());
        }
        let Some(model) = call.strip_suffix(":generateContent") else {
            return (StatusCode::NOT_FOUND, format!("unknown method {call}"));
        };

        match model {
            "quota-model" => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}})
                    .to_string(),
            ),
            "broken-model" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure".to_string()),
            "garbled-model" => (StatusCode::OK, "not json".to_string()),
            "silent-model" => (StatusCode::OK, json!({"candidates": []}).to_string()),
            "echo-model" => {
                let request: serde_json::Value = serde_json::from_str(&body).unwrap();
                let system = &request["systemInstruction"]["parts"][0]["text"];
                let user = &request["contents"][0]["parts"][0]["text"];
                let text = format!(
                    "system={} user={}",
                    !system.as_str().unwrap_or_default().is_empty(),
                    user.as_str().unwrap_or_default()
                );
                let reply = json!({
                    "candidates": [{"content": {"parts": [{"text": text}]}}],
                    "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3}
                });
                (StatusCode::OK, reply.to_string())
            }
            other => (StatusCode::NOT_FOUND, format!("unknown model {other}")),
        }
    }

    async fn spawn_stub() -> SocketAddr {
        let app = Router::new().route("/models/:call", post(stub_generate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    async fn call(addr: SocketAddr, key: &str, model: &str) -> Result<String, LlmError> {
        let client = GeminiClient::new(key.to_string(), format!("http://{addr}/"), model).unwrap();
        client
            .generate_content(&[PromptPart::text("Review my resume")])
            .await
    }

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_concatenates_first_candidate_parts() {
        let r = response(json!({
            "candidates": [
                {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }));
        assert_eq!(r.text().as_deref(), Some("Hello, world"));
    }

    #[test]
    fn test_text_fails_closed_on_missing_candidates() {
        assert!(response(json!({})).text().is_none());
        assert!(response(json!({"candidates": []})).text().is_none());
        assert!(response(json!({"candidates": [{"finishReason": "SAFETY"}]}))
            .text()
            .is_none());
    }

    #[test]
    fn test_first_inline_data_skips_text_parts() {
        let r = response(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is your image"},
                {"inlineData": {"mimeType": "image/png", "data": "AAAA"}},
                {"inlineData": {"mimeType": "image/png", "data": "BBBB"}}
            ]}}]
        }));
        assert_eq!(r.first_inline_data(), Some("AAAA"));
    }

    #[test]
    fn test_classify_429_as_quota() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        match classify_failure(429, body) {
            LlmError::QuotaExhausted(msg) => assert_eq!(msg, "Quota exceeded"),
            other => panic!("expected quota error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_resource_exhausted_status_as_quota() {
        let body = r#"{"error":{"code":403,"message":"out of credit","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_failure(403, body),
            LlmError::QuotaExhausted(_)
        ));
    }

    #[test]
    fn test_classify_other_status_as_api_error() {
        match classify_failure(400, "not json") {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "not json");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_is_transient() {
        assert!(LlmError::Transport("reset".into()).is_transient());
        assert!(LlmError::QuotaExhausted("slow down".into()).is_transient());
        assert!(LlmError::Api { status: 503, message: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!LlmError::EmptyContent.is_transient());
    }

    #[test]
    fn test_build_request_keeps_part_order_and_encodes_images() {
        let parts = vec![
            PromptPart::text("Analyse this resume"),
            PromptPart::Image {
                mime_type: "image/png".to_string(),
                data: vec![1, 2, 3],
            },
            PromptPart::Image {
                mime_type: "image/jpeg".to_string(),
                data: vec![4, 5, 6],
            },
        ];

        let value = serde_json::to_value(build_request(&parts, Some("system"))).unwrap();

        assert_eq!(
            value,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "Analyse this resume"},
                        {"inlineData": {"mimeType": "image/png", "data": "AQID"}},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "BAUG"}}
                    ]
                }],
                "systemInstruction": {"parts": [{"text": "system"}]}
            })
        );
    }

    #[tokio::test]
    async fn test_send_returns_candidate_text() {
        let addr = spawn_stub().await;
        let text = call(addr, TEST_KEY, "echo-model").await.unwrap();
        assert_eq!(text, "system=true user=Review my resume");
    }

    #[tokio::test]
    async fn test_send_classifies_http_failures() {
        let addr = spawn_stub().await;

        match call(addr, TEST_KEY, "quota-model").await {
            Err(LlmError::QuotaExhausted(msg)) => assert_eq!(msg, "Quota exceeded"),
            other => panic!("expected quota error, got {other:?}"),
        }
        match call(addr, TEST_KEY, "broken-model").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream failure");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        assert!(matches!(
            call(addr, TEST_KEY, "garbled-model").await,
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            call(addr, TEST_KEY, "silent-model").await,
            Err(LlmError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn test_send_puts_key_in_header() {
        let addr = spawn_stub().await;
        match call(addr, "wrong-key", "echo-model").await {
            Err(LlmError::Api { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_reports_unreachable_host_as_transport() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let err = call(addr, TEST_KEY, "echo-model").await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)), "got {err:?}");
        assert!(err.is_transient());
    }
}
