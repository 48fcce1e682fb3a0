use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::generation::{GenerationResult, TaskResponse, TaskStatus};
use crate::safety::is_safe;
use crate::state::AppState;
use crate::upload::{collect_form, is_jpeg_or_png};

pub const SUPPRESSED_MESSAGE: &str =
    "Inappropriate content detected in the response. Try with a different input.";
pub const EMPTY_MESSAGE: &str = "No response was generated. Try rephrasing your input.";

const CAPTION_FIELD: &str = "image";

/// Applies the safety gate and shapes any task result for the client.
pub fn task_response(result: GenerationResult) -> TaskResponse {
    match result {
        GenerationResult::Text(text) if !is_safe(&text) => {
            warn!("Generated text blocked by the safety filter");
            TaskResponse {
                status: TaskStatus::Suppressed,
                content: None,
                message: Some(SUPPRESSED_MESSAGE.to_string()),
            }
        }
        GenerationResult::Text(content) | GenerationResult::Image(content) => TaskResponse {
            status: TaskStatus::Ok,
            content: Some(content),
            message: None,
        },
        GenerationResult::Absent => TaskResponse {
            status: TaskStatus::Empty,
            content: None,
            message: Some(EMPTY_MESSAGE.to_string()),
        },
    }
}

fn require_input<'a>(value: &'a str, what: &str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("Please enter {what}.")));
    }
    Ok(value)
}

#[derive(Debug, Deserialize)]
pub struct InterviewRequest {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct TrendsRequest {
    pub interest_area: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectPlanRequest {
    pub project_idea: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ImageGenerationResponse {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/v1/interview
pub async fn handle_mock_interview(
    State(state): State<AppState>,
    Json(req): Json<InterviewRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let topic = require_input(&req.topic, "a topic")?;
    let result = state.assistant.mock_interview(topic).await?;
    Ok(Json(task_response(result)))
}

/// POST /api/v1/trends
pub async fn handle_trends(
    State(state): State<AppState>,
    Json(req): Json<TrendsRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let area = require_input(&req.interest_area, "an area of interest")?;
    let result = state.assistant.trends_and_courses(area).await?;
    Ok(Json(task_response(result)))
}

/// POST /api/v1/projects/plan
pub async fn handle_project_plan(
    State(state): State<AppState>,
    Json(req): Json<ProjectPlanRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let idea = require_input(&req.project_idea, "a project idea")?;
    let result = state.assistant.plan_sdlc_project(idea).await?;
    Ok(Json(task_response(result)))
}

/// POST /api/v1/images/caption
pub async fn handle_image_caption(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TaskResponse>, AppError> {
    let form = collect_form(multipart, CAPTION_FIELD).await?;
    let image = form.require_file(CAPTION_FIELD)?;
    if !is_jpeg_or_png(&image.bytes) {
        return Err(AppError::Validation(
            "Please upload a JPEG or PNG image".to_string(),
        ));
    }

    let result = state
        .assistant
        .image_caption(image.bytes.to_vec(), form.field("prompt"))
        .await?;
    Ok(Json(task_response(result)))
}

/// POST /api/v1/images/generate
///
/// May take up to a minute while the image model is retried.
pub async fn handle_generate_image(
    State(state): State<AppState>,
    Json(req): Json<ImageGenerationRequest>,
) -> Result<Json<ImageGenerationResponse>, AppError> {
    let prompt = require_input(&req.prompt, "an image prompt")?;
    info!("Generating image ({} chars of prompt)", prompt.len());

    let response = match state.assistant.generate_image(prompt).await {
        GenerationResult::Image(data_url) => ImageGenerationResponse {
            status: TaskStatus::Ok,
            data_url: Some(data_url),
            message: None,
        },
        _ => ImageGenerationResponse {
            status: TaskStatus::Empty,
            data_url: None,
            message: Some("Image generation failed. Please try again later.".to_string()),
        },
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_text_passes_through() {
        let response = task_response(GenerationResult::Text("Learn Terraform.".into()));
        assert_eq!(response.status, TaskStatus::Ok);
        assert_eq!(response.content.as_deref(), Some("Learn Terraform."));
    }

    #[test]
    fn test_unsafe_text_is_suppressed() {
        let response = task_response(GenerationResult::Text("how to make a bomb".into()));
        assert_eq!(response.status, TaskStatus::Suppressed);
        assert!(response.content.is_none());
        assert_eq!(response.message.as_deref(), Some(SUPPRESSED_MESSAGE));
    }

    #[test]
    fn test_absent_is_empty() {
        let response = task_response(GenerationResult::Absent);
        assert_eq!(response.status, TaskStatus::Empty);
        assert_eq!(response.message.as_deref(), Some(EMPTY_MESSAGE));
    }

    #[test]
    fn test_blank_input_is_rejected() {
        assert!(require_input("   ", "a topic").is_err());
        assert_eq!(require_input("  SQL ", "a topic").unwrap(), "SQL");
    }
}
