use std::io::Cursor;

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use crate::advice::handlers::task_response;
use crate::errors::AppError;
use crate::models::content::{ExtractedContent, ExtractionPreview};
use crate::models::generation::{TaskResponse, TaskStatus};
use crate::resume::extractor;
use crate::session::session_id;
use crate::state::AppState;
use crate::upload::{collect_form, is_pdf, UploadForm, UploadedFile};

const RESUME_FIELD: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdviceLength {
    Detailed,
    Short,
}

impl AdviceLength {
    fn from_form(form: &UploadForm) -> Result<Self, AppError> {
        match form.field("length").map(str::to_ascii_lowercase).as_deref() {
            None | Some("detailed") => Ok(AdviceLength::Detailed),
            Some("short") => Ok(AdviceLength::Short),
            Some(other) => Err(AppError::Validation(format!(
                "Unknown advice length '{other}'. Use 'detailed' or 'short'."
            ))),
        }
    }
}

/// Runs the PDF extractor on the blocking pool.
async fn extract_resume(file: &UploadedFile) -> Result<ExtractedContent, AppError> {
    if !is_pdf(file) {
        return Err(AppError::Validation(
            "Please upload your resume as a PDF file".to_string(),
        ));
    }

    let mut reader = Cursor::new(file.bytes.clone());
    let content = tokio::task::spawn_blocking(move || extractor::extract(&mut reader))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    info!(
        "Extracted resume: {} chars, {} images",
        content.text.len(),
        content.images.len()
    );
    Ok(content)
}

fn require_text(content: &ExtractedContent) -> Result<&str, AppError> {
    let text = content.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(
            "No text could be extracted from the uploaded resume".to_string(),
        ));
    }
    Ok(text)
}

/// POST /api/v1/resume/extract
pub async fn handle_extract(multipart: Multipart) -> Result<Json<ExtractionPreview>, AppError> {
    let form = collect_form(multipart, RESUME_FIELD).await?;
    let content = extract_resume(form.require_file(RESUME_FIELD)?).await?;
    Ok(Json(ExtractionPreview::from(&content)))
}

/// POST /api/v1/resume/advice
///
/// `responsible_ai` wins over `multimodal`, which wins over `length`.
pub async fn handle_advice(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<TaskResponse>, AppError> {
    let form = collect_form(multipart, RESUME_FIELD).await?;
    let length = AdviceLength::from_form(&form)?;
    let content = extract_resume(form.require_file(RESUME_FIELD)?).await?;
    let assistant = &state.assistant;

    let result = if form.flag("responsible_ai") {
        assistant
            .interpretable_and_fair_advice(require_text(&content)?)
            .await?
    } else if form.flag("multimodal") {
        if content.text.trim().is_empty() && content.images.is_empty() {
            return Err(AppError::Validation(
                "The uploaded resume has no text or images to analyze".to_string(),
            ));
        }
        assistant
            .multimodal_career_advice(&content.text, &content.images)
            .await?
    } else {
        let text = require_text(&content)?;
        match length {
            AdviceLength::Detailed => assistant.career_advice_detailed(text).await?,
            AdviceLength::Short => assistant.career_advice_short(text).await?,
        }
    };

    let response = task_response(result);
    if response.status == TaskStatus::Ok {
        let session = session_id(&headers);
        let count = state.sessions.record_resume_analyzed(&session);
        info!("Session {session} has analyzed {count} resume(s)");
    }
    Ok(Json(response))
}

/// POST /api/v1/resume/similar-jobs
pub async fn handle_similar_jobs(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TaskResponse>, AppError> {
    let form = collect_form(multipart, RESUME_FIELD).await?;
    let content = extract_resume(form.require_file(RESUME_FIELD)?).await?;
    let result = state
        .assistant
        .similar_jobs(require_text(&content)?)
        .await?;
    Ok(Json(task_response(result)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with_length(length: &str) -> UploadForm {
        let mut form = UploadForm::default();
        form.fields.insert("length".into(), length.into());
        form
    }

    #[test]
    fn test_advice_length_defaults_to_detailed() {
        assert_eq!(
            AdviceLength::from_form(&UploadForm::default()).unwrap(),
            AdviceLength::Detailed
        );
        assert_eq!(
            AdviceLength::from_form(&form_with_length("SHORT")).unwrap(),
            AdviceLength::Short
        );
        assert!(AdviceLength::from_form(&form_with_length("medium")).is_err());
    }

    #[test]
    fn test_require_text_rejects_blank_extraction() {
        let blank = ExtractedContent {
            text: " \n ".to_string(),
            images: vec![vec![1, 2, 3]],
        };
        assert!(require_text(&blank).is_err());
    }
}
