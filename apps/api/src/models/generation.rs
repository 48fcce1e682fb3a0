use serde::Serialize;

/// One ordered piece of a prompt sent to the generative model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl PromptPart {
    pub fn text(text: impl Into<String>) -> Self {
        PromptPart::Text(text.into())
    }

    /// Wraps an image file, sniffing the MIME type from the magic bytes.
    /// Extracted résumé images are always JPEG or PNG; anything unrecognized
    /// is labelled JPEG.
    pub fn image(data: Vec<u8>) -> Self {
        let mime_type = match image::guess_format(&data) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::Gif) => "image/gif",
            Ok(image::ImageFormat::WebP) => "image/webp",
            _ => "image/jpeg",
        };
        PromptPart::Image {
            mime_type: mime_type.to_string(),
            data,
        }
    }
}

/// Outcome of a prompt task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Text(String),
    /// `data:image/png;base64,...`
    Image(String),
    /// The model produced nothing usable. Not an error.
    Absent,
}

impl GenerationResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            GenerationResult::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ok,
    /// Generated, but blocked by the safety filter.
    Suppressed,
    Empty,
}

/// Response body for every prompt-task route.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Every prompt task the assistant offers. Each maps to one fixed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTask {
    CareerAdviceDetailed,
    CareerAdviceShort,
    MockInterview,
    Trends,
    SimilarJobs,
    ImageCaption,
    MultimodalCareerAdvice,
    InterpretableAndFairAdvice,
    SdlcPlan,
    ImageGeneration,
}

impl PromptTask {
    /// Stable name, used in cache keys and logs.
    pub fn name(self) -> &'static str {
        match self {
            PromptTask::CareerAdviceDetailed => "career_advice_detailed",
            PromptTask::CareerAdviceShort => "career_advice_short",
            PromptTask::MockInterview => "mock_interview",
            PromptTask::Trends => "trends",
            PromptTask::SimilarJobs => "similar_jobs",
            PromptTask::ImageCaption => "image_caption",
            PromptTask::MultimodalCareerAdvice => "multimodal_career_advice",
            PromptTask::InterpretableAndFairAdvice => "interpretable_and_fair_advice",
            PromptTask::SdlcPlan => "sdlc_plan",
            PromptTask::ImageGeneration => "image_generation",
        }
    }
}
