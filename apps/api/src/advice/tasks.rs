//! Career Assistant: one method per prompt task, all funnelled through a
//! single memoized model call.
//!
//! Every task turns its inputs into ordered prompt parts with a fixed template,
//! then calls [`CareerAssistant::invoke`]. Results are memoized by
//! (model, task, parts), so asking the same question twice costs one remote
//! call. Image generation is delegated to [`ImageGenerator`].

use std::sync::Arc;

use tracing::debug;

use crate::advice::prompts::{
    CAREER_ADVICE_DETAILED_TEMPLATE, CAREER_ADVICE_SHORT_TEMPLATE, DEFAULT_CAPTION_PROMPT,
    INTERPRETABLE_AND_FAIR_TEMPLATE, MOCK_INTERVIEW_TEMPLATE, MULTIMODAL_CAREER_ADVICE_TEMPLATE,
    SDLC_PLAN_TEMPLATE, SIMILAR_JOBS_TEMPLATE, TRENDS_TEMPLATE,
};
use crate::llm_client::cache::{cache_key, CacheStats, ResponseCache};
use crate::llm_client::image_gen::ImageGenerator;
use crate::llm_client::{GenerativeModel, LlmError};
use crate::models::generation::{GenerationResult, PromptPart, PromptTask};

/// Caller-supplied inputs for [`CareerAssistant::run`]. Each task reads only
/// the fields it needs:
///
/// - résumé tasks read `text` (the extracted résumé text)
/// - `MultimodalCareerAdvice` reads `text` and `images`
/// - `MockInterview`, `Trends`, `SdlcPlan` and `ImageGeneration` read `text`
///   as the topic / interest area / project idea / image prompt
/// - `ImageCaption` reads the first entry of `images` and an optional `prompt`
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub text: String,
    pub images: Vec<Vec<u8>>,
    pub prompt: Option<String>,
}

/// Builds the ordered prompt parts for a text-producing task.
pub fn build_prompt(task: PromptTask, input: &TaskInput) -> Vec<PromptPart> {
    let fill = |template: &str, placeholder: &str| template.replace(placeholder, &input.text);

    match task {
        PromptTask::CareerAdviceDetailed => vec![PromptPart::Text(fill(
            CAREER_ADVICE_DETAILED_TEMPLATE,
            "{resume_text}",
        ))],
        PromptTask::CareerAdviceShort => vec![PromptPart::Text(fill(
            CAREER_ADVICE_SHORT_TEMPLATE,
            "{resume_text}",
        ))],
        PromptTask::MockInterview => {
            vec![PromptPart::Text(fill(MOCK_INTERVIEW_TEMPLATE, "{topic}"))]
        }
        PromptTask::Trends => vec![PromptPart::Text(fill(TRENDS_TEMPLATE, "{interest_area}"))],
        PromptTask::SimilarJobs => {
            vec![PromptPart::Text(fill(SIMILAR_JOBS_TEMPLATE, "{resume_text}"))]
        }
        PromptTask::ImageCaption => {
            let prompt = input.prompt.as_deref().unwrap_or(DEFAULT_CAPTION_PROMPT);
            let mut parts = vec![PromptPart::text(prompt)];
            parts.extend(input.images.first().cloned().map(PromptPart::image));
            parts
        }
        PromptTask::MultimodalCareerAdvice => {
            let mut parts = vec![PromptPart::Text(fill(
                MULTIMODAL_CAREER_ADVICE_TEMPLATE,
                "{resume_text}",
            ))];
            parts.extend(input.images.iter().cloned().map(PromptPart::image));
            parts
        }
        PromptTask::InterpretableAndFairAdvice => vec![PromptPart::Text(fill(
            INTERPRETABLE_AND_FAIR_TEMPLATE,
            "{resume_text}",
        ))],
        PromptTask::SdlcPlan => vec![PromptPart::Text(fill(SDLC_PLAN_TEMPLATE, "{project_idea}"))],
        PromptTask::ImageGeneration => vec![PromptPart::text(input.text.as_str())],
    }
}

pub struct CareerAssistant {
    model: Arc<dyn GenerativeModel>,
    images: ImageGenerator,
    cache: ResponseCache<GenerationResult>,
}

impl CareerAssistant {
    pub fn new(model: Arc<dyn GenerativeModel>, images: ImageGenerator, cache_capacity: usize) -> Self {
        Self {
            model,
            images,
            cache: ResponseCache::new(cache_capacity),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Sends `parts` to the model, serving repeats from the cache. An empty
    /// model response is `Absent`, not an error. Only text results are cached.
    async fn invoke(
        &self,
        task: PromptTask,
        parts: Vec<PromptPart>,
    ) -> Result<GenerationResult, LlmError> {
        let key = cache_key(self.model.model_name(), task.name(), &parts);
        if let Some(hit) = self.cache.get(&key) {
            debug!("{} served from cache", task.name());
            return Ok(hit);
        }

        let result = match self.model.generate_content(&parts).await {
            Ok(text) => GenerationResult::Text(text),
            Err(LlmError::EmptyContent) => {
                debug!("{} returned no content", task.name());
                return Ok(GenerationResult::Absent);
            }
            Err(e) => return Err(e),
        };

        debug!(
            "{} produced {} chars",
            task.name(),
            result.as_text().map_or(0, str::len)
        );
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Runs any task by selector.
    pub async fn run(
        &self,
        task: PromptTask,
        input: &TaskInput,
    ) -> Result<GenerationResult, LlmError> {
        if task == PromptTask::ImageGeneration {
            return Ok(self.generate_image(&input.text).await);
        }
        self.invoke(task, build_prompt(task, input)).await
    }

    async fn run_text(&self, task: PromptTask, text: &str) -> Result<GenerationResult, LlmError> {
        let input = TaskInput {
            text: text.to_string(),
            ..TaskInput::default()
        };
        self.run(task, &input).await
    }

    pub async fn career_advice_detailed(
        &self,
        resume_text: &str,
    ) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::CareerAdviceDetailed, resume_text).await
    }

    pub async fn career_advice_short(
        &self,
        resume_text: &str,
    ) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::CareerAdviceShort, resume_text).await
    }

    pub async fn mock_interview(&self, topic: &str) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::MockInterview, topic).await
    }

    pub async fn trends_and_courses(
        &self,
        interest_area: &str,
    ) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::Trends, interest_area).await
    }

    pub async fn similar_jobs(&self, resume_text: &str) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::SimilarJobs, resume_text).await
    }

    pub async fn image_caption(
        &self,
        image: Vec<u8>,
        prompt: Option<&str>,
    ) -> Result<GenerationResult, LlmError> {
        let input = TaskInput {
            images: vec![image],
            prompt: prompt.map(str::to_string),
            ..TaskInput::default()
        };
        self.run(PromptTask::ImageCaption, &input).await
    }

    pub async fn multimodal_career_advice(
        &self,
        resume_text: &str,
        resume_images: &[Vec<u8>],
    ) -> Result<GenerationResult, LlmError> {
        let input = TaskInput {
            text: resume_text.to_string(),
            images: resume_images.to_vec(),
            prompt: None,
        };
        self.run(PromptTask::MultimodalCareerAdvice, &input).await
    }

    pub async fn interpretable_and_fair_advice(
        &self,
        resume_text: &str,
    ) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::InterpretableAndFairAdvice, resume_text)
            .await
    }

    pub async fn plan_sdlc_project(&self, project_idea: &str) -> Result<GenerationResult, LlmError> {
        self.run_text(PromptTask::SdlcPlan, project_idea).await
    }

    /// Data URL on success, `Absent` when no image could be produced.
    pub async fn generate_image(&self, prompt: &str) -> GenerationResult {
        match self.images.generate_image(prompt).await {
            Some(data_url) => GenerationResult::Image(data_url),
            None => GenerationResult::Absent,
        }
    }
}
