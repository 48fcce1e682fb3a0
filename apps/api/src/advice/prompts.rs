// Prompt templates for every CareerCraft task.
// Placeholders in braces are substituted with `.replace` before sending.

pub const CAREER_ADVICE_DETAILED_TEMPLATE: &str = r#"Based on this resume:
{resume_text}

1. Suggest 3 ideal career paths.
2. Identify missing or weak skills.
3. Recommend improvement areas."#;

pub const CAREER_ADVICE_SHORT_TEMPLATE: &str = r#"Based on this resume, provide a brief summary (in 2-3 sentences) of:
1. The most suitable career path.
2. The single most important skill to improve.

Resume:
{resume_text}"#;

pub const MOCK_INTERVIEW_TEMPLATE: &str = "Pretend you're an interviewer. \
Ask a technical question about '{topic}' and provide an ideal answer.";

pub const TRENDS_TEMPLATE: &str =
    "What are current industry trends and top courses for {interest_area}?";

pub const SIMILAR_JOBS_TEMPLATE: &str = r#"Given the following resume, generate 3 hypothetical job descriptions that have similar skills and requirements.
Present each one with a title, a short summary of the role and its key requirements.

Resume:
{resume_text}"#;

pub const DEFAULT_CAPTION_PROMPT: &str = "Caption this image.";

/// The résumé's embedded images follow this text as separate parts.
pub const MULTIMODAL_CAREER_ADVICE_TEMPLATE: &str = r#"Based on this resume, which includes both text and images, charts, and tables,
provide a detailed analysis. Your analysis should:

1. Suggest 3 ideal career paths based on skills and experiences mentioned in the text and visuals.
2. Identify missing or weak skills.
3. Recommend improvement areas, referencing specific data from the resume where appropriate.

Resume text:
{resume_text}

The images embedded in the resume follow."#;

pub const INTERPRETABLE_AND_FAIR_TEMPLATE: &str = r#"Based on the following resume:
{resume_text}

Please provide a detailed career analysis that includes:

1.  **Career Advice**: Suggest 3 ideal career paths, identify missing skills, and recommend improvement areas.

2.  **Reasoning**: Explain the specific reasons for your advice, referencing skills or experiences in the resume that led to each recommendation.

3.  **Fairness Check**: Analyze your own advice for potential biases. Specifically, comment on whether the advice is fair and inclusive, and if it avoids making assumptions based on gender, age, or background."#;

pub const SDLC_PLAN_TEMPLATE: &str = r#"You are an expert DevOps and Application Developer.
Based on this project idea: '{project_idea}', provide a detailed plan for the end-to-end Software Development Life Cycle (SDLC).
The plan should include:
1. A brief description of the user requirements.
2. A suggested technology stack.
3. An outline of the project's key features.
4. An initial code structure or a code snippet for a core component.
5. A simple test plan for the application."#;
