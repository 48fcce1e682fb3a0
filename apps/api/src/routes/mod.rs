pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::advice::handlers as advice;
use crate::feedback::handle_feedback;
use crate::resume::handlers as resume;
use crate::session::handle_session_stats;
use crate::state::AppState;
use crate::upload::MAX_UPLOAD_BYTES;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Résumé uploads
        .route("/api/v1/resume/extract", post(resume::handle_extract))
        .route("/api/v1/resume/advice", post(resume::handle_advice))
        .route(
            "/api/v1/resume/similar-jobs",
            post(resume::handle_similar_jobs),
        )
        // Free-text tasks
        .route("/api/v1/interview", post(advice::handle_mock_interview))
        .route("/api/v1/trends", post(advice::handle_trends))
        .route("/api/v1/projects/plan", post(advice::handle_project_plan))
        // Images
        .route("/api/v1/images/caption", post(advice::handle_image_caption))
        .route(
            "/api/v1/images/generate",
            post(advice::handle_generate_image),
        )
        .route("/api/v1/feedback", post(handle_feedback))
        .route("/api/v1/session/stats", get(handle_session_stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
