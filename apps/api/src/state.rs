use std::sync::Arc;

use crate::advice::tasks::CareerAssistant;
use crate::session::SessionStats;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<CareerAssistant>,
    /// Résumés analyzed per `x-session-id`.
    pub sessions: Arc<SessionStats>,
}

impl AppState {
    pub fn new(assistant: CareerAssistant) -> Self {
        Self {
            assistant: Arc::new(assistant),
            sessions: Arc::new(SessionStats::new()),
        }
    }
}
