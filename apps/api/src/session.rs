//! Per-session counters held in memory for the life of the process.

use axum::{extract::State, http::HeaderMap, Json};
use dashmap::DashMap;
use serde::Serialize;

use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";
pub const ANONYMOUS_SESSION: &str = "anonymous";

/// Résumés analyzed per session id.
#[derive(Debug, Default)]
pub struct SessionStats {
    resumes_analyzed: DashMap<String, u64>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments and returns the session's new count.
    pub fn record_resume_analyzed(&self, session_id: &str) -> u64 {
        let mut count = self
            .resumes_analyzed
            .entry(session_id.to_string())
            .or_insert(0);
        *count += 1;
        *count
    }

    pub fn resumes_analyzed(&self, session_id: &str) -> u64 {
        self.resumes_analyzed
            .get(session_id)
            .map(|count| *count)
            .unwrap_or(0)
    }
}

/// Reads `x-session-id`, falling back to a shared anonymous session.
pub fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}

#[derive(Debug, Serialize)]
pub struct SessionStatsResponse {
    pub session_id: String,
    pub resumes_analyzed: u64,
}

/// GET /api/v1/session/stats
pub async fn handle_session_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<SessionStatsResponse> {
    let session_id = session_id(&headers);
    let resumes_analyzed = state.sessions.resumes_analyzed(&session_id);
    Json(SessionStatsResponse {
        session_id,
        resumes_analyzed,
    })
}
