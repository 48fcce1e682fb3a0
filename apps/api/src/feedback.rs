use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub name: Option<String>,
    pub rating: Option<u8>,
    pub feedback: String,
}

/// Acknowledgement of a feedback submission. Logged, never stored.
#[derive(Debug, Serialize)]
pub struct FeedbackReceipt {
    pub id: Uuid,
    pub name: String,
    pub rating: Option<u8>,
    pub feedback: String,
    pub received_at: DateTime<Utc>,
}

impl FeedbackReceipt {
    pub fn from_request(req: FeedbackRequest) -> Result<Self, AppError> {
        let feedback = req.feedback.trim();
        if feedback.is_empty() {
            return Err(AppError::Validation(
                "Please enter some feedback before submitting.".to_string(),
            ));
        }
        if let Some(rating) = req.rating {
            if !(1..=5).contains(&rating) {
                return Err(AppError::Validation(
                    "Rating must be between 1 and 5".to_string(),
                ));
            }
        }

        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(ANONYMOUS_NAME)
            .to_string();

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            rating: req.rating,
            feedback: feedback.to_string(),
            received_at: Utc::now(),
        })
    }
}

/// POST /api/v1/feedback
pub async fn handle_feedback(
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackReceipt>, AppError> {
    let receipt = FeedbackReceipt::from_request(req)?;
    info!(
        feedback_id = %receipt.id,
        name = %receipt.name,
        rating = ?receipt.rating,
        "Feedback received: {}",
        receipt.feedback
    );
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, rating: Option<u8>, feedback: &str) -> FeedbackRequest {
        FeedbackRequest {
            name: name.map(str::to_string),
            rating,
            feedback: feedback.to_string(),
        }
    }

    #[test]
    fn test_missing_name_is_anonymous() {
        let receipt = FeedbackReceipt::from_request(request(Some("  "), Some(5), "Great tips")).unwrap();
        assert_eq!(receipt.name, ANONYMOUS_NAME);
        assert_eq!(receipt.rating, Some(5));
        assert_eq!(receipt.feedback, "Great tips");
    }

    #[test]
    fn test_empty_feedback_is_rejected() {
        assert!(FeedbackReceipt::from_request(request(Some("Ana"), None, " \n")).is_err());
    }

    #[test]
    fn test_rating_out_of_range_is_rejected() {
        assert!(FeedbackReceipt::from_request(request(None, Some(0), "ok")).is_err());
        assert!(FeedbackReceipt::from_request(request(None, Some(6), "ok")).is_err());
    }
}
