/// Reviews: submission, moderation and rating aggregation
///
/// A review is created `pending` and becomes visible on the book page only
/// after a moderator approves it. Aggregates are computed from approved
/// reviews on every read.

pub mod lifecycle;
pub mod rating;

pub use lifecycle::ReviewManager;
pub use rating::{RatingAggregator, RatingSummary};

use crate::{
    error::{CatalogError, CatalogResult},
    sanitize::render_safe,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Review moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> CatalogResult<Self> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            _ => Err(CatalogError::Internal(format!("Unknown review status: {}", s))),
        }
    }
}

/// Stored review, joined with its author and book title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub rating: i64,
    /// Raw text as entered
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub status: ReviewStatus,
    pub username: String,
    pub book_title: String,
}

impl Review {
    pub fn view(self) -> ReviewView {
        let text_html = render_safe(&self.text);
        ReviewView {
            review: self,
            text_html,
        }
    }
}

/// Review as presented to clients, with sanitized HTML
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub text_html: String,
}

/// Review submission
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReview {
    #[validate(range(min = 0, max = 5))]
    pub rating: i64,
    #[validate(length(min = 1))]
    pub text: String,
}

/// Moderator decision on a pending review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn target_status(&self) -> ReviewStatus {
        match self {
            ModerationAction::Approve => ReviewStatus::Approved,
            ModerationAction::Reject => ReviewStatus::Rejected,
        }
    }
}

/// Whether a moderation call changed the review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationOutcome {
    Applied,
    /// The review already carried the requested status
    Unchanged,
}

/// Moderation result with the review as it now stands
#[derive(Debug, Clone, Serialize)]
pub struct ModerationReport {
    pub outcome: ModerationOutcome,
    pub review: Review,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_targets() {
        assert_eq!(ModerationAction::Approve.target_status(), ReviewStatus::Approved);
        assert_eq!(ModerationAction::Reject.target_status(), ReviewStatus::Rejected);
    }

    #[test]
    fn test_status_names_roundtrip() {
        for status in [ReviewStatus::Pending, ReviewStatus::Approved, ReviewStatus::Rejected] {
            assert_eq!(ReviewStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(ReviewStatus::from_str("deleted").is_err());
    }

    #[test]
    fn test_view_sanitizes_text() {
        let review = Review {
            id: 1,
            book_id: 1,
            user_id: 1,
            rating: 3,
            text: "ok<img src=x onerror=alert(1)>".to_string(),
            created_at: Utc::now(),
            status: ReviewStatus::Approved,
            username: "reader".to_string(),
            book_title: "Dune".to_string(),
        };

        let view = review.view();
        assert!(!view.text_html.contains("onerror"));
        assert_eq!(view.review.text, "ok<img src=x onerror=alert(1)>");
    }
}
