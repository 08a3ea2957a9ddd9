//! Public comments on submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment left on a submission, visible once approved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub submission_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub status: CommentStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Display name of the author, filled in when served
    #[serde(default)]
    pub author_name: Option<String>,
}

/// Payload for a new comment
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub submission_id: i64,
    pub body: String,
    pub image_url: Option<String>,
}

impl NewComment {
    pub fn validate(&self) -> crate::FindmeResult<()> {
        if self.body.trim().is_empty() {
            return Err(crate::FindmeError::Validation(
                "comment body must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
