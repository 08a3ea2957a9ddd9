//! Comment repository

use async_trait::async_trait;
use chrono::Utc;
use findme_core::{Comment, CommentStatus, FindmeError, FindmeResult, NewComment};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage seam for comments
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get(&self, id: i64) -> FindmeResult<Option<Comment>>;

    /// Persist a new comment in `pending` status
    async fn create(&self, new: NewComment, user_id: i64) -> FindmeResult<Comment>;

    /// Comments on one submission, newest first, optionally filtered by status
    async fn list_for_submission(
        &self,
        submission_id: i64,
        status: Option<CommentStatus>,
    ) -> FindmeResult<Vec<Comment>>;

    /// A user's own comments, newest first
    async fn list_by_user(&self, user_id: i64) -> FindmeResult<Vec<Comment>>;

    /// Every comment, newest first, optionally filtered by status
    async fn list_all(&self, status: Option<CommentStatus>) -> FindmeResult<Vec<Comment>>;

    /// Set the moderation status; approving clears any rejection reason
    async fn moderate(
        &self,
        id: i64,
        status: CommentStatus,
        reason: Option<String>,
    ) -> FindmeResult<Comment>;

    /// Drop every comment on a submission, returning how many were removed
    async fn delete_for_submission(&self, submission_id: i64) -> FindmeResult<usize>;
}

/// In-process comment store
#[derive(Default)]
pub struct MemoryCommentStore {
    comments: RwLock<BTreeMap<i64, Comment>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn newest_first<F>(&self, filter: F) -> Vec<Comment>
    where
        F: Fn(&Comment) -> bool,
    {
        let comments = self.comments.read().await;
        let mut items: Vec<Comment> = comments.values().filter(|c| filter(c)).cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn get(&self, id: i64) -> FindmeResult<Option<Comment>> {
        Ok(self.comments.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewComment, user_id: i64) -> FindmeResult<Comment> {
        new.validate()?;

        let mut comments = self.comments.write().await;
        let id = comments.keys().next_back().copied().unwrap_or(0) + 1;
        let comment = Comment {
            id,
            submission_id: new.submission_id,
            user_id: Some(user_id),
            body: new.body,
            image_url: new.image_url,
            status: CommentStatus::Pending,
            rejection_reason: None,
            created_at: Utc::now(),
            author_name: None,
        };
        comments.insert(id, comment.clone());

        debug!(comment_id = id, submission_id = comment.submission_id, "Created comment");
        Ok(comment)
    }

    async fn list_for_submission(
        &self,
        submission_id: i64,
        status: Option<CommentStatus>,
    ) -> FindmeResult<Vec<Comment>> {
        Ok(self
            .newest_first(|c| {
                c.submission_id == submission_id && status.map_or(true, |s| c.status == s)
            })
            .await)
    }

    async fn list_by_user(&self, user_id: i64) -> FindmeResult<Vec<Comment>> {
        Ok(self.newest_first(|c| c.user_id == Some(user_id)).await)
    }

    async fn list_all(&self, status: Option<CommentStatus>) -> FindmeResult<Vec<Comment>> {
        Ok(self
            .newest_first(|c| status.map_or(true, |s| c.status == s))
            .await)
    }

    async fn moderate(
        &self,
        id: i64,
        status: CommentStatus,
        reason: Option<String>,
    ) -> FindmeResult<Comment> {
        let mut comments = self.comments.write().await;
        let comment = comments
            .get_mut(&id)
            .ok_or(FindmeError::CommentNotFound(id))?;
        comment.status = status;
        comment.rejection_reason = match status {
            CommentStatus::Rejected => reason,
            _ => None,
        };
        debug!(comment_id = id, status = %status, "Moderated comment");
        Ok(comment.clone())
    }

    async fn delete_for_submission(&self, submission_id: i64) -> FindmeResult<usize> {
        let mut comments = self.comments.write().await;
        let before = comments.len();
        comments.retain(|_, c| c.submission_id != submission_id);
        Ok(before - comments.len())
    }
}
