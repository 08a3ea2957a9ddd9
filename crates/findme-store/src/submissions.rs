//! Submission repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use findme_core::{
    FindmeError, FindmeResult, NewSubmission, Submission, SubmissionPatch, SubmissionStatus,
    SubmissionSummary,
};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Largest page size served in one listing
pub const MAX_PAGE_SIZE: usize = 1000;

/// Normalized pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// Clamp a 1-based page number and a page size into a window
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(100).clamp(1, MAX_PAGE_SIZE);
        Self {
            limit,
            offset: (page - 1) * limit,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Storage seam for submission records
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Fetch one submission
    async fn get(&self, id: i64) -> FindmeResult<Option<Submission>>;

    /// List newest first; `public_only` restricts to published and found statuses
    async fn list(&self, page: Page, public_only: bool) -> FindmeResult<Vec<Submission>>;

    /// List a user's own submissions, newest first
    async fn list_by_user(&self, user_id: i64, page: Page) -> FindmeResult<Vec<Submission>>;

    /// Persist a new submission in `pending` status
    async fn create(
        &self,
        new: NewSubmission,
        user_id: Option<i64>,
        images: Vec<String>,
    ) -> FindmeResult<Submission>;

    /// Apply a partial update
    async fn update(&self, id: i64, patch: SubmissionPatch) -> FindmeResult<Submission>;

    /// Delete a submission, returning whether it existed
    async fn delete(&self, id: i64) -> FindmeResult<bool>;

    /// Dashboard aggregates as of `now`
    async fn summarize(&self, now: DateTime<Utc>) -> FindmeResult<SubmissionSummary>;
}

/// In-process submission store
pub struct MemorySubmissionStore {
    submissions: RwLock<BTreeMap<i64, Submission>>,
}

impl MemorySubmissionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            submissions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store holding `submissions`
    pub fn with_submissions(submissions: Vec<Submission>) -> Self {
        Self {
            submissions: RwLock::new(submissions.into_iter().map(|s| (s.id, s)).collect()),
        }
    }

    /// Load submissions from a JSON array file
    pub async fn from_seed_file(path: &Path) -> FindmeResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            FindmeError::Storage(format!("Failed to read seed file {}: {}", path.display(), e))
        })?;
        let submissions: Vec<Submission> = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            count = submissions.len(),
            "Loaded seed submissions"
        );
        Ok(Self::with_submissions(submissions))
    }

    fn newest_first<'a, I>(items: I, page: Page) -> Vec<Submission>
    where
        I: Iterator<Item = &'a Submission>,
    {
        let mut items: Vec<&Submission> = items.collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect()
    }
}

impl Default for MemorySubmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn get(&self, id: i64) -> FindmeResult<Option<Submission>> {
        Ok(self.submissions.read().await.get(&id).cloned())
    }

    async fn list(&self, page: Page, public_only: bool) -> FindmeResult<Vec<Submission>> {
        let submissions = self.submissions.read().await;
        Ok(Self::newest_first(
            submissions
                .values()
                .filter(|s| !public_only || s.status.is_public()),
            page,
        ))
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> FindmeResult<Vec<Submission>> {
        let submissions = self.submissions.read().await;
        Ok(Self::newest_first(
            submissions.values().filter(|s| s.is_owned_by(user_id)),
            page,
        ))
    }

    async fn create(
        &self,
        new: NewSubmission,
        user_id: Option<i64>,
        images: Vec<String>,
    ) -> FindmeResult<Submission> {
        new.validate(images.len())?;

        let mut submissions = self.submissions.write().await;
        let id = submissions.keys().next_back().copied().unwrap_or(0) + 1;
        let submission = Submission {
            id,
            title: new.title,
            full_name: new.full_name,
            dob: new.dob,
            gender: new.gender,
            race: new.race,
            height: new.height,
            weight: new.weight,
            province: new.province,
            description: new.description,
            status: SubmissionStatus::Pending,
            last_seen_address: new.last_seen_address,
            last_seen_place_id: new.last_seen_place_id,
            last_seen_lat: new.last_seen_lat,
            last_seen_lng: new.last_seen_lng,
            images,
            user_id,
            created_at: Utc::now(),
        };
        submissions.insert(id, submission.clone());

        debug!(submission_id = id, "Created submission");
        Ok(submission)
    }

    async fn update(&self, id: i64, patch: SubmissionPatch) -> FindmeResult<Submission> {
        patch.validate()?;

        let mut submissions = self.submissions.write().await;
        let submission = submissions
            .get_mut(&id)
            .ok_or(FindmeError::SubmissionNotFound(id))?;
        patch.apply(submission);

        debug!(submission_id = id, status = %submission.status, "Updated submission");
        Ok(submission.clone())
    }

    async fn delete(&self, id: i64) -> FindmeResult<bool> {
        let removed = self.submissions.write().await.remove(&id).is_some();
        if removed {
            debug!(submission_id = id, "Deleted submission");
        }
        Ok(removed)
    }

    async fn summarize(&self, now: DateTime<Utc>) -> FindmeResult<SubmissionSummary> {
        let submissions = self.submissions.read().await;
        Ok(SubmissionSummary::compute(submissions.values(), now))
    }
}
