//! Shared application state

use crate::auth::{Authenticator, TokenAuthenticator};
use findme_aging::AgeProgressionResolver;
use findme_core::{FindmeConfig, SubmissionSummary};
use findme_store::{ArtifactStore, CommentStore, SubmissionStore, TtlCache, UserStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Mount subdirectory for submission photos
pub const SUBMISSION_UPLOADS: &str = "submissions";

/// Mount subdirectory for comment images
pub const COMMENT_UPLOADS: &str = "comments";

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn SubmissionStore>,
    pub comments: Arc<dyn CommentStore>,
    pub users: Arc<dyn UserStore>,
    pub resolver: Arc<AgeProgressionResolver>,
    /// Dashboard summary, cleared on every mutation
    pub summary_cache: TtlCache<(), SubmissionSummary>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Root of the `/files` static mount
    pub files_dir: PathBuf,
    pub submission_uploads: ArtifactStore,
    pub comment_uploads: ArtifactStore,
    /// Prefix for upload URLs; relative to the mount when `None`
    pub public_base_url: Option<String>,
    /// Request body cap for multipart uploads
    pub upload_limit: usize,
}

impl AppState {
    /// Assemble state from configuration around existing stores and resolver
    pub fn from_config(
        config: &FindmeConfig,
        store: Arc<dyn SubmissionStore>,
        users: Arc<dyn UserStore>,
        comments: Arc<dyn CommentStore>,
        resolver: Arc<AgeProgressionResolver>,
    ) -> Self {
        let files_dir = config.storage.files_dir.clone();
        Self {
            store,
            comments,
            authenticator: Arc::new(TokenAuthenticator::new(&config.auth, users.clone())),
            users,
            resolver,
            summary_cache: TtlCache::new(
                Duration::from_secs(config.summary_cache.ttl_secs),
                config.summary_cache.capacity,
            ),
            submission_uploads: ArtifactStore::new(files_dir.clone(), SUBMISSION_UPLOADS),
            comment_uploads: ArtifactStore::new(files_dir.clone(), COMMENT_UPLOADS),
            files_dir,
            public_base_url: config.api.public_base_url.clone(),
            upload_limit: config.storage.max_upload_bytes,
        }
    }

    /// Drop derived data after a submission changes
    pub async fn submissions_changed(&self) {
        self.summary_cache.invalidate(&()).await;
    }
}
