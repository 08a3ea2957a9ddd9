//! findme-store: Storage for FindME
//!
//! This crate provides storage functionality:
//! - Submission repository (in-memory, optionally seeded from JSON)
//! - Account and comment repositories
//! - Files under the static mount, written atomically
//! - TTL cache for expensive read endpoints

pub mod artifacts;
pub mod comments;
pub mod submissions;
pub mod ttl;
pub mod users;

pub use artifacts::{is_mount_path, resolve_mount_path, ArtifactStore, FILES_MOUNT};
pub use comments::{CommentStore, MemoryCommentStore};
pub use submissions::{MemorySubmissionStore, Page, SubmissionStore, MAX_PAGE_SIZE};
pub use ttl::{TtlCache, TtlCacheStats};
pub use users::{MemoryUserStore, UserStore};
