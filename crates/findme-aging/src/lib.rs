//! findme-aging: Age-progression rendering for FindME
//!
//! This crate turns a submission's reference photo into an aged rendition:
//! - Deterministic cache keys and artifact names
//! - External providers tried in priority order, each with a timeout
//! - Local enhancement of the original when every provider fails
//! - One in-flight generation per cache key

pub mod enhance;
pub mod key;
pub mod provider;
pub mod resolver;
pub mod source;

pub use enhance::{enhance, EnhanceOptions};
pub use key::{age_group, AgeBucket, CacheKey};
pub use provider::{AgingProvider, AgingRequest, HttpProvider, ProviderResult};
pub use resolver::{
    AgeProgressionRequest, AgeProgressionResolver, ArtifactOrigin, Resolution, ResolverSettings,
    ARTIFACT_SUBDIR,
};
pub use source::SourceLoader;
