//! findme-core: Core types for the FindME missing-persons service
//!
//! This crate provides the fundamental types used throughout FindME:
//! - Submission records, moderation status and dashboard summaries
//! - Principals, accounts and roles for authorization
//! - Moderated comments
//! - Configuration types
//! - Error handling

pub mod comment;
pub mod config;
pub mod error;
pub mod model;
pub mod user;

pub use comment::*;
pub use config::*;
pub use error::*;
pub use model::*;
pub use user::*;
