//! findme-api: REST API server for FindME
//!
//! This crate provides the HTTP surface of the platform:
//! - Public submission browsing and age-progressed photos
//! - Authenticated submission management
//! - Moderated comments on submissions
//! - Admin moderation, account management and dashboard summary
//! - The `/files` static mount

pub mod admin;
pub mod auth;
pub mod comments;
pub mod error;
pub mod rest;
pub mod state;
pub mod uploads;

#[cfg(test)]
mod test_support;

pub use auth::{AuthUser, Authenticator, TokenAuthenticator};
pub use error::{error_response, ApiError};
pub use rest::{cors_layer, create_router};
pub use state::AppState;
