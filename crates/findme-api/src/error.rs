//! Mapping domain errors onto HTTP responses

use axum::http::StatusCode;
use findme_core::FindmeError;
use tracing::error;

/// Rejection type shared by all handlers
pub type ApiError = (StatusCode, String);

/// Translate a domain error into a status code and message
pub fn error_response(err: FindmeError) -> ApiError {
    let status = match &err {
        FindmeError::SubmissionNotFound(_)
        | FindmeError::UserNotFound(_)
        | FindmeError::CommentNotFound(_) => StatusCode::NOT_FOUND,
        FindmeError::NoSourceImage(_) | FindmeError::Validation(_) => StatusCode::BAD_REQUEST,
        FindmeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        FindmeError::Forbidden(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }
    (status, err.to_string())
}
