//! Error types for FindME

use thiserror::Error;

/// Main error type for FindME
#[derive(Error, Debug)]
pub enum FindmeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Submission not found
    #[error("Submission not found: {0}")]
    SubmissionNotFound(i64),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// Comment not found
    #[error("Comment not found: {0}")]
    CommentNotFound(i64),

    /// The submission has no readable reference image
    #[error("No source image available for submission {0}")]
    NoSourceImage(i64),

    /// Request payload failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role or ownership
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An artifact could not be written to the cache directory
    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    /// External age-progression provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for FindME operations
pub type FindmeResult<T> = Result<T, FindmeError>;

impl From<serde_json::Error> for FindmeError {
    fn from(err: serde_json::Error) -> Self {
        FindmeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for FindmeError {
    fn from(err: toml::de::Error) -> Self {
        FindmeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FindmeError::Config("invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid config");

        let err = FindmeError::NoSourceImage(99);
        assert_eq!(err.to_string(), "No source image available for submission 99");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FindmeError = io_err.into();
        assert!(matches!(err, FindmeError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: FindmeError = json_err.into();
        assert!(matches!(err, FindmeError::Serialization(_)));
    }
}
