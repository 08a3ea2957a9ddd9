//! Multipart image uploads onto the static mount

use crate::error::{error_response, ApiError};
use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use findme_core::{FindmeError, FindmeResult};
use findme_store::ArtifactStore;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// A file part read from a multipart body
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Upload {
    /// Read a file part, rejecting anything that is not declared `image/*`
    pub async fn read_image(field: Field<'_>) -> Result<Self, ApiError> {
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(error_response(FindmeError::Validation(format!(
                "Only image uploads are allowed, got {:?}",
                content_type
            ))));
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// File extension taken from the client file name, else from the content type
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        if let Some(ext) = from_name {
            return format!(".{}", ext.to_ascii_lowercase());
        }
        match self.content_type.as_str() {
            "image/jpeg" => ".jpg",
            "image/png" => ".png",
            "image/gif" => ".gif",
            "image/webp" => ".webp",
            "image/svg+xml" => ".svg",
            _ => ".img",
        }
        .to_string()
    }

    /// Write under `store` as `{prefix}_{user_id}_{random}{ext}` and return its URL
    pub async fn save(
        &self,
        store: &ArtifactStore,
        prefix: &str,
        user_id: i64,
        base_url: Option<&str>,
    ) -> FindmeResult<String> {
        let file_name = format!(
            "{}_{}_{}{}",
            prefix,
            user_id,
            Uuid::new_v4().simple(),
            self.extension()
        );
        store.write(&file_name, &self.bytes).await?;
        debug!(file = %file_name, size = self.bytes.len(), "Stored upload");
        Ok(store.url(&file_name, base_url))
    }
}

/// Read a text part
pub async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

pub fn multipart_error(err: MultipartError) -> ApiError {
    (err.status(), err.body_text())
}
