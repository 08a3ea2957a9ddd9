//! Loading reference photos

use findme_core::{FindmeError, FindmeResult};
use findme_store::{is_mount_path, resolve_mount_path};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Reads reference photos from the static mount or over HTTP
pub struct SourceLoader {
    files_dir: PathBuf,
    /// Base URL under which this service serves its own files
    public_base_url: Option<String>,
    client: reqwest::Client,
}

impl SourceLoader {
    /// Create a loader; remote downloads are bounded by `timeout`
    pub fn new(
        files_dir: PathBuf,
        public_base_url: Option<String>,
        timeout: Duration,
    ) -> FindmeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FindmeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            files_dir,
            public_base_url: public_base_url.map(|b| b.trim_end_matches('/').to_string()),
            client,
        })
    }

    /// Load the bytes behind an image reference.
    ///
    /// Accepts mount paths (`/files/...` or `files/...`), absolute URLs under
    /// this service's public base URL (read locally), and other `http(s)` URLs.
    pub async fn load(&self, reference: &str) -> FindmeResult<Vec<u8>> {
        let reference = reference.trim();

        if let Some(local) = self.local_path(reference) {
            debug!(path = %local, "Reading reference image from mount");
            return self.read_mount(&local).await;
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            return self.download(reference).await;
        }

        Err(FindmeError::Storage(format!(
            "Unsupported image reference: {}",
            reference
        )))
    }

    /// Mount-relative URL path for references served by this service
    fn local_path(&self, reference: &str) -> Option<String> {
        if let Some(base) = &self.public_base_url {
            if let Some(rest) = reference.strip_prefix(base.as_str()) {
                if is_mount_path(rest) {
                    return Some(rest.to_string());
                }
            }
        }
        if is_mount_path(reference) {
            return Some(reference.to_string());
        }
        let rooted = format!("/{}", reference);
        is_mount_path(&rooted).then_some(rooted)
    }

    async fn read_mount(&self, url_path: &str) -> FindmeResult<Vec<u8>> {
        let path = resolve_mount_path(&self.files_dir, url_path).ok_or_else(|| {
            FindmeError::Storage(format!("Image path outside the file mount: {}", url_path))
        })?;
        tokio::fs::read(&path).await.map_err(|e| {
            FindmeError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    async fn download(&self, url: &str) -> FindmeResult<Vec<u8>> {
        debug!(url = url, "Downloading reference image");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FindmeError::Storage(format!("Failed to download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(FindmeError::Storage(format!(
                "Failed to download {}: status {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FindmeError::Storage(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}
