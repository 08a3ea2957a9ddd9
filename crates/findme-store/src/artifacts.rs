//! Files under the static mount: uploaded photos and generated artifacts

use findme_core::{FindmeError, FindmeResult};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// URL prefix under which `files_dir` is served
pub const FILES_MOUNT: &str = "/files";

/// `FILES_MOUNT` with its trailing separator, for prefix matching
const FILES_PREFIX: &str = "/files/";

/// Whether `path` names something beneath the static mount
pub fn is_mount_path(path: &str) -> bool {
    path.starts_with(FILES_PREFIX)
}

/// A directory beneath the static file mount
pub struct ArtifactStore {
    /// Root of the static mount
    files_dir: PathBuf,
    /// Subdirectory of the mount holding this store's files
    subdir: String,
}

impl ArtifactStore {
    /// Create a store for `files_dir/subdir`
    pub fn new(files_dir: PathBuf, subdir: &str) -> Self {
        Self {
            files_dir,
            subdir: subdir.trim_matches('/').to_string(),
        }
    }

    /// Directory holding this store's files
    pub fn dir(&self) -> PathBuf {
        self.files_dir.join(&self.subdir)
    }

    /// Create the store directory if needed
    pub async fn init(&self) -> FindmeResult<()> {
        let dir = self.dir();
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                FindmeError::CacheWrite(format!("Failed to create {}: {}", dir.display(), e))
            })?;
            info!(path = %dir.display(), "Created artifact directory");
        }
        Ok(())
    }

    /// Get the local path for an artifact
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir().join(file_name)
    }

    /// Check if an artifact exists
    pub async fn exists(&self, file_name: &str) -> bool {
        tokio::fs::try_exists(self.path(file_name))
            .await
            .unwrap_or(false)
    }

    /// Public URL of an artifact; relative to the mount when `base_url` is `None`
    pub fn url(&self, file_name: &str, base_url: Option<&str>) -> String {
        let encoded = urlencoding::encode(file_name);
        let base = base_url.map(|b| b.trim_end_matches('/')).unwrap_or("");
        format!("{}{}/{}/{}", base, FILES_MOUNT, self.subdir, encoded)
    }

    /// Replace an artifact with `bytes`.
    ///
    /// The content goes to a temporary file in the same directory first and is
    /// renamed over the target, so readers never see a partial file.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> FindmeResult<PathBuf> {
        self.init().await?;

        let target = self.path(file_name);
        let tmp = self.dir().join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(FindmeError::CacheWrite(format!(
                "Failed to write {}: {}",
                tmp.display(),
                e
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(FindmeError::CacheWrite(format!(
                "Failed to move artifact into {}: {}",
                target.display(),
                e
            )));
        }

        debug!(path = %target.display(), size = bytes.len(), "Wrote artifact");
        Ok(target)
    }
}

/// Map a `/files/...` URL path onto `files_dir`.
///
/// Returns `None` for paths outside the mount or containing `..` segments.
pub fn resolve_mount_path(files_dir: &Path, url_path: &str) -> Option<PathBuf> {
    let rest = url_path.strip_prefix(FILES_PREFIX)?.trim_start_matches('/');
    if rest.is_empty() {
        return None;
    }
    let relative = Path::new(rest);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(files_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url() {
        let store = ArtifactStore::new(PathBuf::from("/srv/files"), "age_progression");
        assert_eq!(
            store.url("ap_42_10.jpg", None),
            "/files/age_progression/ap_42_10.jpg"
        );
        assert_eq!(
            store.url("ap_7_5_<20.jpg", Some("https://findme.example/")),
            "https://findme.example/files/age_progression/ap_7_5_%3C20.jpg"
        );
        assert_eq!(
            store.url("ap_7_5_60+.jpg", None),
            "/files/age_progression/ap_7_5_60%2B.jpg"
        );
        // Path encoding, not form encoding
        assert_eq!(
            store.url("my photo.jpg", None),
            "/files/age_progression/my%20photo.jpg"
        );
    }

    #[test]
    fn test_resolve_mount_path() {
        let root = Path::new("/srv/files");
        assert_eq!(
            resolve_mount_path(root, "/files/submissions/a.jpg"),
            Some(PathBuf::from("/srv/files/submissions/a.jpg"))
        );
        assert_eq!(resolve_mount_path(root, "/files/../etc/passwd"), None);
        assert_eq!(resolve_mount_path(root, "/static/a.jpg"), None);
        assert_eq!(resolve_mount_path(root, "/files/"), None);
        assert_eq!(resolve_mount_path(root, "/filesX/secret.jpg"), None);
        assert_eq!(resolve_mount_path(root, "/files"), None);
        assert!(is_mount_path("/files/a.jpg"));
        assert!(!is_mount_path("/filesystem/a.jpg"));
    }

    #[tokio::test]
    async fn test_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), "age_progression");

        assert!(!store.exists("ap_1_1.jpg").await);
        store.write("ap_1_1.jpg", b"first").await.unwrap();
        assert!(store.exists("ap_1_1.jpg").await);

        let path = store.write("ap_1_1.jpg", b"second").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");

        // Only the artifact remains, no temporary files
        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["ap_1_1.jpg".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_failure_is_cache_write_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocked = dir.path().join("files");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let store = ArtifactStore::new(blocked, "age_progression");
        let err = store.write("ap_1_1.jpg", b"data").await.unwrap_err();
        assert!(matches!(err, FindmeError::CacheWrite(_)));
    }
}
