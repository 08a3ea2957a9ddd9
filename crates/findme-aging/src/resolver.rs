//! Cache-or-generate resolution of age-progressed images

use crate::enhance::{enhance, EnhanceOptions};
use crate::key::{age_group, CacheKey};
use crate::provider::{AgingProvider, AgingRequest, HttpProvider, ProviderResult};
use crate::source::SourceLoader;
use findme_core::{FindmeConfig, FindmeError, FindmeResult};
use findme_store::ArtifactStore;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Subdirectory of the file mount holding age-progression artifacts
pub const ARTIFACT_SUBDIR: &str = "age_progression";

/// Input for one resolution
#[derive(Debug, Clone)]
pub struct AgeProgressionRequest {
    pub submission_id: i64,
    /// Primary photo of the submission, if it has any
    pub reference_image: Option<String>,
    /// Elapsed years to simulate
    pub years: u32,
    /// Projected age of the subject, when the date of birth is known
    pub target_age: Option<u32>,
}

impl AgeProgressionRequest {
    pub fn new(submission_id: i64, reference_image: Option<String>, years: u32) -> Self {
        Self {
            submission_id,
            reference_image,
            years,
            target_age: None,
        }
    }

    pub fn with_target_age(mut self, target_age: Option<u32>) -> Self {
        self.target_age = target_age;
        self
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.submission_id, self.years, self.target_age)
    }
}

/// Where a returned artifact came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "provider")]
pub enum ArtifactOrigin {
    /// Already on disk
    Cached,
    /// Generated by the named provider
    Provider(String),
    /// Every provider failed; the enhanced original was stored
    Fallback,
}

/// Result of a resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub url: String,
    pub path: PathBuf,
    pub origin: ArtifactOrigin,
}

/// Tunables for the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Upper bound on a single provider attempt
    pub provider_timeout: Duration,
    pub enhance: EnhanceOptions,
    /// Prefix for returned URLs; relative URLs when unset
    pub public_base_url: Option<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(60),
            enhance: EnhanceOptions::default(),
            public_base_url: None,
        }
    }
}

type KeyLocks = HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>;

/// Claim on a key's generation lock, dropped from the map with its last holder
struct KeySlot<'a> {
    locks: &'a Mutex<KeyLocks>,
    key: CacheKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeySlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this slot remain: nobody else is waiting on the key
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Age-progression resolver.
///
/// Serves artifacts from the cache directory when present; otherwise tries
/// providers in priority order and stores the first usable output. When all
/// providers fail, an enhanced copy of the reference photo is stored instead,
/// so later requests for the same key are served from cache. At most one
/// generation per key runs at a time.
pub struct AgeProgressionResolver {
    providers: Vec<Arc<dyn AgingProvider>>,
    artifacts: ArtifactStore,
    source: SourceLoader,
    settings: ResolverSettings,
    in_flight: Mutex<KeyLocks>,
}

impl AgeProgressionResolver {
    /// Create a resolver over explicit providers
    pub fn new(
        providers: Vec<Arc<dyn AgingProvider>>,
        artifacts: ArtifactStore,
        source: SourceLoader,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            providers,
            artifacts,
            source,
            settings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Build a resolver with HTTP providers from configuration
    pub fn from_config(config: &FindmeConfig) -> FindmeResult<Self> {
        let aging = &config.aging;
        let provider_timeout = Duration::from_secs(aging.provider_timeout_secs);

        let providers = aging
            .providers
            .iter()
            .cloned()
            .map(|endpoint| {
                HttpProvider::new(endpoint, provider_timeout)
                    .map(|p| Arc::new(p) as Arc<dyn AgingProvider>)
            })
            .collect::<FindmeResult<Vec<_>>>()?;

        info!(
            providers = ?aging.providers.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            timeout_secs = aging.provider_timeout_secs,
            "Age-progression providers configured"
        );

        let source = SourceLoader::new(
            config.storage.files_dir.clone(),
            config.api.public_base_url.clone(),
            Duration::from_secs(aging.source_timeout_secs),
        )?;

        Ok(Self::new(
            providers,
            ArtifactStore::new(config.storage.files_dir.clone(), ARTIFACT_SUBDIR),
            source,
            ResolverSettings {
                provider_timeout,
                enhance: EnhanceOptions {
                    min_side: aging.min_side,
                    jpeg_quality: aging.jpeg_quality,
                    ..EnhanceOptions::default()
                },
                public_base_url: config.api.public_base_url.clone(),
            },
        ))
    }

    /// Create the artifact directory
    pub async fn init(&self) -> FindmeResult<()> {
        self.artifacts.init().await
    }

    /// Names of the configured providers in priority order
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Resolve a request to the URL of an age-progressed image.
    ///
    /// Fails with `NoSourceImage` when the submission has no readable photo
    /// and with `CacheWrite` when the artifact cannot be stored. Provider
    /// failures never surface.
    pub async fn resolve(&self, request: &AgeProgressionRequest) -> FindmeResult<Resolution> {
        let reference = request
            .reference_image
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or(FindmeError::NoSourceImage(request.submission_id))?;

        let key = request.cache_key();
        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }

        let slot = self.claim(&key);
        let _guard = slot.lock.lock().await;
        // Another request may have produced the artifact while we waited
        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }
        self.generate(&key, reference, request.target_age).await
    }

    async fn cached(&self, key: &CacheKey) -> Option<Resolution> {
        let file_name = key.file_name();
        if !self.artifacts.exists(&file_name).await {
            return None;
        }
        debug!(
            submission_id = key.submission_id,
            years = key.years,
            file = %file_name,
            "Age-progression cache hit"
        );
        Some(self.resolution(&file_name, ArtifactOrigin::Cached))
    }

    async fn generate(
        &self,
        key: &CacheKey,
        reference: &str,
        target_age: Option<u32>,
    ) -> FindmeResult<Resolution> {
        let source = self.source.load(reference).await.map_err(|e| {
            warn!(
                submission_id = key.submission_id,
                reference = reference,
                error = %e,
                "Failed to load reference image"
            );
            FindmeError::NoSourceImage(key.submission_id)
        })?;

        let request = AgingRequest {
            image: &source,
            years: key.years,
            age_group: age_group(key.years, target_age),
        };
        let file_name = key.file_name();

        let mut last_failure = None;
        for provider in &self.providers {
            info!(
                submission_id = key.submission_id,
                provider = provider.name(),
                age_group = request.age_group,
                "Trying age-progression provider"
            );

            let failure = match self.attempt(provider.as_ref(), request).await {
                ProviderResult::Success(bytes) => match enhance(&bytes, &self.settings.enhance) {
                    Ok(enhanced) => {
                        self.artifacts.write(&file_name, &enhanced).await?;
                        info!(
                            submission_id = key.submission_id,
                            provider = provider.name(),
                            file = %file_name,
                            "Age progression succeeded"
                        );
                        return Ok(self.resolution(
                            &file_name,
                            ArtifactOrigin::Provider(provider.name().to_string()),
                        ));
                    }
                    Err(e) => format!("malformed image output: {}", e),
                },
                ProviderResult::Failure(reason) => reason,
            };

            warn!(
                submission_id = key.submission_id,
                provider = provider.name(),
                reason = %failure,
                "Age-progression provider failed"
            );
            last_failure = Some(failure);
        }

        // Undecodable sources are stored as-is
        let fallback = enhance(&source, &self.settings.enhance).unwrap_or_else(|_| source.clone());
        self.artifacts.write(&file_name, &fallback).await?;
        error!(
            submission_id = key.submission_id,
            providers = self.providers.len(),
            last_error = last_failure.as_deref().unwrap_or("no providers configured"),
            file = %file_name,
            "All age-progression providers failed, cached enhanced original"
        );

        Ok(self.resolution(&file_name, ArtifactOrigin::Fallback))
    }

    async fn attempt(
        &self,
        provider: &dyn AgingProvider,
        request: AgingRequest<'_>,
    ) -> ProviderResult {
        let timeout = self.settings.provider_timeout;
        match tokio::time::timeout(timeout, provider.age(request)).await {
            Ok(result) => result,
            Err(_) => ProviderResult::Failure(format!("timed out after {:?}", timeout)),
        }
    }

    fn resolution(&self, file_name: &str, origin: ArtifactOrigin) -> Resolution {
        Resolution {
            url: self
                .artifacts
                .url(file_name, self.settings.public_base_url.as_deref()),
            path: self.artifacts.path(file_name),
            origin,
        }
    }

    fn claim(&self, key: &CacheKey) -> KeySlot<'_> {
        let mut locks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(key.clone()).or_default().clone();
        KeySlot {
            locks: &self.in_flight,
            key: key.clone(),
            lock,
        }
    }

    #[cfg(test)]
    fn in_flight_keys(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png() -> Vec<u8> {
        let img = RgbImage::from_fn(12, 10, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 90]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    struct SlowProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AgingProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn age(&self, _request: AgingRequest<'_>) -> ProviderResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            ProviderResult::Success(png())
        }
    }

    fn resolver(dir: &std::path::Path, providers: Vec<Arc<dyn AgingProvider>>) -> AgeProgressionResolver {
        std::fs::create_dir_all(dir.join("submissions")).unwrap();
        std::fs::write(dir.join("submissions/ref.png"), png()).unwrap();
        AgeProgressionResolver::new(
            providers,
            ArtifactStore::new(dir.to_path_buf(), ARTIFACT_SUBDIR),
            SourceLoader::new(dir.to_path_buf(), None, Duration::from_secs(5)).unwrap(),
            ResolverSettings {
                enhance: EnhanceOptions {
                    min_side: 16,
                    ..EnhanceOptions::default()
                },
                ..ResolverSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_concurrent_misses_generate_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SlowProvider {
            calls: AtomicUsize::new(0),
        });
        let resolver = Arc::new(resolver(
            dir.path(),
            vec![provider.clone() as Arc<dyn AgingProvider>],
        ));
        let request =
            AgeProgressionRequest::new(5, Some("/files/submissions/ref.png".to_string()), 4);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = resolver.clone();
                let request = request.clone();
                tokio::spawn(async move { resolver.resolve(&request).await.unwrap() })
            })
            .collect();

        let mut origins = Vec::new();
        for handle in handles {
            let resolution = handle.await.unwrap();
            assert_eq!(resolution.url, "/files/age_progression/ap_5_4.jpg");
            origins.push(resolution.origin);
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            origins
                .iter()
                .filter(|o| **o == ArtifactOrigin::Provider("slow".to_string()))
                .count(),
            1
        );
        assert_eq!(resolver.in_flight_keys(), 0);
    }

    #[tokio::test]
    async fn test_blank_reference_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), vec![]);
        let err = resolver
            .resolve(&AgeProgressionRequest::new(3, Some("  ".to_string()), 2))
            .await
            .unwrap_err();
        assert!(matches!(err, FindmeError::NoSourceImage(3)));
    }
}
