//! External age-progression providers

use async_trait::async_trait;
use findme_core::{FindmeError, FindmeResult, ProviderEndpoint};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// What a provider is asked to render
#[derive(Debug, Clone, Copy)]
pub struct AgingRequest<'a> {
    /// Reference photo bytes
    pub image: &'a [u8],
    /// Elapsed years to simulate
    pub years: u32,
    /// Coarse target age range, e.g. `40-50`
    pub age_group: &'static str,
}

/// Outcome of one provider attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    /// Raw image payload
    Success(Vec<u8>),
    /// Reason the attempt produced nothing usable
    Failure(String),
}

/// An image-aging inference endpoint
#[async_trait]
pub trait AgingProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Request an aged rendition of the reference photo
    async fn age(&self, request: AgingRequest<'_>) -> ProviderResult;
}

/// JSON body returned by providers that host their output elsewhere
#[derive(Debug, Deserialize)]
struct HostedOutput {
    #[serde(alias = "image_url")]
    url: String,
}

/// Provider reached over HTTP.
///
/// The reference photo is POSTed as the request body with `age_group` and
/// `years` as query parameters. A 2xx response carries either the image
/// itself or a JSON object `{ "url": ... }` pointing at it.
pub struct HttpProvider {
    endpoint: ProviderEndpoint,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Create a provider with a per-request timeout
    pub fn new(endpoint: ProviderEndpoint, timeout: Duration) -> FindmeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FindmeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { endpoint, client })
    }

    async fn call(&self, request: AgingRequest<'_>) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .post(&self.endpoint.url)
            .query(&[
                ("age_group", request.age_group.to_string()),
                ("years", request.years.to_string()),
            ])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(request.image.to_vec())
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;

        if !is_json {
            return Ok(body.to_vec());
        }

        let hosted: HostedOutput =
            serde_json::from_slice(&body).map_err(|e| format!("malformed JSON output: {}", e))?;
        debug!(provider = %self.endpoint.name, url = %hosted.url, "Fetching hosted output");

        let response = self
            .client
            .get(&hosted.url)
            .send()
            .await
            .map_err(|e| format!("hosted output fetch failed: {}", e))?;
        if !response.status().is_success() {
            return Err(format!("hosted output status {}", response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read hosted output: {}", e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AgingProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn age(&self, request: AgingRequest<'_>) -> ProviderResult {
        match self.call(request).await {
            Ok(bytes) if bytes.is_empty() => ProviderResult::Failure("empty output".to_string()),
            Ok(bytes) => ProviderResult::Success(bytes),
            Err(reason) => ProviderResult::Failure(reason),
        }
    }
}
