//! Configuration types for FindME

use crate::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that replaces the configured provider list
pub const PROVIDERS_ENV: &str = "FINDME_AGING_PROVIDERS";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FindmeConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Age-progression configuration
    pub aging: AgingConfig,
    /// Summary cache configuration
    pub summary_cache: SummaryCacheConfig,
    /// Static bearer credentials
    pub auth: AuthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl FindmeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::FindmeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::FindmeError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::FindmeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(PROVIDERS_ENV) {
            self.aging.override_providers(&value);
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub address: String,
    /// Port for the REST API server
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Externally visible base URL; relative URLs are returned when unset
    pub public_base_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8000,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            public_base_url: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the static file mount (uploads and age-progression artifacts)
    pub files_dir: PathBuf,
    /// JSON file with submissions loaded at startup
    pub seed_file: Option<PathBuf>,
    /// Upper bound on a request body carrying photo uploads
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            files_dir: PathBuf::from("files"),
            seed_file: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// A single external age-progression endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Identifier used in logs
    pub name: String,
    /// URL receiving the reference image
    pub url: String,
}

impl ProviderEndpoint {
    /// Parse `name=url` or a bare URL (the host becomes the name)
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }

        if let Some((name, url)) = entry.split_once('=') {
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                return None;
            }
            return Some(Self {
                name: name.to_string(),
                url: url.to_string(),
            });
        }

        let host = entry
            .split("://")
            .nth(1)
            .unwrap_or(entry)
            .split(['/', '?'])
            .next()
            .unwrap_or(entry);

        Some(Self {
            name: host.to_string(),
            url: entry.to_string(),
        })
    }
}

/// Age-progression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgingConfig {
    /// Providers in priority order
    pub providers: Vec<ProviderEndpoint>,
    /// Per-provider request timeout in seconds
    pub provider_timeout_secs: u64,
    /// Timeout for downloading remote reference images
    pub source_timeout_secs: u64,
    /// Minimum length of the shortest side after enhancement
    pub min_side: u32,
    /// JPEG quality for written artifacts
    pub jpeg_quality: u8,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            provider_timeout_secs: 60,
            source_timeout_secs: 60,
            min_side: 1024,
            jpeg_quality: 92,
        }
    }
}

impl AgingConfig {
    /// Replace the provider list with a comma-separated override.
    ///
    /// A value with no usable entries leaves the configured list alone.
    pub fn override_providers(&mut self, value: &str) {
        let providers: Vec<ProviderEndpoint> =
            value.split(',').filter_map(ProviderEndpoint::parse).collect();
        if !providers.is_empty() {
            self.providers = providers;
        }
    }
}

/// Summary cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryCacheConfig {
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// Maximum number of entries
    pub capacity: usize,
}

impl Default for SummaryCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            capacity: 16,
        }
    }
}

/// An account loaded into the user store at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSeed {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_role() -> Role {
    Role::User
}

fn default_active() -> bool {
    true
}

/// A static bearer credential for an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub user_id: i64,
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users: Vec<UserSeed>,
    pub tokens: Vec<TokenGrant>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: String,
    /// Optional `EnvFilter` directive, takes precedence over `level`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            filter: None,
        }
    }
}
