//! HTTP client for remote package indexes

use reqwest::{Client, ClientBuilder, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use sprig_core::error::SprigError;
use sprig_core::types::{PackageMetadata, PackageName, Version};

use crate::api::{VersionListResponse, VersionMetadata};
use crate::cache::MetadataCache;
use crate::index::MetadataSource;
use crate::RegistryResult;

/// Authentication configuration for index access
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Bearer token for authentication
    pub token: Option<String>,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
}

impl AuthConfig {
    /// Read `SPRIG_INDEX_TOKEN`, or `SPRIG_INDEX_USERNAME`/`SPRIG_INDEX_PASSWORD`
    pub fn from_env() -> Option<Self> {
        let auth = Self {
            token: std::env::var("SPRIG_INDEX_TOKEN").ok(),
            username: std::env::var("SPRIG_INDEX_USERNAME").ok(),
            password: std::env::var("SPRIG_INDEX_PASSWORD").ok(),
        };
        (auth.token.is_some() || auth.username.is_some()).then_some(auth)
    }

    fn header_value(&self) -> Option<String> {
        if let Some(token) = &self.token {
            return Some(format!("Bearer {}", token));
        }
        match (&self.username, &self.password) {
            (Some(username), password) => {
                use base64::{engine::general_purpose, Engine as _};
                let credentials = format!("{}:{}", username, password.as_deref().unwrap_or(""));
                Some(format!("Basic {}", general_purpose::STANDARD.encode(credentials)))
            },
            _ => None,
        }
    }
}

/// Client for the JSON index protocol.
///
/// Each call makes a single attempt; retrying is left to the caller
/// (see [`crate::retry_with_backoff`]) so it can be bounded per task.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Index root, e.g. `https://index.sprig.dev/json`
    base_url: Url,
    /// Version lists already fetched
    cache: Arc<MetadataCache>,
}

impl RegistryClient {
    /// Create a client for the index at `base_url`
    pub fn new(base_url: &str) -> RegistryResult<Self> {
        Self::with_auth(base_url, None)
    }

    /// Create a client sending credentials with every request
    pub fn with_auth(base_url: &str, auth: Option<AuthConfig>) -> RegistryResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| SprigError::ConfigValidation {
            field: "index".to_string(),
            reason: format!("invalid index URL '{}': {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SprigError::ConfigValidation {
                field: "index".to_string(),
                reason: format!("index URL '{}' cannot have paths", base_url),
            });
        }

        let mut builder = ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            // Request timeout
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .user_agent(concat!("sprig/", env!("CARGO_PKG_VERSION")));

        if let Some(value) = auth.as_ref().and_then(AuthConfig::header_value) {
            let mut headers = reqwest::header::HeaderMap::new();
            let mut header = reqwest::header::HeaderValue::from_str(&value).map_err(|e| {
                SprigError::ConfigValidation {
                    field: "index credentials".to_string(),
                    reason: e.to_string(),
                }
            })?;
            header.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, header);
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| SprigError::fetch("Failed to create HTTP client".to_string(), e))?;

        Ok(Self {
            client,
            base_url,
            cache: Arc::new(MetadataCache::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// `{base}/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, what: &str) -> RegistryResult<T> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SprigError::fetch(format!("request for {} failed", what), e))?;

        match response.status() {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| SprigError::fetch(format!("invalid response for {}", what), e)),
            StatusCode::NOT_FOUND => Err(SprigError::PackageNotFound {
                name: what.to_string(),
            }),
            status => Err(SprigError::fetch_message(format!(
                "index returned status {} for {}",
                status, what
            ))),
        }
    }

    /// Fetch published versions of `name` (cached), ascending
    pub async fn fetch_versions(&self, name: &PackageName) -> RegistryResult<Vec<Version>> {
        if let Some(versions) = self.cache.get(name) {
            return Ok(versions);
        }

        let url = self.endpoint(&[name.as_str()]);
        let response: VersionListResponse = self.get_json(url, name.as_str()).await?;

        // Spellings that normalize alike ("3.6", "3.6.0") keep the first listed
        let mut versions = BTreeMap::new();
        for raw in response.versions {
            match Version::parse(&raw) {
                Ok(version) => {
                    versions.entry(version).or_insert(raw);
                },
                Err(e) => warn!(package = %name, version = %raw, error = %e, "skipping unparsable version"),
            }
        }

        let listed = versions.keys().cloned().collect();
        self.cache.insert(name.clone(), versions);
        Ok(listed)
    }

    /// Fetch metadata of one version.
    ///
    /// The document is requested under the spelling the version list used;
    /// a version that was never listed falls back to its canonical form.
    pub async fn fetch_version_metadata(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> RegistryResult<PackageMetadata> {
        let spelling = self
            .cache
            .spelling(name, version)
            .unwrap_or_else(|| version.to_string());
        let url = self.endpoint(&[name.as_str(), &spelling]);
        let what = format!("{}=={}", name, spelling);
        let wire: VersionMetadata = self.get_json(url, &what).await?;
        wire.into_metadata(name.clone(), version.clone())
    }
}

impl MetadataSource for RegistryClient {
    async fn list_versions(&self, name: &PackageName) -> RegistryResult<Vec<Version>> {
        self.fetch_versions(name).await
    }

    async fn fetch_metadata(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> RegistryResult<PackageMetadata> {
        self.fetch_version_metadata(name, version).await
    }
}
