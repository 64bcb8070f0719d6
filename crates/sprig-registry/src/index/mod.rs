//! Index contracts and the in-memory index

use camino::Utf8Path;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::debug;

use sprig_core::error::SprigError;
use sprig_core::types::{PackageMetadata, PackageName, Version};

use crate::api::{IndexFile, VersionMetadata};
use crate::RegistryResult;

/// Read-only queries the resolver makes against an index.
///
/// Implementations must be deterministic: the same index answers the same
/// query identically every time.
pub trait PackageIndex {
    /// Versions with metadata available, ascending
    fn versions(&self, name: &PackageName) -> Vec<Version>;

    /// Metadata of one version, if known
    fn metadata(&self, name: &PackageName, version: &Version) -> Option<&PackageMetadata>;
}

/// Asynchronous source of index data (remote index, local file)
pub trait MetadataSource: Send + Sync + 'static {
    /// All published versions of `name`
    fn list_versions(
        &self,
        name: &PackageName,
    ) -> impl Future<Output = RegistryResult<Vec<Version>>> + Send;

    /// Metadata of one published version
    fn fetch_metadata(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> impl Future<Output = RegistryResult<PackageMetadata>> + Send;
}

/// Index held fully in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryIndex {
    packages: BTreeMap<PackageName, BTreeMap<Version, PackageMetadata>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one version's metadata
    pub fn insert(&mut self, metadata: PackageMetadata) {
        self.packages
            .entry(metadata.name.clone())
            .or_default()
            .insert(metadata.version.clone(), metadata);
    }

    /// Record a package that exists but has no usable versions
    pub fn mark_known(&mut self, name: PackageName) {
        self.packages.entry(name).or_default();
    }

    pub fn contains(&self, name: &PackageName) -> bool {
        self.packages.contains_key(name)
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Number of versions across all packages
    pub fn version_count(&self) -> usize {
        self.packages.values().map(BTreeMap::len).sum()
    }

    /// Parse a JSON index document
    pub fn from_json(content: &str) -> RegistryResult<Self> {
        let file: IndexFile = serde_json::from_str(content)
            .map_err(|e| SprigError::fetch("invalid index file".to_string(), e))?;

        let mut index = Self::new();
        for (raw_name, versions) in file.packages {
            let name = PackageName::new(&raw_name).map_err(|e| {
                SprigError::fetch_message(format!("invalid package name in index: {}", e))
            })?;
            index.mark_known(name.clone());
            for (raw_version, wire) in versions {
                let version = Version::parse(&raw_version).map_err(|e| {
                    SprigError::fetch_message(format!(
                        "invalid version '{}' of {} in index: {}",
                        raw_version, name, e
                    ))
                })?;
                index.insert(wire.into_metadata(name.clone(), version)?);
            }
        }

        debug!(
            packages = index.len(),
            versions = index.version_count(),
            "loaded index"
        );
        Ok(index)
    }

    /// Render as a JSON index document
    pub fn to_json(&self) -> RegistryResult<String> {
        let file = IndexFile {
            packages: self
                .packages
                .iter()
                .map(|(name, versions)| {
                    let versions = versions
                        .iter()
                        .map(|(version, metadata)| {
                            (version.to_string(), VersionMetadata::from(metadata))
                        })
                        .collect();
                    (name.to_string(), versions)
                })
                .collect(),
        };
        serde_json::to_string_pretty(&file)
            .map_err(|e| SprigError::fetch("failed to serialize index".to_string(), e))
    }

    /// Load a JSON index file from disk
    pub async fn load(path: &Utf8Path) -> RegistryResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SprigError::io(format!("Failed to read index {}", path), e))?;
        Self::from_json(&content)
    }
}

impl PackageIndex for MemoryIndex {
    fn versions(&self, name: &PackageName) -> Vec<Version> {
        self.packages
            .get(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn metadata(&self, name: &PackageName, version: &Version) -> Option<&PackageMetadata> {
        self.packages.get(name)?.get(version)
    }
}

impl MetadataSource for MemoryIndex {
    async fn list_versions(&self, name: &PackageName) -> RegistryResult<Vec<Version>> {
        if !self.contains(name) {
            return Err(SprigError::PackageNotFound {
                name: name.to_string(),
            });
        }
        Ok(PackageIndex::versions(self, name))
    }

    async fn fetch_metadata(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> RegistryResult<PackageMetadata> {
        PackageIndex::metadata(self, name, version)
            .cloned()
            .ok_or_else(|| SprigError::PackageNotFound {
                name: format!("{}=={}", name, version),
            })
    }
}
