//! Index wire types
//!
//! The remote index serves two documents:
//! `GET {base}/{name}` returns a [`VersionListResponse`] and
//! `GET {base}/{name}/{version}` returns a [`VersionMetadata`].
//! A local index file is an [`IndexFile`] holding every version's metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sprig_core::error::SprigError;
use sprig_core::types::{PackageMetadata, PackageName, Requirement, Version, VersionReq};

use crate::RegistryResult;

/// Versions published for a package
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionListResponse {
    /// Package name
    pub name: String,
    /// Published version strings
    #[serde(default)]
    pub versions: Vec<String>,
}

/// Metadata for a specific package version
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionMetadata {
    /// Supported Python range
    #[serde(rename = "requires-python", default, skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<String>,
    /// Requirement strings
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Whole-index JSON document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexFile {
    /// name -> version -> metadata
    pub packages: BTreeMap<String, BTreeMap<String, VersionMetadata>>,
}

impl VersionMetadata {
    /// Validate wire metadata into the core type
    pub fn into_metadata(self, name: PackageName, version: Version) -> RegistryResult<PackageMetadata> {
        let invalid = |what: String| {
            SprigError::invalid_index_data(format!(
                "invalid metadata for {}=={}: {}",
                name, version, what
            ))
        };

        let requires_python = match self.requires_python.as_deref() {
            Some(raw) => Some(
                VersionReq::parse(raw).map_err(|e| invalid(format!("requires-python: {}", e)))?,
            ),
            None => None,
        };

        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for raw in &self.dependencies {
            dependencies.push(
                Requirement::parse(raw)
                    .map_err(|e| invalid(format!("dependency '{}': {}", raw, e)))?,
            );
        }

        Ok(PackageMetadata {
            name,
            version,
            requires_python,
            dependencies,
        })
    }
}

impl From<&PackageMetadata> for VersionMetadata {
    fn from(metadata: &PackageMetadata) -> Self {
        Self {
            requires_python: metadata.requires_python.as_ref().map(ToString::to_string),
            dependencies: metadata
                .dependencies
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_metadata_conversion() {
        let wire: VersionMetadata = serde_json::from_value(serde_json::json!({
            "requires-python": ">=3.8",
            "dependencies": ["urllib3>=2.0", "idna"]
        }))
        .unwrap();

        let metadata = wire
            .into_metadata(PackageName::new("requests").unwrap(), Version::new(2, 32, 3))
            .unwrap();
        assert_eq!(metadata.dependencies.len(), 2);
        assert_eq!(metadata.requires_python.unwrap().to_string(), ">=3.8");
    }

    #[test]
    fn test_invalid_dependency_is_permanent_fetch_failure() {
        let wire = VersionMetadata {
            requires_python: None,
            dependencies: vec!["urllib3>=two".to_string()],
        };
        let err = wire
            .into_metadata(PackageName::new("requests").unwrap(), Version::new(1, 0, 0))
            .unwrap_err();
        assert!(matches!(err, SprigError::FetchFailure { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let wire: VersionMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(wire, VersionMetadata::default());
    }
}
