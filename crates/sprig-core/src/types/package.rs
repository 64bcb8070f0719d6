//! Per-version package metadata as served by an index.

use serde::{Deserialize, Serialize};

use super::{PackageName, Requirement, Version, VersionReq};

/// Metadata of one released version of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: PackageName,
    pub version: Version,
    #[serde(rename = "requires-python", default, skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<VersionReq>,
    #[serde(default)]
    pub dependencies: Vec<Requirement>,
}

impl PackageMetadata {
    /// Metadata with no Python restriction and no dependencies
    pub fn new(name: PackageName, version: Version) -> Self {
        Self {
            name,
            version,
            requires_python: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_requires_python(mut self, requires_python: VersionReq) -> Self {
        self.requires_python = Some(requires_python);
        self
    }

    pub fn with_dependency(mut self, requirement: Requirement) -> Self {
        self.dependencies.push(requirement);
        self
    }

    /// Whether this version can run on some interpreter in `python`.
    ///
    /// Either side being absent means no restriction.
    pub fn supports_python(&self, python: Option<&VersionReq>) -> bool {
        match (&self.requires_python, python) {
            (Some(ours), Some(project)) => ours.intersects(project),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(requires_python: &str) -> PackageMetadata {
        PackageMetadata::new(PackageName::new("urllib3").unwrap(), Version::new(2, 2, 1))
            .with_requires_python(VersionReq::parse(requires_python).unwrap())
    }

    #[test]
    fn test_supports_python() {
        let project = VersionReq::parse(">=3.9").unwrap();
        assert!(metadata(">=3.8").supports_python(Some(&project)));
        assert!(!metadata("<3.8").supports_python(Some(&project)));
        assert!(metadata("<3.8").supports_python(None));
        assert!(PackageMetadata::new(PackageName::new("six").unwrap(), Version::new(1, 16, 0))
            .supports_python(Some(&project)));
    }
}
