//! Structured description of an unsatisfiable set of requirements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{GroupName, PackageName, ParseError, Version, VersionReq};

/// Where a constraint came from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequirementSource {
    /// Declared directly in the manifest
    Root { group: GroupName },
    /// Declared by a selected package version
    Package { name: PackageName, version: Version },
}

/// One constraint taking part in a conflict
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConflictingConstraint {
    pub package: PackageName,
    pub constraint: VersionReq,
    pub source: RequirementSource,
}

/// No assignment satisfies the requested groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    /// Packages involved in the final conflict, sorted
    pub packages: Vec<PackageName>,
    /// The constraints that could not be satisfied together
    pub constraints: Vec<ConflictingConstraint>,
}

impl ResolutionFailure {
    /// Build a failure report; packages and constraints are sorted and deduplicated
    pub fn new(
        packages: impl IntoIterator<Item = PackageName>,
        constraints: impl IntoIterator<Item = ConflictingConstraint>,
    ) -> Self {
        let mut packages: Vec<_> = packages.into_iter().collect();
        packages.sort();
        packages.dedup();
        let mut constraints: Vec<_> = constraints.into_iter().collect();
        constraints.sort();
        constraints.dedup();
        Self {
            packages,
            constraints,
        }
    }

    pub fn involves(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p.as_str() == name)
    }
}

impl RequirementSource {
    pub fn root(group: GroupName) -> Self {
        Self::Root { group }
    }

    pub fn package(name: PackageName, version: Version) -> Self {
        Self::Package { name, version }
    }

    /// The package that declared the constraint, if any
    pub fn package_name(&self) -> Option<&PackageName> {
        match self {
            Self::Root { .. } => None,
            Self::Package { name, .. } => Some(name),
        }
    }
}

impl fmt::Display for RequirementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root { group } => write!(f, "root ({})", group),
            Self::Package { name, version } => write!(f, "{}=={}", name, version),
        }
    }
}

/// Parses the `Display` form: `root (group)` or `name==version`
impl FromStr for RequirementSource {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(group) = s
            .strip_prefix("root (")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(Self::root(GroupName::new(group)?));
        }
        match s.split_once("==") {
            Some((name, version)) => Ok(Self::package(
                PackageName::new(name)?,
                Version::parse(version)?,
            )),
            None => Err(ParseError::InvalidRequirement {
                input: s.to_string(),
                reason: "expected 'root (group)' or 'name==version'".to_string(),
            }),
        }
    }
}

impl fmt::Display for ConflictingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_any() {
            write!(f, "{} (from {})", self.package, self.source)
        } else {
            write!(f, "{}{} (from {})", self.package, self.constraint, self.source)
        }
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.packages.iter().map(PackageName::as_str).collect();
        write!(f, "conflicting requirements for {{{}}}", names.join(", "))?;
        for constraint in &self.constraints {
            write!(f, "\n  {}", constraint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_packages_and_sources() {
        let pkg_a = PackageName::new("pkgA").unwrap();
        let pkg_b = PackageName::new("pkgB").unwrap();
        let failure = ResolutionFailure::new(
            [pkg_b.clone(), pkg_a.clone(), pkg_a.clone()],
            [
                ConflictingConstraint {
                    package: pkg_a.clone(),
                    constraint: VersionReq::parse("<2.0").unwrap(),
                    source: RequirementSource::package(pkg_b, Version::new(1, 0, 0)),
                },
                ConflictingConstraint {
                    package: pkg_a,
                    constraint: VersionReq::parse(">=2.0").unwrap(),
                    source: RequirementSource::root(GroupName::default_group()),
                },
            ],
        );

        assert_eq!(failure.packages.len(), 2);
        assert!(failure.involves("pkga"));
        assert!(failure.involves("pkgb"));

        let rendered = failure.to_string();
        assert!(rendered.starts_with("conflicting requirements for {pkga, pkgb}"));
        assert!(rendered.contains("pkga>=2.0 (from root (default))"));
        assert!(rendered.contains("pkga<2.0 (from pkgb==1.0.0)"));
    }

    #[test]
    fn test_source_parses_its_display_form() {
        let root = RequirementSource::root(GroupName::new("dev").unwrap());
        let package = RequirementSource::package(
            PackageName::new("requests").unwrap(),
            Version::parse("2.32.3").unwrap(),
        );
        assert_eq!(root.to_string().parse::<RequirementSource>().unwrap(), root);
        assert_eq!(package.to_string().parse::<RequirementSource>().unwrap(), package);
        assert!("requests".parse::<RequirementSource>().is_err());
        assert!("root (Not A Group!)".parse::<RequirementSource>().is_err());
    }
}
