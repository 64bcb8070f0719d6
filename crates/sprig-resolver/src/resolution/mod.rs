//! Result of a successful resolution

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use sprig_core::types::{GroupName, PackageName, RequirementSource, Version, VersionReq};
use sprig_core::utils::Fingerprint;

/// A constraint some requirer placed on a resolved package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImposedConstraint {
    pub source: RequirementSource,
    pub constraint: VersionReq,
}

/// One package of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub version: Version,
    /// Names of the chosen version's direct dependencies
    pub dependencies: BTreeSet<PackageName>,
    /// Every constraint on this package, manifest and dependency alike
    pub constraints: BTreeSet<ImposedConstraint>,
    /// Requested groups whose closure reaches this package
    pub groups: BTreeSet<GroupName>,
}

/// Exactly one version per required package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Groups that were resolved, in manifest order
    pub groups: Vec<GroupName>,
    pub packages: BTreeMap<PackageName, ResolvedPackage>,
}

impl ImposedConstraint {
    pub fn new(source: RequirementSource, constraint: VersionReq) -> Self {
        Self { source, constraint }
    }
}

impl fmt::Display for ImposedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.constraint, self.source)
    }
}

impl ResolvedPackage {
    /// Hash of the constraints that determined this package's version
    pub fn input_hash(&self) -> String {
        let mut fingerprint = Fingerprint::new();
        for imposed in &self.constraints {
            fingerprint
                .field("source", &imposed.source.to_string())
                .field("constraint", &imposed.constraint.to_string());
        }
        fingerprint.finish()
    }

    pub fn in_any_group(&self, groups: &[GroupName]) -> bool {
        groups.iter().any(|group| self.groups.contains(group))
    }
}

impl Resolution {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, name: &PackageName) -> Option<&ResolvedPackage> {
        self.packages.get(name)
    }

    pub fn version(&self, name: &PackageName) -> Option<&Version> {
        self.packages.get(name).map(|package| &package.version)
    }

    /// Packages reachable from any of `groups`, by name
    pub fn packages_in<'a>(
        &'a self,
        groups: &'a [GroupName],
    ) -> impl Iterator<Item = (&'a PackageName, &'a ResolvedPackage)> + 'a {
        self.packages
            .iter()
            .filter(move |(_, package)| package.in_any_group(groups))
    }

    /// Chosen versions, for use as preferences by a later resolution
    pub fn preferences(&self) -> BTreeMap<PackageName, Version> {
        self.packages
            .iter()
            .map(|(name, package)| (name.clone(), package.version.clone()))
            .collect()
    }

    /// Constraints the chosen versions do not satisfy (empty when sound)
    pub fn unsatisfied(&self) -> Vec<(&PackageName, &ImposedConstraint)> {
        self.packages
            .iter()
            .flat_map(|(name, package)| {
                package
                    .constraints
                    .iter()
                    .filter(move |imposed| !imposed.constraint.matches(&package.version))
                    .map(move |imposed| (name, imposed))
            })
            .collect()
    }

    /// Dependency names that are not themselves resolved
    pub fn dangling(&self) -> Vec<(&PackageName, &PackageName)> {
        self.packages
            .iter()
            .flat_map(|(name, package)| {
                package
                    .dependencies
                    .iter()
                    .filter(|dependency| !self.packages.contains_key(*dependency))
                    .map(move |dependency| (name, dependency))
            })
            .collect()
    }
}
