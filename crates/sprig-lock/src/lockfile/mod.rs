//! Lock file model and its TOML form
//!
//! Rendering goes through `toml_edit` so the layout is fixed and diffs stay
//! small; parsing goes through `toml` + serde into raw structs that are then
//! validated. Validation failures are always `LockCorrupt`.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use toml_edit::{Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table, Value};

use sprig_config::Manifest;
use sprig_core::error::SprigError;
use sprig_core::types::{GroupName, PackageName, RequirementSource, Version, VersionReq};
use sprig_resolver::{ImposedConstraint, Resolution, ResolvedPackage};

use crate::LockResult;

/// Format version written by this release
pub const LOCK_VERSION: i64 = 1;

/// First line of every lock file
pub const LOCK_HEADER: &str = "# This file is generated by sprig. Do not edit by hand.";

/// One locked package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    pub name: PackageName,
    pub version: Version,
    /// Hash of `constraints`
    pub input_hash: String,
    pub groups: BTreeSet<GroupName>,
    pub dependencies: BTreeSet<PackageName>,
    pub constraints: BTreeSet<ImposedConstraint>,
}

/// Parsed or freshly computed lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFile {
    /// Manifest input hash this lock was computed from
    pub manifest_hash: String,
    pub requires_python: Option<VersionReq>,
    /// Groups that were resolved, in manifest order
    pub groups: Vec<GroupName>,
    /// Sorted by name, names unique
    pub packages: Vec<LockedPackage>,
}

/// Difference between two locks for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockChange {
    Added {
        name: PackageName,
        version: Version,
    },
    Removed {
        name: PackageName,
        version: Version,
    },
    Updated {
        name: PackageName,
        from: Version,
        to: Version,
    },
}

impl fmt::Display for LockChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockChange::Added { name, version } => write!(f, "Added {} v{}", name, version),
            LockChange::Removed { name, version } => write!(f, "Removed {} v{}", name, version),
            LockChange::Updated { name, from, to } => {
                write!(f, "Updated {} v{} -> v{}", name, from, to)
            },
        }
    }
}

impl LockFile {
    /// Lock for `resolution`, computed from `manifest`
    pub fn from_resolution(manifest: &Manifest, resolution: &Resolution) -> Self {
        let packages = resolution
            .packages
            .iter()
            .map(|(name, package)| LockedPackage {
                name: name.clone(),
                version: package.version.clone(),
                input_hash: package.input_hash(),
                groups: package.groups.clone(),
                dependencies: package.dependencies.clone(),
                constraints: package.constraints.clone(),
            })
            .collect();

        Self {
            manifest_hash: manifest.input_hash(),
            requires_python: manifest.requires_python.clone(),
            groups: resolution.groups.clone(),
            packages,
        }
    }

    /// The resolution this lock records, without resolving anything
    pub fn to_resolution(&self) -> Resolution {
        let packages = self
            .packages
            .iter()
            .map(|package| {
                (
                    package.name.clone(),
                    ResolvedPackage {
                        version: package.version.clone(),
                        dependencies: package.dependencies.clone(),
                        constraints: package.constraints.clone(),
                        groups: package.groups.clone(),
                    },
                )
            })
            .collect();

        Resolution {
            groups: self.groups.clone(),
            packages,
        }
    }

    /// Locked versions, to keep them stable across relocks
    pub fn preferences(&self) -> BTreeMap<PackageName, Version> {
        self.packages
            .iter()
            .map(|package| (package.name.clone(), package.version.clone()))
            .collect()
    }

    pub fn get(&self, name: &PackageName) -> Option<&LockedPackage> {
        self.packages
            .binary_search_by(|package| package.name.cmp(name))
            .ok()
            .map(|i| &self.packages[i])
    }

    /// Whether this lock was computed from `manifest` as it is now
    pub fn is_fresh(&self, manifest: &Manifest) -> bool {
        self.manifest_hash == manifest.input_hash()
    }

    /// `LockStale` unless [`Self::is_fresh`]
    pub fn check_fresh(&self, manifest: &Manifest) -> LockResult<()> {
        let expected = manifest.input_hash();
        if self.manifest_hash == expected {
            Ok(())
        } else {
            Err(SprigError::LockStale {
                expected,
                found: self.manifest_hash.clone(),
            })
        }
    }

    /// Per-package changes from `self` to `newer`, by name
    pub fn diff(&self, newer: &LockFile) -> Vec<LockChange> {
        let old = self.preferences();
        let new = newer.preferences();
        let names: BTreeSet<&PackageName> = old.keys().chain(new.keys()).collect();

        names
            .into_iter()
            .filter_map(|name| match (old.get(name), new.get(name)) {
                (None, Some(version)) => Some(LockChange::Added {
                    name: name.clone(),
                    version: version.clone(),
                }),
                (Some(version), None) => Some(LockChange::Removed {
                    name: name.clone(),
                    version: version.clone(),
                }),
                (Some(from), Some(to)) if from != to => Some(LockChange::Updated {
                    name: name.clone(),
                    from: from.clone(),
                    to: to.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The lock file's text
    pub fn render(&self) -> String {
        let mut doc = DocumentMut::new();
        doc.insert("version", Item::Value(Value::from(LOCK_VERSION)));
        doc.insert("manifest-hash", Item::Value(Value::from(self.manifest_hash.as_str())));
        if let Some(python) = &self.requires_python {
            doc.insert("requires-python", Item::Value(Value::from(python.to_string())));
        }
        doc.insert(
            "groups",
            Item::Value(Value::Array(self.groups.iter().map(GroupName::as_str).collect())),
        );

        let mut packages = ArrayOfTables::new();
        for package in &self.packages {
            let mut table = Table::new();
            table.insert("name", Item::Value(Value::from(package.name.as_str())));
            table.insert("version", Item::Value(Value::from(package.version.to_string())));
            table.insert("input-hash", Item::Value(Value::from(package.input_hash.as_str())));
            table.insert(
                "groups",
                Item::Value(Value::Array(package.groups.iter().map(GroupName::as_str).collect())),
            );
            table.insert(
                "dependencies",
                Item::Value(Value::Array(
                    package.dependencies.iter().map(PackageName::as_str).collect(),
                )),
            );

            let mut constraints = Array::new();
            for imposed in &package.constraints {
                let mut entry = InlineTable::new();
                entry.insert("source", Value::from(imposed.source.to_string()));
                entry.insert("constraint", Value::from(imposed.constraint.to_string()));
                constraints.push_formatted(Value::InlineTable(entry).decorated("\n    ", ""));
            }
            if !constraints.is_empty() {
                constraints.set_trailing("\n");
                constraints.set_trailing_comma(true);
            }
            table.insert("constraints", Item::Value(Value::Array(constraints)));
            packages.push(table);
        }
        if !packages.is_empty() {
            doc.insert("package", Item::ArrayOfTables(packages));
        }

        format!("{}\n{}", LOCK_HEADER, doc)
    }

    /// Parse and validate lock file text
    pub fn parse(content: &str) -> LockResult<Self> {
        let raw: RawLock = toml::from_str(content)
            .map_err(|e| SprigError::lock_corrupt(e.message().trim().to_string()))?;

        if raw.version != LOCK_VERSION {
            return Err(SprigError::lock_corrupt(format!(
                "unsupported lock format version {} (expected {})",
                raw.version, LOCK_VERSION
            )));
        }

        let requires_python = raw
            .requires_python
            .as_deref()
            .map(|text| {
                VersionReq::parse(text)
                    .map_err(|e| corrupt_field("requires-python", text, e))
            })
            .transpose()?;

        let groups = raw
            .groups
            .iter()
            .map(|text| GroupName::new(text).map_err(|e| corrupt_field("groups", text, e)))
            .collect::<LockResult<Vec<_>>>()?;
        let known_groups: BTreeSet<&GroupName> = groups.iter().collect();

        let mut packages: Vec<LockedPackage> = Vec::with_capacity(raw.packages.len());
        for raw_package in raw.packages {
            let package = raw_package.validate(&known_groups)?;
            if let Some(previous) = packages.last() {
                if previous.name >= package.name {
                    return Err(SprigError::lock_corrupt(format!(
                        "package entries are not sorted: '{}' follows '{}'",
                        package.name, previous.name
                    )));
                }
            }
            packages.push(package);
        }

        let lock = Self {
            manifest_hash: raw.manifest_hash,
            requires_python,
            groups,
            packages,
        };
        lock.check_consistency()?;
        Ok(lock)
    }

    /// Cross-entry checks: dependencies resolve and constraints hold
    fn check_consistency(&self) -> LockResult<()> {
        let resolution = self.to_resolution();
        if let Some((package, dependency)) = resolution.dangling().first() {
            return Err(SprigError::lock_corrupt(format!(
                "'{}' depends on '{}', which is not locked",
                package, dependency
            )));
        }
        if let Some((package, imposed)) = resolution.unsatisfied().first() {
            return Err(SprigError::lock_corrupt(format!(
                "locked version of '{}' does not satisfy {}",
                package, imposed
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawLock {
    version: i64,
    manifest_hash: String,
    requires_python: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default, rename = "package")]
    packages: Vec<RawPackage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawPackage {
    name: String,
    version: String,
    input_hash: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    constraints: Vec<RawConstraint>,
}

#[derive(Deserialize)]
struct RawConstraint {
    source: String,
    constraint: String,
}

impl RawPackage {
    fn validate(self, known_groups: &BTreeSet<&GroupName>) -> LockResult<LockedPackage> {
        let name = PackageName::new(&self.name).map_err(|e| corrupt_field("name", &self.name, e))?;
        let field = |what: &str| format!("{} of '{}'", what, name);

        let version = Version::parse(&self.version)
            .map_err(|e| corrupt_field(&field("version"), &self.version, e))?;

        let mut groups = BTreeSet::new();
        for text in &self.groups {
            let group = GroupName::new(text).map_err(|e| corrupt_field(&field("groups"), text, e))?;
            if !known_groups.contains(&group) {
                return Err(SprigError::lock_corrupt(format!(
                    "'{}' belongs to undeclared group '{}'",
                    name, group
                )));
            }
            groups.insert(group);
        }

        let dependencies = self
            .dependencies
            .iter()
            .map(|text| {
                PackageName::new(text).map_err(|e| corrupt_field(&field("dependencies"), text, e))
            })
            .collect::<LockResult<BTreeSet<_>>>()?;

        let mut constraints = BTreeSet::new();
        for raw in &self.constraints {
            let source: RequirementSource = raw
                .source
                .parse()
                .map_err(|e| corrupt_field(&field("constraint source"), &raw.source, e))?;
            let constraint = VersionReq::parse(&raw.constraint)
                .map_err(|e| corrupt_field(&field("constraint"), &raw.constraint, e))?;
            constraints.insert(ImposedConstraint::new(source, constraint));
        }

        let package = LockedPackage {
            name,
            version,
            input_hash: self.input_hash,
            groups,
            dependencies,
            constraints,
        };

        let recomputed = ResolvedPackage {
            version: package.version.clone(),
            dependencies: BTreeSet::new(),
            constraints: package.constraints.clone(),
            groups: BTreeSet::new(),
        }
        .input_hash();
        if recomputed != package.input_hash {
            return Err(SprigError::lock_corrupt(format!(
                "input-hash of '{}' does not match its constraints",
                package.name
            )));
        }

        Ok(package)
    }
}

fn corrupt_field(field: &str, value: &str, error: impl fmt::Display) -> SprigError {
    SprigError::lock_corrupt(format!("invalid {} '{}': {}", field, value, error))
}
