//! sprig.toml parsing and validation
//!
//! Parsing happens in two passes: `toml_edit` first, so syntax errors carry a
//! precise line and column, then `toml` + serde into raw structs that are
//! validated into a [`Manifest`]. Nothing partially valid leaves this module.

use camino::Utf8Path;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

use sprig_core::error::SprigError;
use sprig_core::types::{GroupName, PackageName, ParseError, Requirement, Version, VersionReq};
use sprig_core::utils::Fingerprint;

use crate::settings::SettingsOverlay;
use crate::ConfigResult;

/// Validated project manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Project name from `[project]`
    pub name: PackageName,

    /// Project version from `[project]`
    pub version: Version,

    /// Python versions the project supports
    pub requires_python: Option<VersionReq>,

    /// Dependency groups in document order; `default` is always first
    pub groups: IndexMap<GroupName, Vec<GroupEntry>>,

    /// `[tool.sprig]` settings
    pub settings: SettingsOverlay,
}

/// One entry of a dependency group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEntry {
    Requirement(Requirement),
    /// `{ include-group = "name" }`
    Include(GroupName),
}

/// Requirement tagged with the group that declared it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedRequirement {
    pub requirement: Requirement,
    pub group: GroupName,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawManifest {
    project: Option<RawProject>,
    #[serde(default)]
    dependency_groups: IndexMap<String, Vec<RawGroupEntry>>,
    #[serde(default)]
    tool: RawTool,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawProject {
    name: String,
    version: String,
    requires_python: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupEntry {
    Requirement(String),
    Include {
        #[serde(rename = "include-group")]
        include_group: String,
    },
}

#[derive(Deserialize, Default)]
struct RawTool {
    #[serde(default)]
    sprig: SettingsOverlay,
}

/// Parse sprig.toml content into a validated manifest
pub fn parse_manifest(content: &str) -> ConfigResult<Manifest> {
    // First pass with toml_edit for precise syntax error positions
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| located(content, e.message(), e.span()))?;

    // Then parse with serde for type safety
    let raw: RawManifest =
        toml::from_str(content).map_err(|e| located(content, e.message(), e.span()))?;

    let manifest = build_manifest(raw)?;
    debug!(
        project = %manifest.name,
        groups = manifest.groups.len(),
        "parsed manifest"
    );
    Ok(manifest)
}

/// Load and parse sprig.toml from a file path
pub async fn load_manifest(path: &Utf8Path) -> ConfigResult<Manifest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;

    parse_manifest(&content).map_err(|e| match e {
        SprigError::MalformedManifest {
            message,
            line,
            column,
        } => SprigError::MalformedManifest {
            message: format!("{}: {}", path, message),
            line,
            column,
        },
        other => other,
    })
}

fn build_manifest(raw: RawManifest) -> ConfigResult<Manifest> {
    let project = raw
        .project
        .ok_or_else(|| SprigError::malformed("missing [project] table"))?;

    let name = PackageName::new(&project.name)
        .map_err(|e| SprigError::malformed(format!("[project] name: {}", e)))?;
    let version = Version::parse(&project.version)
        .map_err(|e| SprigError::malformed(format!("[project] version: {}", e)))?;
    let requires_python = project
        .requires_python
        .as_deref()
        .map(|raw| {
            VersionReq::parse(raw).map_err(|e| SprigError::invalid_constraint("python", raw, e))
        })
        .transpose()?;

    let mut declared: IndexMap<GroupName, Vec<RawGroupEntry>> = IndexMap::new();
    declared.insert(
        GroupName::default_group(),
        project
            .dependencies
            .into_iter()
            .map(RawGroupEntry::Requirement)
            .collect(),
    );
    for (raw_name, entries) in raw.dependency_groups {
        let group = GroupName::new(&raw_name)
            .map_err(|e| SprigError::malformed(format!("dependency group name: {}", e)))?;
        if group.is_default() {
            return Err(SprigError::malformed(
                "group 'default' is reserved for [project] dependencies",
            ));
        }
        if declared.contains_key(&group) {
            return Err(SprigError::malformed(format!(
                "dependency group '{}' is declared more than once",
                group
            )));
        }
        declared.insert(group, entries);
    }

    let mut groups = IndexMap::with_capacity(declared.len());
    for (group, entries) in &declared {
        let mut seen = HashSet::new();
        let mut parsed = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                RawGroupEntry::Requirement(text) => {
                    let requirement = parse_requirement(text)?;
                    if !seen.insert(requirement.name.clone()) {
                        return Err(SprigError::malformed(format!(
                            "'{}' appears more than once in group '{}'",
                            requirement.name, group
                        )));
                    }
                    parsed.push(GroupEntry::Requirement(requirement));
                },
                RawGroupEntry::Include { include_group } => {
                    let target = GroupName::new(include_group)
                        .ok()
                        .filter(|target| declared.contains_key(target))
                        .ok_or_else(|| SprigError::UnknownGroup {
                            group: include_group.clone(),
                            referenced_by: Some(group.to_string()),
                        })?;
                    parsed.push(GroupEntry::Include(target));
                },
            }
        }
        groups.insert(group.clone(), parsed);
    }

    let manifest = Manifest {
        name,
        version,
        requires_python,
        groups,
        settings: raw.tool.sprig,
    };
    manifest.check_include_cycles()?;
    Ok(manifest)
}

/// Parse a requirement, attributing constraint errors to their package
pub fn parse_requirement(text: &str) -> ConfigResult<Requirement> {
    Requirement::parse(text).map_err(|e| match e {
        ParseError::InvalidRequirement { .. } => {
            let (name, constraint) = Requirement::split(text);
            SprigError::invalid_constraint(name, constraint, e)
        },
        other => SprigError::malformed(format!("invalid requirement '{}': {}", text, other)),
    })
}

/// Convert a byte span into a 1-based line/column manifest error
pub(crate) fn located(content: &str, message: &str, span: Option<Range<usize>>) -> SprigError {
    let (line, column) = span
        .map(|span| line_column(content, span.start))
        .unwrap_or((0, 0));
    SprigError::MalformedManifest {
        message: message.trim().to_string(),
        line,
        column,
    }
}

fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = content.get(..offset).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

impl Manifest {
    /// Every declared group in document order
    pub fn all_groups(&self) -> Vec<GroupName> {
        self.groups.keys().cloned().collect()
    }

    /// Validate requested group names; no request selects `default`
    pub fn select_groups(&self, requested: &[String]) -> ConfigResult<Vec<GroupName>> {
        if requested.is_empty() {
            return Ok(vec![GroupName::default_group()]);
        }

        let mut selected = Vec::with_capacity(requested.len());
        for raw in requested {
            let group = GroupName::new(raw)
                .ok()
                .filter(|group| self.groups.contains_key(group))
                .ok_or_else(|| SprigError::UnknownGroup {
                    group: raw.clone(),
                    referenced_by: None,
                })?;
            if !selected.contains(&group) {
                selected.push(group);
            }
        }
        Ok(selected)
    }

    /// Flattened requirements of `groups`, includes expanded
    pub fn requirements_for(&self, groups: &[GroupName]) -> Vec<SourcedRequirement> {
        let mut visited = HashSet::new();
        let mut requirements = Vec::new();
        for group in groups {
            self.collect_requirements(group, &mut visited, &mut requirements);
        }
        requirements
    }

    fn collect_requirements(
        &self,
        group: &GroupName,
        visited: &mut HashSet<GroupName>,
        out: &mut Vec<SourcedRequirement>,
    ) {
        if !visited.insert(group.clone()) {
            return;
        }
        for entry in self.groups.get(group).into_iter().flatten() {
            match entry {
                GroupEntry::Requirement(requirement) => out.push(SourcedRequirement {
                    requirement: requirement.clone(),
                    group: group.clone(),
                }),
                GroupEntry::Include(target) => self.collect_requirements(target, visited, out),
            }
        }
    }

    /// Requirement for `name` declared directly in `group`
    pub fn find_requirement(&self, group: &GroupName, name: &PackageName) -> Option<&Requirement> {
        self.groups
            .get(group)
            .into_iter()
            .flatten()
            .find_map(|entry| match entry {
                GroupEntry::Requirement(requirement) if &requirement.name == name => {
                    Some(requirement)
                },
                _ => None,
            })
    }

    /// Hash of everything that affects resolution.
    ///
    /// Covers `requires-python`, every group in document order and a
    /// project-level `allow-prereleases = true`. The project name, version
    /// and the remaining tool settings are not inputs.
    pub fn input_hash(&self) -> String {
        let mut fingerprint = Fingerprint::new();
        let python = self
            .requires_python
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        fingerprint.field("requires-python", &python);
        // Absent and `false` resolve alike and keep existing locks fresh
        if self.settings.allow_prereleases == Some(true) {
            fingerprint.field("allow-prereleases", "true");
        }

        for (group, entries) in &self.groups {
            fingerprint.section(group.as_str());
            for entry in entries {
                match entry {
                    GroupEntry::Requirement(requirement) => {
                        fingerprint.field("requirement", &requirement.to_string());
                    },
                    GroupEntry::Include(target) => {
                        fingerprint.field("include", target.as_str());
                    },
                }
            }
        }

        fingerprint.finish()
    }

    fn check_include_cycles(&self) -> ConfigResult<()> {
        fn visit<'a>(
            manifest: &'a Manifest,
            group: &'a GroupName,
            stack: &mut Vec<&'a GroupName>,
            done: &mut HashSet<&'a GroupName>,
        ) -> ConfigResult<()> {
            if done.contains(group) {
                return Ok(());
            }
            if let Some(start) = stack.iter().position(|g| *g == group) {
                let cycle: Vec<&str> = stack[start..]
                    .iter()
                    .map(|g| g.as_str())
                    .chain(std::iter::once(group.as_str()))
                    .collect();
                return Err(SprigError::malformed(format!(
                    "dependency group include cycle: {}",
                    cycle.join(" -> ")
                )));
            }

            stack.push(group);
            for entry in manifest.groups.get(group).into_iter().flatten() {
                if let GroupEntry::Include(target) = entry {
                    visit(manifest, target, stack, done)?;
                }
            }
            stack.pop();
            done.insert(group);
            Ok(())
        }

        let mut done = HashSet::new();
        for group in self.groups.keys() {
            visit(self, group, &mut Vec::new(), &mut done)?;
        }
        Ok(())
    }
}
