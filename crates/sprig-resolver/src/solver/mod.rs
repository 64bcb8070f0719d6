//! Backtracking resolver with conflict-directed backjumping
//!
//! The search keeps a stack of decisions (one package pinned to one version
//! per level) and a working set of constraints, each tagged with the level
//! that introduced it. Failures are explained as a set of levels; on failure
//! the solver jumps straight to the most recent implicated level, skipping
//! decisions that had nothing to do with the conflict. A level whose
//! alternatives run out passes its accumulated explanation further down,
//! together with the levels that constrained its own package. An empty
//! explanation means the manifest itself is unsatisfiable.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use sprig_config::Manifest;
use sprig_core::error::SprigError;
use sprig_core::types::{
    ConflictingConstraint, GroupName, PackageName, RequirementSource, ResolutionFailure, Version,
    VersionReq,
};
use sprig_registry::PackageIndex;

use crate::candidates::CandidateSelector;
use crate::graph::ResolutionGraph;
use crate::resolution::{ImposedConstraint, Resolution, ResolvedPackage};
use crate::ResolverResult;

/// Knobs of a single resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Consider pre-releases for every package
    pub allow_prereleases: bool,
    /// Versions to try first when still acceptable
    pub preferences: BTreeMap<PackageName, Version>,
}

impl ResolveOptions {
    pub fn with_prereleases(mut self, allow_prereleases: bool) -> Self {
        self.allow_prereleases = allow_prereleases;
        self
    }

    pub fn with_preferences(mut self, preferences: BTreeMap<PackageName, Version>) -> Self {
        self.preferences = preferences;
        self
    }
}

/// Search statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Packages pinned to a first candidate
    pub decisions: usize,
    /// Steps taken back through the decision stack
    pub backtracks: usize,
}

/// Resolves manifests against one index
pub struct Resolver<'a, I: PackageIndex + ?Sized> {
    index: &'a I,
    options: ResolveOptions,
}

/// Resolve `groups` of `manifest` against `index`
pub fn resolve<I: PackageIndex + ?Sized>(
    manifest: &Manifest,
    groups: &[GroupName],
    index: &I,
    options: &ResolveOptions,
) -> ResolverResult<Resolution> {
    Resolver::new(index)
        .with_options(options.clone())
        .resolve(manifest, groups)
}

impl<'a, I: PackageIndex + ?Sized> Resolver<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self {
            index,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolve(&self, manifest: &Manifest, groups: &[GroupName]) -> ResolverResult<Resolution> {
        self.resolve_with_stats(manifest, groups)
            .map(|(resolution, _)| resolution)
    }

    /// Resolve and report how much searching it took
    pub fn resolve_with_stats(
        &self,
        manifest: &Manifest,
        groups: &[GroupName],
    ) -> ResolverResult<(Resolution, ResolveStats)> {
        let start_time = std::time::Instant::now();
        let mut solver = Solver::new(self.index, manifest, &self.options);

        for sourced in manifest.requirements_for(groups) {
            solver.require(
                sourced.requirement.name,
                sourced.requirement.version_req,
                RequirementSource::root(sourced.group),
                None,
            );
        }

        let outcome = solver.run();
        let stats = solver.stats;
        info!(
            decisions = stats.decisions,
            backtracks = stats.backtracks,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "resolution finished"
        );

        match outcome {
            Ok(()) => {
                let resolution = solver.into_resolution(manifest, groups);
                info!(packages = resolution.len(), "resolved");
                Ok((resolution, stats))
            },
            Err(failure) => Err(SprigError::ResolutionFailure(failure)),
        }
    }
}

/// A constraint in the working set
#[derive(Debug, Clone)]
struct Constraint {
    req: VersionReq,
    source: RequirementSource,
    /// Decision that introduced it; `None` for manifest requirements
    level: Option<usize>,
}

#[derive(Debug)]
struct Decision {
    package: PackageName,
    version: Version,
    /// Untried candidates, in try order
    remaining: Vec<Version>,
    /// What made the versions tried so far fail
    conflict: Conflict,
}

/// Explanation of a dead end
#[derive(Debug, Clone, Default)]
struct Conflict {
    /// Decision levels implicated
    levels: BTreeSet<usize>,
    packages: BTreeSet<PackageName>,
    constraints: BTreeSet<ConflictingConstraint>,
}

impl Conflict {
    fn merge(&mut self, other: Conflict) {
        self.levels.extend(other.levels);
        self.packages.extend(other.packages);
        self.constraints.extend(other.constraints);
    }

    /// Implicate the level that introduced `constraint`
    fn blame(&mut self, package: &PackageName, constraint: &Constraint) {
        self.levels.extend(constraint.level);
        self.describe(package, constraint);
    }

    /// Report `constraint` without implicating its level
    fn describe(&mut self, package: &PackageName, constraint: &Constraint) {
        self.packages.insert(package.clone());
        if let Some(requirer) = constraint.source.package_name() {
            self.packages.insert(requirer.clone());
        }
        self.constraints.insert(ConflictingConstraint {
            package: package.clone(),
            constraint: constraint.req.clone(),
            source: constraint.source.clone(),
        });
    }

    fn into_failure(self) -> ResolutionFailure {
        ResolutionFailure::new(self.packages, self.constraints)
    }
}

struct Solver<'a, I: PackageIndex + ?Sized> {
    index: &'a I,
    selector: CandidateSelector<'a, I>,
    constraints: BTreeMap<PackageName, Vec<Constraint>>,
    decisions: Vec<Decision>,
    /// Assigned package -> its decision level
    assigned: BTreeMap<PackageName, usize>,
    stats: ResolveStats,
}

impl<'a, I: PackageIndex + ?Sized> Solver<'a, I> {
    fn new(index: &'a I, manifest: &'a Manifest, options: &'a ResolveOptions) -> Self {
        Self {
            index,
            selector: CandidateSelector::new(
                index,
                manifest.requires_python.as_ref(),
                options.allow_prereleases,
                &options.preferences,
            ),
            constraints: BTreeMap::new(),
            decisions: Vec::new(),
            assigned: BTreeMap::new(),
            stats: ResolveStats::default(),
        }
    }

    fn require(
        &mut self,
        package: PackageName,
        req: VersionReq,
        source: RequirementSource,
        level: Option<usize>,
    ) {
        self.constraints
            .entry(package)
            .or_default()
            .push(Constraint { req, source, level });
    }

    fn run(&mut self) -> Result<(), ResolutionFailure> {
        loop {
            let Some((package, mut candidates)) = self.next_package() else {
                return Ok(());
            };

            let conflict = if candidates.is_empty() {
                debug!(package = %package, "no candidates left");
                self.exhausted(&package)
            } else {
                let version = candidates.remove(0);
                let level = self.decisions.len();
                self.stats.decisions += 1;
                self.decisions.push(Decision {
                    package,
                    version,
                    remaining: candidates,
                    conflict: Conflict::default(),
                });
                match self.apply(level) {
                    Ok(()) => continue,
                    Err(conflict) => conflict,
                }
            };

            self.backjump(conflict)?;
        }
    }

    /// Unassigned required package with the fewest candidates, ties by name
    fn next_package(&mut self) -> Option<(PackageName, Vec<Version>)> {
        let mut best: Option<(PackageName, Vec<Version>)> = None;

        for (package, constraints) in &self.constraints {
            if self.assigned.contains_key(package) {
                continue;
            }
            let reqs: Vec<&VersionReq> = constraints.iter().map(|c| &c.req).collect();
            let candidates = self.selector.candidates(package, &reqs);

            let fewer = best
                .as_ref()
                .map_or(true, |(_, current)| candidates.len() < current.len());
            if fewer {
                let done = candidates.is_empty();
                best = Some((package.clone(), candidates));
                if done {
                    break;
                }
            }
        }

        best
    }

    /// Pin the decision at `level` and add its dependencies as constraints
    fn apply(&mut self, level: usize) -> Result<(), Conflict> {
        let package = self.decisions[level].package.clone();
        let version = self.decisions[level].version.clone();
        debug!(package = %package, version = %version, level, "trying version");
        self.assigned.insert(package.clone(), level);

        let dependencies = self
            .index
            .metadata(&package, &version)
            .map(|metadata| metadata.dependencies.clone())
            .unwrap_or_default();
        let source = RequirementSource::package(package, version);

        for dependency in dependencies {
            let constraint = Constraint {
                req: dependency.version_req,
                source: source.clone(),
                level: Some(level),
            };

            if let Some(&pinned_at) = self.assigned.get(&dependency.name) {
                if !constraint.req.matches(&self.decisions[pinned_at].version) {
                    return Err(self.clash(&dependency.name, pinned_at, &constraint));
                }
            }

            self.constraints
                .entry(dependency.name)
                .or_default()
                .push(constraint);
        }

        Ok(())
    }

    /// `constraint` excludes the version already pinned for `package`
    fn clash(&self, package: &PackageName, pinned_at: usize, constraint: &Constraint) -> Conflict {
        let pinned = &self.decisions[pinned_at].version;
        debug!(
            package = %package,
            pinned = %pinned,
            constraint = %constraint.req,
            from = %constraint.source,
            "constraint excludes pinned version"
        );

        // Only the two pins are at fault; the other constraints on
        // `package` are reported for context
        let mut conflict = Conflict::default();
        for existing in self.constraints.get(package).into_iter().flatten() {
            conflict.describe(package, existing);
        }
        conflict.levels.insert(pinned_at);
        conflict.blame(package, constraint);
        conflict
    }

    /// Everything that constrains `package`
    fn exhausted(&self, package: &PackageName) -> Conflict {
        let mut conflict = Conflict::default();
        for constraint in self.constraints.get(package).into_iter().flatten() {
            conflict.blame(package, constraint);
        }
        conflict.packages.insert(package.clone());
        conflict
    }

    /// Drop decisions above `level` and retract everything decided at or above it
    fn retract(&mut self, level: usize) {
        for decision in self.decisions.drain(level + 1..) {
            self.assigned.remove(&decision.package);
        }
        self.assigned.remove(&self.decisions[level].package);
        self.constraints.retain(|_, list| {
            list.retain(|c| c.level.map_or(true, |l| l < level));
            !list.is_empty()
        });
    }

    /// Unwind to the most recent implicated decision that still has alternatives
    fn backjump(&mut self, mut conflict: Conflict) -> Result<(), ResolutionFailure> {
        loop {
            let Some(level) = conflict.levels.last().copied() else {
                debug!("conflict does not depend on any decision");
                return Err(conflict.into_failure());
            };
            self.stats.backtracks += 1;

            if level + 1 < self.decisions.len() {
                debug!(
                    from = self.decisions.len() - 1,
                    to = level,
                    "backjumping over unrelated decisions"
                );
            }
            self.retract(level);
            conflict.levels.remove(&level);

            let decision = &mut self.decisions[level];
            decision.conflict.merge(conflict);

            if decision.remaining.is_empty() {
                let decision = self.decisions.remove(level);
                debug!(package = %decision.package, level, "candidates exhausted");
                conflict = decision.conflict;
                conflict.merge(self.exhausted(&decision.package));
                continue;
            }

            decision.version = decision.remaining.remove(0);
            match self.apply(level) {
                Ok(()) => return Ok(()),
                Err(next) => conflict = next,
            }
        }
    }

    fn into_resolution(self, manifest: &Manifest, groups: &[GroupName]) -> Resolution {
        let mut packages = BTreeMap::new();

        for decision in &self.decisions {
            let dependencies = self
                .index
                .metadata(&decision.package, &decision.version)
                .map(|metadata| {
                    metadata
                        .dependencies
                        .iter()
                        .map(|dependency| dependency.name.clone())
                        .collect()
                })
                .unwrap_or_default();
            let constraints = self
                .constraints
                .get(&decision.package)
                .into_iter()
                .flatten()
                .map(|c| ImposedConstraint::new(c.source.clone(), c.req.clone()))
                .collect();

            packages.insert(
                decision.package.clone(),
                ResolvedPackage {
                    version: decision.version.clone(),
                    dependencies,
                    constraints,
                    groups: BTreeSet::new(),
                },
            );
        }

        let mut resolution = Resolution {
            groups: groups.to_vec(),
            packages,
        };
        ResolutionGraph::from_resolution(&resolution).tag_groups(manifest, &mut resolution);
        resolution
    }
}

#[cfg(test)]
mod tests;
