//! Install plans: what to change to make an environment match a lock

use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use sprig_core::types::{GroupName, PackageName, Version};
use sprig_resolver::{Resolution, ResolutionGraph};

use crate::state::EnvironmentState;

/// One step of an [`InstallPlan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallAction {
    Install {
        name: PackageName,
        version: Version,
    },
    Upgrade {
        name: PackageName,
        from: Version,
        to: Version,
    },
    Downgrade {
        name: PackageName,
        from: Version,
        to: Version,
    },
    Keep {
        name: PackageName,
        version: Version,
    },
    Remove {
        name: PackageName,
        version: Version,
    },
}

/// Ordered actions: removals first (by name), then targets in install order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    pub actions: Vec<InstallAction>,
}

/// Action counts of a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub installed: usize,
    pub upgraded: usize,
    pub downgraded: usize,
    pub kept: usize,
    pub removed: usize,
}

impl InstallAction {
    pub fn name(&self) -> &PackageName {
        match self {
            InstallAction::Install { name, .. }
            | InstallAction::Upgrade { name, .. }
            | InstallAction::Downgrade { name, .. }
            | InstallAction::Keep { name, .. }
            | InstallAction::Remove { name, .. } => name,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, InstallAction::Keep { .. })
    }
}

impl fmt::Display for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallAction::Install { name, version } => write!(f, "+ {}=={}", name, version),
            InstallAction::Upgrade { name, from, to } => {
                write!(f, "~ {} {} -> {}", name, from, to)
            },
            InstallAction::Downgrade { name, from, to } => {
                write!(f, "~ {} {} -> {} (downgrade)", name, from, to)
            },
            InstallAction::Keep { name, version } => write!(f, "  {}=={}", name, version),
            InstallAction::Remove { name, version } => write!(f, "- {}=={}", name, version),
        }
    }
}

impl InstallPlan {
    /// Plan for moving `state` to `targets`.
    ///
    /// `targets` is taken in order and should already be in install order.
    /// With `exact`, installed packages that are not targets are removed;
    /// otherwise they are left alone.
    pub fn new(state: &EnvironmentState, targets: &[(PackageName, Version)], exact: bool) -> Self {
        let mut actions = Vec::with_capacity(targets.len());

        if exact {
            let wanted: BTreeSet<&PackageName> = targets.iter().map(|(name, _)| name).collect();
            for (name, installed) in &state.packages {
                if !wanted.contains(name) {
                    actions.push(InstallAction::Remove {
                        name: name.clone(),
                        version: installed.version.clone(),
                    });
                }
            }
        }

        for (name, version) in targets {
            let action = match state.version(name) {
                None => InstallAction::Install {
                    name: name.clone(),
                    version: version.clone(),
                },
                Some(current) if current == version => InstallAction::Keep {
                    name: name.clone(),
                    version: version.clone(),
                },
                Some(current) if current < version => InstallAction::Upgrade {
                    name: name.clone(),
                    from: current.clone(),
                    to: version.clone(),
                },
                Some(current) => InstallAction::Downgrade {
                    name: name.clone(),
                    from: current.clone(),
                    to: version.clone(),
                },
            };
            actions.push(action);
        }

        let plan = Self { actions };
        debug!("Planned {:?}", plan.summary());
        plan
    }

    /// Plan for the packages of `groups` in `resolution`, dependencies first
    pub fn for_resolution(
        state: &EnvironmentState,
        resolution: &Resolution,
        groups: &[GroupName],
        exact: bool,
    ) -> Self {
        let targets = install_targets(resolution, groups);
        Self::new(state, &targets, exact)
    }

    /// Whether applying the plan changes nothing
    pub fn is_noop(&self) -> bool {
        !self.actions.iter().any(InstallAction::is_change)
    }

    /// Actions other than `Keep`
    pub fn changes(&self) -> impl Iterator<Item = &InstallAction> {
        self.actions.iter().filter(|action| action.is_change())
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action {
                InstallAction::Install { .. } => summary.installed += 1,
                InstallAction::Upgrade { .. } => summary.upgraded += 1,
                InstallAction::Downgrade { .. } => summary.downgraded += 1,
                InstallAction::Keep { .. } => summary.kept += 1,
                InstallAction::Remove { .. } => summary.removed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} installed, {} upgraded, {} downgraded, {} removed, {} unchanged",
            self.installed, self.upgraded, self.downgraded, self.removed, self.kept
        )
    }
}

/// Packages of `groups` with their versions, in install order
pub fn install_targets(resolution: &Resolution, groups: &[GroupName]) -> Vec<(PackageName, Version)> {
    ResolutionGraph::from_resolution(resolution)
        .install_order()
        .into_iter()
        .filter_map(|name| {
            let package = resolution.get(&name)?;
            package
                .in_any_group(groups)
                .then(|| (name, package.version.clone()))
        })
        .collect()
}
