//! Recorded state of an environment

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use sprig_core::error::SprigError;
use sprig_core::types::{PackageName, Version};
use sprig_core::utils::atomic_write;

use crate::plan::{InstallAction, InstallPlan};
use crate::EnvResult;

/// Location of the record, relative to the project directory
pub const ENVIRONMENT_FILE: &str = ".sprig/environment.json";

/// `<project>/.sprig/environment.json`
pub fn environment_path(project_dir: &Utf8Path) -> Utf8PathBuf {
    project_dir.join(ENVIRONMENT_FILE)
}

/// Metadata for an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstalledPackage {
    pub version: Version,
    /// When this version was installed
    pub installed_at: DateTime<Utc>,
}

/// Installed packages by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    #[serde(default)]
    pub packages: BTreeMap<PackageName, InstalledPackage>,
}

impl InstalledPackage {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            installed_at: Utc::now(),
        }
    }
}

impl EnvironmentState {
    /// Load the record at `path`; a missing file is an empty environment
    pub fn load(path: &Utf8Path) -> EnvResult<Self> {
        if !path.exists() {
            debug!("No environment record at {}", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;
        serde_json::from_str(&content).map_err(|e| {
            SprigError::io(
                format!("Failed to parse {}", path),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Replace the record at `path`
    pub fn save(&self, path: &Utf8Path) -> EnvResult<()> {
        let content = serde_json::to_vec_pretty(self).map_err(|e| {
            SprigError::io(
                "Failed to serialize environment".to_string(),
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?;
        atomic_write(path.as_std_path(), &content)
    }

    pub fn version(&self, name: &PackageName) -> Option<&Version> {
        self.packages.get(name).map(|installed| &installed.version)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Record the effect of every action in `plan`
    pub fn apply(&mut self, plan: &InstallPlan) {
        for action in &plan.actions {
            match action {
                InstallAction::Install { name, version }
                | InstallAction::Upgrade { name, to: version, .. }
                | InstallAction::Downgrade { name, to: version, .. } => {
                    self.packages
                        .insert(name.clone(), InstalledPackage::new(version.clone()));
                },
                InstallAction::Remove { name, .. } => {
                    self.packages.remove(name);
                },
                InstallAction::Keep { .. } => {},
            }
        }
    }
}
