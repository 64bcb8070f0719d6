//! Environment bookkeeping for sprig
//!
//! An environment is recorded as the set of installed package versions in
//! `.sprig/environment.json`. Installing from a lock computes an
//! [`InstallPlan`] against that record and applies it; placing files on disk
//! is left to the installer backend.

pub mod plan;
pub mod state;

// Re-export main types
pub use plan::{install_targets, InstallAction, InstallPlan, PlanSummary};
pub use state::{environment_path, EnvironmentState, InstalledPackage, ENVIRONMENT_FILE};

use sprig_core::error::SprigError;

/// Result type for environment operations
pub type EnvResult<T> = Result<T, SprigError>;
