//! Core data types for sprig dependency management.
//!
//! This module provides the fundamental types used throughout sprig:
//! - Package and group names with case-insensitive normalization
//! - Versions and version constraints
//! - Requirements, package metadata and resolution conflicts

pub mod conflict;
pub mod constraint;
pub mod dependency;
pub mod name;
pub mod package;
pub mod version;

// Re-export all public types
pub use conflict::{ConflictingConstraint, RequirementSource, ResolutionFailure};
pub use constraint::{Comparator, Op, PartialVersion, VersionReq};
pub use dependency::Requirement;
pub use name::{GroupName, PackageName};
pub use package::PackageMetadata;
pub use version::{ParseError, Version};
