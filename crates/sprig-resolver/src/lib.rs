//! Dependency resolution for sprig
//!
//! The resolver is a synchronous search over an immutable [`PackageIndex`]:
//! most-constrained package first, newest candidate first, with
//! conflict-directed backjumping when a partial assignment cannot be
//! extended. Given the same manifest and index it always produces the same
//! [`Resolution`].
//!
//! [`PackageIndex`]: sprig_registry::PackageIndex

pub mod candidates;
pub mod graph;
pub mod resolution;
pub mod solver;

// Re-export main types
pub use candidates::CandidateSelector;
pub use graph::ResolutionGraph;
pub use resolution::{ImposedConstraint, Resolution, ResolvedPackage};
pub use solver::{resolve, ResolveOptions, ResolveStats, Resolver};

use sprig_core::error::SprigError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, SprigError>;
