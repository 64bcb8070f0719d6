//! # sprig-core
//!
//! Core types and utilities shared across all sprig crates.
//!
//! This crate provides:
//! - `PackageName`, `Version` and `VersionReq` with Python-flavoured parsing
//! - `Requirement` and `PackageMetadata` for dependency declarations
//! - `SprigError` for unified error handling and CLI exit codes
//! - Hashing and atomic file helpers
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, Requirement, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{SprigError, SprigResult};
pub use types::{
    ConflictingConstraint, GroupName, PackageMetadata, PackageName, ParseError, Requirement,
    RequirementSource, ResolutionFailure, Version, VersionReq,
};
