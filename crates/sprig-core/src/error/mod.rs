//! Error types and result aliases for sprig operations.
//!
//! Provides a unified error type that covers every failure kind a sprig
//! command can report, each mapped to a distinct process exit code.

use thiserror::Error;

use crate::types::{ParseError, ResolutionFailure};

/// Unified error type for all sprig operations
#[derive(Error, Debug)]
pub enum SprigError {
    // Manifest errors
    #[error("Malformed manifest: {message}{}", location(.line, .column))]
    MalformedManifest {
        message: String,
        /// 1-based; 0 when the position is unknown
        line: usize,
        column: usize,
    },

    #[error("Unknown dependency group '{group}'{}", included_by(.referenced_by))]
    UnknownGroup {
        group: String,
        referenced_by: Option<String>,
    },

    #[error("Invalid constraint '{constraint}' for '{package}': {reason}")]
    InvalidConstraint {
        package: String,
        constraint: String,
        reason: String,
    },

    // Resolution errors
    #[error("Resolution failed: {0}")]
    ResolutionFailure(ResolutionFailure),

    // Lock errors
    #[error("Lock file is corrupt: {message}")]
    LockCorrupt { message: String },

    #[error("Lock file is stale: manifest hash is {expected} but the lock records {found}")]
    LockStale { expected: String, found: String },

    // Index errors
    #[error("Failed to fetch package metadata: {message}")]
    FetchFailure {
        message: String,
        /// Worth retrying; false when the index served data that will never parse
        transient: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Package '{name}' not found")]
    PackageNotFound { name: String },

    // Config errors
    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for sprig operations
pub type SprigResult<T> = Result<T, SprigError>;

fn location(line: &usize, column: &usize) -> String {
    if *line == 0 {
        String::new()
    } else {
        format!(" at line {}, column {}", line, column)
    }
}

fn included_by(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(group) => format!(" (included by '{}')", group),
        None => String::new(),
    }
}

impl SprigError {
    /// Create a fetch failure from any error type
    pub fn fetch<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::FetchFailure {
            message,
            transient: true,
            source: Some(Box::new(source)),
        }
    }

    /// Create a fetch failure with no underlying error
    pub fn fetch_message(message: impl Into<String>) -> Self {
        Self::FetchFailure {
            message: message.into(),
            transient: true,
            source: None,
        }
    }

    /// Fetch failure for index data that is well-formed JSON but invalid
    pub fn invalid_index_data(message: impl Into<String>) -> Self {
        Self::FetchFailure {
            message: message.into(),
            transient: false,
            source: None,
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Manifest error without a known position
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    pub fn lock_corrupt(message: impl Into<String>) -> Self {
        Self::LockCorrupt {
            message: message.into(),
        }
    }

    /// Attribute a constraint parse error to the package it was written for
    pub fn invalid_constraint(package: &str, constraint: &str, error: ParseError) -> Self {
        Self::InvalidConstraint {
            package: package.to_string(),
            constraint: constraint.to_string(),
            reason: error.to_string(),
        }
    }

    /// Check if this error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SprigError::FetchFailure {
                transient: true,
                ..
            } | SprigError::Io { .. }
        )
    }

    /// Process exit code for this failure kind
    pub fn exit_code(&self) -> i32 {
        match self {
            SprigError::MalformedManifest { .. } => 3,
            SprigError::UnknownGroup { .. } => 4,
            SprigError::InvalidConstraint { .. } => 5,
            SprigError::ResolutionFailure(_) => 6,
            SprigError::LockCorrupt { .. } => 7,
            SprigError::LockStale { .. } => 8,
            SprigError::FetchFailure { .. } => 9,
            SprigError::PackageNotFound { .. } => 10,
            SprigError::ConfigValidation { .. } => 11,
            SprigError::Io { .. } => 12,
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SprigError::MalformedManifest { .. } => {
                Some("Fix the syntax of sprig.toml and run the command again")
            },
            SprigError::UnknownGroup { .. } => {
                Some("Declare the group under [dependency-groups] or check its spelling")
            },
            SprigError::InvalidConstraint { .. } => {
                Some("Use constraints such as '>=2.31, <3', '^2.31', '~=2.31' or '==2.*'")
            },
            SprigError::ResolutionFailure(_) => {
                Some("Relax one of the conflicting constraints listed above")
            },
            SprigError::LockCorrupt { .. } => {
                Some("Delete sprig.lock and run 'sprig lock' to regenerate it")
            },
            SprigError::LockStale { .. } => Some("Run 'sprig lock' to refresh the lock file"),
            SprigError::FetchFailure { .. } => {
                Some("Check your network connection or the configured index and try again")
            },
            SprigError::PackageNotFound { .. } => {
                Some("Check the package name spelling or the configured index")
            },
            _ => None,
        }
    }
}
