//! Manifest and settings handling for sprig
//!
//! This crate reads `sprig.toml` into a validated [`Manifest`], edits it in
//! place without losing formatting, and layers user settings from defaults,
//! the global config file, the project, the environment and CLI flags.

pub mod edit;
pub mod manifest;
pub mod settings;

// Re-export main types
pub use edit::ManifestEditor;
pub use manifest::{
    load_manifest, parse_manifest, parse_requirement, GroupEntry, Manifest, SourcedRequirement,
};
pub use settings::{ConfigLayering, ConfigLoader, Settings, SettingsOverlay, MANIFEST_FILE};

use sprig_core::error::SprigError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, SprigError>;
