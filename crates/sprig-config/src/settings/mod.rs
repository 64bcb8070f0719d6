//! Settings layering, manifest discovery, and environment overrides

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use sprig_core::error::SprigError;

use crate::ConfigResult;

/// Manifest file name searched for from the working directory upwards
pub const MANIFEST_FILE: &str = "sprig.toml";

/// Default package index
pub const DEFAULT_INDEX: &str = "https://index.sprig.dev/json";

/// Effective settings after layering
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Index URL, or path to a JSON index file
    pub index: String,
    /// Retries per metadata request after the first attempt
    pub max_retries: u32,
    /// Maximum concurrent metadata requests
    pub concurrency: usize,
    /// Consider pre-releases for every package
    pub allow_prereleases: bool,
    /// Lock file name relative to the project root
    pub lock_file: String,
}

/// One settings layer; unset fields fall through to lower layers
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingsOverlay {
    pub index: Option<String>,
    pub max_retries: Option<u32>,
    pub concurrency: Option<usize>,
    pub allow_prereleases: Option<bool>,
    pub lock_file: Option<String>,
}

/// Finds the project manifest and the global config file
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

/// Settings layering and merging
pub struct ConfigLayering {
    global: Option<SettingsOverlay>,
    project: Option<SettingsOverlay>,
    env_overrides: HashMap<String, String>,
    cli_overrides: SettingsOverlay,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            max_retries: 3,
            concurrency: 16,
            allow_prereleases: false,
            lock_file: "sprig.lock".to_string(),
        }
    }
}

impl Settings {
    /// Check values that would break the fetch or write path
    pub fn validate(&self) -> ConfigResult<()> {
        if self.index.trim().is_empty() {
            return Err(invalid("index", "index cannot be empty"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.max_retries > 10 {
            return Err(invalid("max-retries", "must be at most 10"));
        }
        if self.lock_file.trim().is_empty() || self.lock_file.contains(['/', '\\']) {
            return Err(invalid("lock-file", "must be a plain file name"));
        }
        Ok(())
    }
}

impl SettingsOverlay {
    /// Apply every set field on top of `settings`
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(index) = &self.index {
            settings.index = index.clone();
        }
        if let Some(max_retries) = self.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(allow_prereleases) = self.allow_prereleases {
            settings.allow_prereleases = allow_prereleases;
        }
        if let Some(lock_file) = &self.lock_file {
            settings.lock_file = lock_file.clone();
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }

    /// Find sprig.toml (walks up directory tree)
    pub fn find_manifest(&self) -> Option<Utf8PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(MANIFEST_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Locate sprig.toml or fail with a pointer to `sprig init`
    pub fn resolve_manifest_path(&self) -> ConfigResult<Utf8PathBuf> {
        self.find_manifest().ok_or_else(|| {
            SprigError::io(
                format!(
                    "No {} found in {} or any parent directory (run 'sprig init')",
                    MANIFEST_FILE, self.cwd
                ),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })
    }

    /// `<config_dir>/sprig/config.toml`
    pub fn global_config_path() -> Option<Utf8PathBuf> {
        let config_dir = dirs::config_dir()?;
        Utf8PathBuf::try_from(config_dir)
            .ok()
            .map(|dir| dir.join("sprig").join("config.toml"))
    }

    /// Load the global settings layer, if the file exists
    pub async fn load_global_settings(&self) -> ConfigResult<Option<SettingsOverlay>> {
        match Self::global_config_path() {
            Some(path) if path.is_file() => load_overlay(&path).await.map(Some),
            _ => Ok(None),
        }
    }
}

/// Parse a standalone settings file
pub async fn load_overlay(path: &Utf8Path) -> ConfigResult<SettingsOverlay> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;
    toml::from_str(&content).map_err(|e| SprigError::ConfigValidation {
        field: path.to_string(),
        reason: e.message().to_string(),
    })
}

impl ConfigLayering {
    /// Create a new layering with only defaults
    pub fn new() -> Self {
        Self {
            global: None,
            project: None,
            env_overrides: HashMap::new(),
            cli_overrides: SettingsOverlay::default(),
        }
    }

    pub fn with_global(mut self, global: Option<SettingsOverlay>) -> Self {
        self.global = global;
        self
    }

    pub fn with_project(mut self, project: Option<SettingsOverlay>) -> Self {
        self.project = project;
        self
    }

    pub fn with_env(mut self, env_overrides: HashMap<String, String>) -> Self {
        self.env_overrides = env_overrides;
        self
    }

    pub fn with_cli(mut self, cli_overrides: SettingsOverlay) -> Self {
        self.cli_overrides = cli_overrides;
        self
    }

    /// Merge layers: defaults, global, project, environment, CLI
    pub fn merge(&self) -> ConfigResult<Settings> {
        let mut settings = Settings::default();

        if let Some(global) = &self.global {
            global.apply(&mut settings);
        }
        if let Some(project) = &self.project {
            project.apply(&mut settings);
        }
        Self::env_overlay(&self.env_overrides)?.apply(&mut settings);
        self.cli_overrides.apply(&mut settings);

        settings.validate()?;
        debug!(
            index = %settings.index,
            concurrency = settings.concurrency,
            max_retries = settings.max_retries,
            "effective settings"
        );
        Ok(settings)
    }

    /// Translate `SPRIG_*` variables into a settings layer
    fn env_overlay(overrides: &HashMap<String, String>) -> ConfigResult<SettingsOverlay> {
        let mut overlay = SettingsOverlay::default();

        for (key, value) in overrides {
            match key.as_str() {
                "SPRIG_INDEX" => overlay.index = Some(value.clone()),
                "SPRIG_MAX_RETRIES" => {
                    overlay.max_retries = Some(value.trim().parse().map_err(|e| {
                        invalid(key, &format!("expected a non-negative integer: {}", e))
                    })?);
                },
                "SPRIG_CONCURRENCY" => {
                    overlay.concurrency = Some(value.trim().parse().map_err(|e| {
                        invalid(key, &format!("expected a positive integer: {}", e))
                    })?);
                },
                "SPRIG_ALLOW_PRERELEASES" => {
                    overlay.allow_prereleases = Some(parse_flag(key, value)?);
                },
                "SPRIG_LOCK_FILE" => overlay.lock_file = Some(value.clone()),
                _ => {
                    // Unknown environment variable, ignore
                },
            }
        }

        Ok(overlay)
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with("SPRIG_"))
            .collect()
    }
}

impl Default for ConfigLayering {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(invalid(key, &format!("expected a boolean, got '{}'", other))),
    }
}

fn invalid(field: &str, reason: &str) -> SprigError {
    SprigError::ConfigValidation {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
