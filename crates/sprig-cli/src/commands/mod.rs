//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking a [`CommandContext`]. The
//! pieces several commands share live here: loading the project, fetching
//! the index closure, and computing a fresh lock.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use sprig_config::{load_manifest, ConfigLayering, ConfigLoader, Manifest, Settings, SettingsOverlay};
use sprig_core::error::{SprigError, SprigResult};
use sprig_core::types::{PackageName, Version};
use sprig_lock::{load_lock_optional, LockChange, LockFile};
use sprig_registry::{
    AuthConfig, MemoryIndex, MetadataSource, PrefetchReport, Prefetcher, RegistryClient,
    RetryConfig,
};
use sprig_resolver::{ResolveOptions, Resolver};

pub mod add;
pub mod init;
pub mod install;
pub mod lock;
pub mod remove;
pub mod update;


use crate::{output::OutputHandler, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub output: OutputHandler,
    /// Settings given on the command line
    pub overrides: SettingsOverlay,
    /// `SPRIG_*` environment variables
    pub env: HashMap<String, String>,
    /// Whether to read the user's global config file
    pub use_global_config: bool,
}

impl CommandContext {
    pub fn new(index: Option<String>) -> SprigResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| SprigError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
            SprigError::io(
                format!("Current directory {} is not valid UTF-8", path.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidData),
            )
        })?;

        Ok(Self {
            cwd,
            output: OutputHandler::new(),
            overrides: SettingsOverlay {
                index,
                ..Default::default()
            },
            env: ConfigLayering::collect_env_overrides(),
            use_global_config: true,
        })
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> SprigResult<()> {
    match command {
        Commands::Init { name } => {
            info!("Initializing project in {}", ctx.cwd);
            init::execute(name, ctx).await
        },
        Commands::Add { requirement, group } => {
            info!("Adding requirement: {} (group: {:?})", requirement, group);
            add::execute(requirement, group, ctx).await
        },
        Commands::Remove { name, group } => {
            info!("Removing requirement: {} (group: {:?})", name, group);
            remove::execute(name, group, ctx).await
        },
        Commands::Lock { check } => {
            info!("Locking (check: {})", check);
            lock::execute(check, ctx).await
        },
        Commands::Update { names } => {
            info!("Updating {:?}", names);
            update::execute(names, ctx).await
        },
        Commands::Install(args) => {
            info!("Installing (locked: {})", args.locked);
            install::execute(args, false, ctx).await
        },
        Commands::Sync(args) => {
            info!("Syncing (locked: {})", args.locked);
            install::execute(args, true, ctx).await
        },
    }
}

/// A loaded project: manifest plus effective settings
pub struct Project {
    pub root: Utf8PathBuf,
    pub manifest_path: Utf8PathBuf,
    pub manifest: Manifest,
    pub settings: Settings,
}

impl Project {
    /// Find and load the manifest, then layer settings on top of it
    pub async fn load(ctx: &CommandContext) -> SprigResult<Self> {
        let loader = ConfigLoader::new(ctx.cwd.clone());
        let manifest_path = loader.resolve_manifest_path()?;
        let manifest = load_manifest(&manifest_path).await?;

        let global = if ctx.use_global_config {
            loader.load_global_settings().await?
        } else {
            None
        };
        let settings = ConfigLayering::new()
            .with_global(global)
            .with_project(Some(manifest.settings.clone()))
            .with_env(ctx.env.clone())
            .with_cli(ctx.overrides.clone())
            .merge()?;

        let root = manifest_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| ctx.cwd.clone());

        Ok(Self {
            root,
            manifest_path,
            manifest,
            settings,
        })
    }

    pub fn lock_path(&self) -> Utf8PathBuf {
        self.root.join(&self.settings.lock_file)
    }

    pub fn environment_path(&self) -> Utf8PathBuf {
        sprig_env::environment_path(&self.root)
    }

    /// The current lock if it can be read, for its preferences.
    ///
    /// A corrupt lock is ignored with a warning since it is about to be
    /// replaced.
    pub fn previous_lock(&self, ctx: &CommandContext) -> SprigResult<Option<LockFile>> {
        match load_lock_optional(&self.lock_path()) {
            Ok(lock) => Ok(lock),
            Err(err @ SprigError::LockCorrupt { .. }) => {
                ctx.output.warn(&format!("{}; ignoring it", err));
                Ok(None)
            },
            Err(err) => Err(err),
        }
    }

    /// Resolve every group of `manifest` and build its lock
    pub async fn compute_lock(
        &self,
        manifest: &Manifest,
        preferences: BTreeMap<PackageName, Version>,
        ctx: &CommandContext,
    ) -> SprigResult<LockFile> {
        let groups = manifest.all_groups();
        let roots: Vec<PackageName> = manifest
            .requirements_for(&groups)
            .into_iter()
            .map(|sourced| sourced.requirement.name)
            .collect();

        ctx.output.step("Fetching package metadata");
        let index = self.fetch_index(&roots).await?;

        ctx.output.step("Resolving dependencies");
        let options = ResolveOptions::default()
            .with_prereleases(self.settings.allow_prereleases)
            .with_preferences(preferences);
        let (resolution, stats) = Resolver::new(&index)
            .with_options(options)
            .resolve_with_stats(manifest, &groups)?;
        ctx.output.info(&format!(
            "Resolved {} packages ({} decisions, {} backtracks)",
            resolution.len(),
            stats.decisions,
            stats.backtracks
        ));

        Ok(LockFile::from_resolution(manifest, &resolution))
    }

    /// Index holding the dependency closure of `roots`
    pub async fn fetch_index(&self, roots: &[PackageName]) -> SprigResult<MemoryIndex> {
        let report = if is_remote(&self.settings.index) {
            let client =
                RegistryClient::with_auth(&self.settings.index, AuthConfig::from_env())?;
            prefetch(Arc::new(client), &self.settings, roots).await?
        } else {
            let path = self.root.join(&self.settings.index);
            let local = MemoryIndex::load(&path).await?;
            prefetch(Arc::new(local), &self.settings, roots).await?
        };

        for root in roots {
            if let Some(failure) = report.failed_packages.get(root) {
                if failure.not_found {
                    return Err(SprigError::PackageNotFound {
                        name: root.to_string(),
                    });
                }
                return Err(SprigError::fetch_message(format!(
                    "{}: {}",
                    root, failure.message
                )));
            }
        }
        for ((name, version), failure) in &report.failed_versions {
            warn!("Excluding {} {}: {}", name, version, failure.message);
        }
        Ok(report.index)
    }
}

/// Run the prefetcher, cancelling it on Ctrl-C
async fn prefetch<S: MetadataSource>(
    source: Arc<S>,
    settings: &Settings,
    roots: &[PackageName],
) -> SprigResult<PrefetchReport> {
    let prefetcher = Prefetcher::new(source)
        .with_retry(RetryConfig::with_max_retries(settings.max_retries))
        .with_concurrency(settings.concurrency);

    let handle = prefetcher.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let result = prefetcher.prefetch(roots.iter().cloned()).await;
    interrupt.abort();
    result
}

fn is_remote(index: &str) -> bool {
    index.starts_with("http://") || index.starts_with("https://")
}

/// Print what changed between two locks
pub fn report_changes(ctx: &CommandContext, old: Option<&LockFile>, new: &LockFile) {
    let changes = match old {
        Some(old) => old.diff(new),
        None => new
            .packages
            .iter()
            .map(|package| LockChange::Added {
                name: package.name.clone(),
                version: package.version.clone(),
            })
            .collect(),
    };
    for change in &changes {
        let marker = match change {
            LockChange::Added { .. } => '+',
            LockChange::Removed { .. } => '-',
            LockChange::Updated { .. } => '~',
        };
        ctx.output.change(&format!("{} {}", marker, change));
    }
}
