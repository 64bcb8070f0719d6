//! # sprig
//!
//! Lockfile-based dependency resolver and environment manager.
//!
//! This is the entry point of the `sprig` binary. It parses the command
//! line, sets up logging, runs the command on a Tokio runtime and turns any
//! error into a formatted message and its exit code.

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sprig_core::error::{SprigError, SprigResult};

mod commands;
mod output;

use commands::CommandContext;
use output::ErrorFormatter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("SPRIG_BUILD_DATE"),
    " with ",
    env!("SPRIG_RUSTC_VERSION"),
    ")"
);

/// Resolve, lock and install Python project dependencies
#[derive(Parser)]
#[command(name = "sprig", version, long_version = LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Package index URL, or path to a JSON index file
    #[arg(long, global = true, value_name = "URL|PATH")]
    pub index: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create sprig.toml in the current directory
    Init {
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Add a requirement and relock
    Add {
        /// Requirement such as `requests` or `requests>=2.31,<3`
        requirement: String,
        /// Dependency group to add to
        #[arg(long, short)]
        group: Option<String>,
    },
    /// Remove a requirement and relock
    Remove {
        /// Package name
        name: String,
        /// Dependency group to remove from
        #[arg(long, short)]
        group: Option<String>,
    },
    /// Resolve every group and write the lock file
    Lock {
        /// Fail if the lock is missing or stale instead of writing it
        #[arg(long)]
        check: bool,
    },
    /// Relock, allowing the named packages (or all) to change version
    Update {
        /// Packages to update; all when none are given
        names: Vec<String>,
    },
    /// Install locked packages for the selected groups
    Install(InstallArgs),
    /// Like install, but also remove packages that are not locked
    Sync(InstallArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Require an up-to-date lock file and never resolve
    #[arg(long)]
    pub locked: bool,
    /// Dependency groups to install (default: the default group)
    #[arg(long = "group", short, value_name = "GROUP")]
    pub groups: Vec<String>,
    /// Install every dependency group
    #[arg(long, conflicts_with = "groups")]
    pub all_groups: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting sprig v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", ErrorFormatter::new().format_error(&err));
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        },
    }
}

fn run_cli(cli: Cli) -> SprigResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| SprigError::io("Failed to create async runtime".to_string(), e))?;

    rt.block_on(async {
        let ctx = CommandContext::new(cli.index)?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

/// `RUST_LOG` wins when set; otherwise warnings, or debug for sprig with `-v`
fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,sprig=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("sprig encountered an unexpected error: {}", panic_info);
        eprintln!("sprig crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
