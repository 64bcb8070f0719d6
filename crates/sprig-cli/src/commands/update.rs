//! `sprig update` command implementation.
//!
//! Relocks without the lock's preference for the named packages, so they
//! move to the newest acceptable versions while everything else stays put.

use sprig_core::error::{SprigError, SprigResult};
use sprig_core::types::PackageName;
use sprig_lock::write_lock;

use super::{report_changes, CommandContext, Project};

/// Execute the `sprig update` command
pub async fn execute(names: Vec<String>, ctx: &CommandContext) -> SprigResult<()> {
    let project = Project::load(ctx).await?;
    let previous = project.previous_lock(ctx)?;

    let mut preferences = previous
        .as_ref()
        .map(|lock| lock.preferences())
        .unwrap_or_default();
    if names.is_empty() {
        preferences.clear();
    }
    for raw in &names {
        let name = PackageName::new(raw)
            .ok()
            .filter(|name| preferences.contains_key(name))
            .ok_or_else(|| SprigError::PackageNotFound { name: raw.clone() })?;
        preferences.remove(&name);
    }

    let lock = project
        .compute_lock(&project.manifest, preferences, ctx)
        .await?;
    write_lock(&project.root, &project.lock_path(), &lock)?;

    match previous.as_ref().map(|old| old.diff(&lock)) {
        Some(changes) if changes.is_empty() => {
            ctx.output.success("Everything is already up to date");
        },
        _ => {
            report_changes(ctx, previous.as_ref(), &lock);
            ctx.output
                .success(&format!("Locked {} packages", lock.packages.len()));
        },
    }
    Ok(())
}
