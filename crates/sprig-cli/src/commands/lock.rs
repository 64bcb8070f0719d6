//! `sprig lock` command implementation.

use sprig_core::error::SprigResult;
use sprig_lock::{read_lock, write_lock};

use super::{report_changes, CommandContext, Project};

/// Execute the `sprig lock` command.
///
/// With `check`, only verifies the lock: a missing or stale lock fails with
/// `LockStale` and nothing is written.
pub async fn execute(check: bool, ctx: &CommandContext) -> SprigResult<()> {
    let project = Project::load(ctx).await?;
    let lock_path = project.lock_path();

    if check {
        let lock = read_lock(&lock_path, &project.manifest)?;
        ctx.output.success(&format!(
            "{} is up to date ({} packages)",
            lock_path,
            lock.packages.len()
        ));
        return Ok(());
    }

    let previous = project.previous_lock(ctx)?;
    let preferences = previous
        .as_ref()
        .map(|lock| lock.preferences())
        .unwrap_or_default();
    let lock = project
        .compute_lock(&project.manifest, preferences, ctx)
        .await?;

    if previous.as_ref() == Some(&lock) {
        ctx.output.success(&format!("{} is up to date", lock_path));
        return Ok(());
    }
    write_lock(&project.root, &lock_path, &lock)?;

    report_changes(ctx, previous.as_ref(), &lock);
    ctx.output
        .success(&format!("Locked {} packages", lock.packages.len()));
    Ok(())
}
