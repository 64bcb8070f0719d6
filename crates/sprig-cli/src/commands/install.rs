//! `sprig install` and `sprig sync` command implementation.
//!
//! Both bring the recorded environment in line with the lock for the
//! selected groups; `sync` also removes packages the lock does not select.

use sprig_core::error::{SprigError, SprigResult};
use sprig_env::{EnvironmentState, InstallPlan};
use sprig_lock::{read_lock, write_lock, LockFile};

use super::{report_changes, CommandContext, Project};
use crate::InstallArgs;

/// Execute `sprig install` (`exact == false`) or `sprig sync` (`exact == true`)
pub async fn execute(args: InstallArgs, exact: bool, ctx: &CommandContext) -> SprigResult<()> {
    let project = Project::load(ctx).await?;
    let groups = if args.all_groups {
        project.manifest.all_groups()
    } else {
        project.manifest.select_groups(&args.groups)?
    };

    let lock = if args.locked {
        read_lock(&project.lock_path(), &project.manifest)?
    } else {
        current_lock(&project, ctx).await?
    };

    let resolution = lock.to_resolution();
    let environment_path = project.environment_path();
    let mut state = EnvironmentState::load(&environment_path)?;
    let plan = InstallPlan::for_resolution(&state, &resolution, &groups, exact);

    if plan.is_noop() {
        ctx.output.success("Environment is up to date");
        return Ok(());
    }

    ctx.output.step("Applying changes");
    for action in plan.changes() {
        ctx.output.change(&action.to_string());
    }
    state.apply(&plan);
    state.save(&environment_path)?;

    ctx.output.success(&plan.summary().to_string());
    Ok(())
}

/// The lock if fresh, otherwise a regenerated and written one
async fn current_lock(project: &Project, ctx: &CommandContext) -> SprigResult<LockFile> {
    match read_lock(&project.lock_path(), &project.manifest) {
        Ok(lock) => Ok(lock),
        Err(SprigError::LockStale { .. } | SprigError::LockCorrupt { .. }) => {
            ctx.output.step("Lock file is out of date, relocking");
            let previous = project.previous_lock(ctx)?;
            let preferences = previous
                .as_ref()
                .map(|lock| lock.preferences())
                .unwrap_or_default();
            let lock = project
                .compute_lock(&project.manifest, preferences, ctx)
                .await?;
            write_lock(&project.root, &project.lock_path(), &lock)?;
            report_changes(ctx, previous.as_ref(), &lock);
            Ok(lock)
        },
        Err(err) => Err(err),
    }
}
