//! `sprig remove` command implementation.

use sprig_config::{parse_manifest, ManifestEditor};
use sprig_core::error::{SprigError, SprigResult};
use sprig_core::types::{GroupName, PackageName};
use sprig_core::utils::atomic_write;
use sprig_lock::write_lock;

use super::{report_changes, CommandContext, Project};

/// Execute the `sprig remove` command
pub async fn execute(name: String, group: Option<String>, ctx: &CommandContext) -> SprigResult<()> {
    let project = Project::load(ctx).await?;
    let group = match group {
        Some(raw) => project
            .manifest
            .select_groups(std::slice::from_ref(&raw))?
            .into_iter()
            .next()
            .unwrap_or_else(GroupName::default_group),
        None => GroupName::default_group(),
    };
    let not_found = || SprigError::PackageNotFound { name: name.clone() };
    let package = PackageName::new(&name).map_err(|_| not_found())?;

    let original = tokio::fs::read_to_string(&project.manifest_path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", project.manifest_path), e))?;
    let mut editor = ManifestEditor::parse(&original)?;
    if !editor.remove_requirement(&group, &package)? {
        return Err(not_found());
    }
    let content = editor.to_string();
    let manifest = parse_manifest(&content)?;

    let previous = project.previous_lock(ctx)?;
    let preferences = previous
        .as_ref()
        .map(|lock| lock.preferences())
        .unwrap_or_default();
    let lock = project.compute_lock(&manifest, preferences, ctx).await?;

    atomic_write(project.manifest_path.as_std_path(), content.as_bytes())?;
    write_lock(&project.root, &project.lock_path(), &lock)?;

    report_changes(ctx, previous.as_ref(), &lock);
    ctx.output
        .success(&format!("Removed {} from group '{}'", package, group));
    Ok(())
}
