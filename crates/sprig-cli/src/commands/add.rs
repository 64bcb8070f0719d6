//! `sprig add` command implementation.
//!
//! Adds a requirement to a group and relocks. An unconstrained requirement
//! is written back as `>=` the version it resolved to. Nothing is written
//! unless resolution succeeds.

use sprig_config::{parse_manifest, parse_requirement, Manifest, ManifestEditor};
use sprig_core::error::{SprigError, SprigResult};
use sprig_core::types::{GroupName, Requirement, VersionReq};
use sprig_core::utils::atomic_write;
use sprig_lock::write_lock;

use super::{report_changes, CommandContext, Project};

/// Execute the `sprig add` command
pub async fn execute(requirement: String, group: Option<String>, ctx: &CommandContext) -> SprigResult<()> {
    let project = Project::load(ctx).await?;
    let requirement = parse_requirement(&requirement)?;
    let group = match group {
        Some(raw) => GroupName::new(&raw).map_err(|_| SprigError::UnknownGroup {
            group: raw.clone(),
            referenced_by: None,
        })?,
        None => GroupName::default_group(),
    };

    let original = tokio::fs::read_to_string(&project.manifest_path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", project.manifest_path), e))?;
    let mut editor = ManifestEditor::parse(&original)?;
    let (mut content, manifest) = edited(&mut editor, &group, &requirement)?;

    let previous = project.previous_lock(ctx)?;
    let preferences = previous
        .as_ref()
        .map(|lock| lock.preferences())
        .unwrap_or_default();
    let mut lock = project.compute_lock(&manifest, preferences, ctx).await?;
    let mut written = requirement.clone();

    if requirement.is_unconstrained() {
        if let Some(locked) = lock.get(&requirement.name) {
            written = Requirement::new(
                requirement.name.clone(),
                VersionReq::at_least(&locked.version),
            );
            let (pinned_content, pinned) = edited(&mut editor, &group, &written)?;
            // Same versions as before: the lower bound only restates them
            lock = project
                .compute_lock(&pinned, lock.preferences(), ctx)
                .await?;
            content = pinned_content;
        }
    }

    atomic_write(project.manifest_path.as_std_path(), content.as_bytes())?;
    write_lock(&project.root, &project.lock_path(), &lock)?;

    report_changes(ctx, previous.as_ref(), &lock);
    ctx.output.success(&format!("Added {} to group '{}'", written, group));
    Ok(())
}

/// Apply the edit and re-read the result as a manifest
fn edited(
    editor: &mut ManifestEditor,
    group: &GroupName,
    requirement: &Requirement,
) -> SprigResult<(String, Manifest)> {
    editor.add_requirement(group, requirement)?;
    let content = editor.to_string();
    let manifest = parse_manifest(&content)?;
    Ok((content, manifest))
}
