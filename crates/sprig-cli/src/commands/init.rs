//! `sprig init` command implementation.
//!
//! Writes a starter sprig.toml into the current directory.

use sprig_config::{parse_manifest, MANIFEST_FILE};
use sprig_core::error::{SprigError, SprigResult};
use sprig_core::types::PackageName;
use sprig_core::utils::atomic_write;

use super::CommandContext;

/// Execute the `sprig init` command
pub async fn execute(name: Option<String>, ctx: &CommandContext) -> SprigResult<()> {
    let manifest_path = ctx.cwd.join(MANIFEST_FILE);
    if manifest_path.exists() {
        ctx.output
            .info(&format!("{} already exists, skipping initialization", MANIFEST_FILE));
        return Ok(());
    }

    let raw_name = match name {
        Some(name) => name,
        None => ctx.cwd.file_name().unwrap_or("project").to_string(),
    };
    let name = PackageName::new(&raw_name).map_err(|e| SprigError::ConfigValidation {
        field: "name".to_string(),
        reason: e.to_string(),
    })?;

    let content = starter_manifest(&name);
    // Never write something we could not read back
    parse_manifest(&content)?;
    atomic_write(manifest_path.as_std_path(), content.as_bytes())?;

    ctx.output.success(&format!("Created {} for '{}'", MANIFEST_FILE, name));
    ctx.output.info("Next steps:");
    ctx.output.info("  sprig add <requirement>");
    ctx.output.info("  sprig install");
    Ok(())
}

fn starter_manifest(name: &PackageName) -> String {
    format!(
        r#"[project]
name = "{name}"
version = "0.1.0"
requires-python = ">=3.9"
dependencies = []

[dependency-groups]
dev = []
"#
    )
}
