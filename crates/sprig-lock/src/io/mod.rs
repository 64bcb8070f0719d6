//! Reading and writing `sprig.lock`

use camino::Utf8Path;
use tracing::{debug, info};

use sprig_config::Manifest;
use sprig_core::error::SprigError;
use sprig_core::utils::atomic_write;

use crate::guard::LockGuard;
use crate::lockfile::LockFile;
use crate::LockResult;

/// Write `lock` to `path`, replacing any previous lock in one rename.
///
/// Holds the [`LockGuard`] of `project_root` for the duration, so callers
/// must not already hold it. The guard stays at the project root even when
/// `lock-file` points into a subdirectory.
pub fn write_lock(project_root: &Utf8Path, path: &Utf8Path, lock: &LockFile) -> LockResult<()> {
    let _guard = LockGuard::acquire(project_root)?;

    atomic_write(path.as_std_path(), lock.render().as_bytes())?;
    info!("Wrote {} ({} packages)", path, lock.packages.len());
    Ok(())
}

/// Read and validate the lock at `path`
pub fn load_lock(path: &Utf8Path) -> LockResult<LockFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;
    debug!("Parsing {}", path);
    LockFile::parse(&content).map_err(|e| match e {
        SprigError::LockCorrupt { message } => {
            SprigError::lock_corrupt(format!("{}: {}", path, message))
        },
        other => other,
    })
}

/// [`load_lock`], with `None` when there is no lock yet
pub fn load_lock_optional(path: &Utf8Path) -> LockResult<Option<LockFile>> {
    if path.exists() {
        load_lock(path).map(Some)
    } else {
        Ok(None)
    }
}

/// The lock at `path`, required to be fresh for `manifest`.
///
/// A missing lock is stale with `found = "missing"`.
pub fn read_lock(path: &Utf8Path, manifest: &Manifest) -> LockResult<LockFile> {
    let Some(lock) = load_lock_optional(path)? else {
        return Err(SprigError::LockStale {
            expected: manifest.input_hash(),
            found: "missing".to_string(),
        });
    };
    lock.check_fresh(manifest)?;
    Ok(lock)
}
