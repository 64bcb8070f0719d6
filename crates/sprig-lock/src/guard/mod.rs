//! Advisory lock serialising writers of one project's lock file
//!
//! The guard is an exclusive `flock` on `.sprig/lock.guard`, released when
//! the guard is dropped. A second writer in another process waits (or, via
//! [`LockGuard::try_acquire`], backs off) instead of racing the rename.

use camino::{Utf8Path, Utf8PathBuf};
use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use tracing::debug;

use sprig_core::error::SprigError;

use crate::LockResult;

/// Held exclusive lock on a project's guard file
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
}

impl LockGuard {
    /// Block until the guard for `project_dir` is ours
    pub fn acquire(project_dir: &Utf8Path) -> LockResult<Self> {
        let (path, file) = open_guard(project_dir)?;
        debug!("Waiting for {}", path);
        file.lock_exclusive()
            .map_err(|e| SprigError::io(format!("Failed to lock {}", path), e))?;
        Ok(Self { _file: file })
    }

    /// Take the guard if nobody holds it
    pub fn try_acquire(project_dir: &Utf8Path) -> LockResult<Option<Self>> {
        let (path, file) = open_guard(project_dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            #[cfg(windows)]
            Err(err) if matches!(err.raw_os_error(), Some(32 | 33)) => Ok(None),
            Err(err) => Err(SprigError::io(format!("Failed to lock {}", path), err)),
        }
    }
}

/// `<project>/.sprig/lock.guard`
pub fn guard_path(project_dir: &Utf8Path) -> Utf8PathBuf {
    project_dir.join(".sprig").join("lock.guard")
}

fn open_guard(project_dir: &Utf8Path) -> LockResult<(Utf8PathBuf, File)> {
    let path = guard_path(project_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| SprigError::io(format!("Failed to create {}", parent), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .map_err(|e| SprigError::io(format!("Failed to open {}", path), e))?;
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_guard_is_exclusive_until_dropped() {
        let (_dir, root) = project();

        let held = LockGuard::try_acquire(&root).unwrap();
        assert!(held.is_some());
        assert!(guard_path(&root).exists());

        // A second handle (as another process would have) is refused
        assert!(LockGuard::try_acquire(&root).unwrap().is_none());

        drop(held);
        assert!(LockGuard::try_acquire(&root).unwrap().is_some());
    }

    #[test]
    fn test_acquire_waits_for_release() {
        let (_dir, root) = project();
        let held = LockGuard::acquire(&root).unwrap();

        let waiter_root = root.clone();
        let waiter = std::thread::spawn(move || LockGuard::acquire(&waiter_root).map(|_| ()));

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!waiter.is_finished());

        drop(held);
        waiter.join().unwrap().unwrap();
    }
}
