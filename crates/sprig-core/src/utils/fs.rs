//! Crash-safe file replacement.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{SprigError, SprigResult};

/// Replace `path` with `contents` in one rename.
///
/// The data is written to a temporary file in the same directory, flushed to
/// disk, and then persisted over the target, so readers observe either the
/// old file or the new one.
pub fn atomic_write(path: &Path, contents: &[u8]) -> SprigResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| SprigError::io(format!("Failed to create {}", dir.display()), e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        SprigError::io(
            format!("Failed to create temporary file in {}", dir.display()),
            e,
        )
    })?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| SprigError::io(format!("Failed to write {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| SprigError::io(format!("Failed to replace {}", path.display()), e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("sprig.lock");

        atomic_write(&target, b"first").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "first");

        atomic_write(&target, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");

        // No temporary files left next to the target
        let entries: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
