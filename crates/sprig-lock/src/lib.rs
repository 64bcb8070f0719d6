//! Lock files for sprig
//!
//! A lock records one resolution of every dependency group together with
//! the manifest hash it was computed from. It is always regenerated in full
//! and replaced atomically; readers reject anything structurally wrong as
//! corrupt and anything computed from a different manifest as stale.

pub mod guard;
pub mod io;
pub mod lockfile;

// Re-export main types
pub use guard::{guard_path, LockGuard};
pub use io::{load_lock, load_lock_optional, read_lock, write_lock};
pub use lockfile::{LockChange, LockFile, LockedPackage, LOCK_HEADER, LOCK_VERSION};

use sprig_core::error::SprigError;

/// Result type for lock operations
pub type LockResult<T> = Result<T, SprigError>;
