//! Utility functions and helpers.
//!
//! Common functionality used across multiple sprig crates.

pub mod fs;
pub mod hash;

// Re-export commonly used utilities
pub use fs::atomic_write;
pub use hash::{blake3_hash, Fingerprint};
