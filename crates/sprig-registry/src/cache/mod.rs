//! Version-list caching with TTL support
//!
//! Besides the parsed versions, an entry remembers how the index spelled
//! each one (`3.6`, `2.0rc1`), since per-version documents live under that
//! spelling rather than the canonical rendering.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use sprig_core::types::{PackageName, Version};

/// Default time-to-live of a cached version list
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Parsed version -> spelling listed by the index
    pub versions: BTreeMap<Version, String>,
    /// When the entry was stored
    pub stored_at: SystemTime,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create new cache entry with default TTL (1 hour)
    pub fn new(versions: BTreeMap<Version, String>) -> Self {
        Self {
            versions,
            stored_at: SystemTime::now(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Check if cache entry is still fresh
    pub fn is_fresh(&self) -> bool {
        match self.stored_at.elapsed() {
            Ok(elapsed) => elapsed < self.ttl,
            Err(_) => false, // Clock went backwards, consider stale
        }
    }
}

/// In-memory version-list cache shared by concurrent fetches
#[derive(Debug, Default)]
pub struct MetadataCache {
    cache: DashMap<PackageName, CacheEntry>,
}

impl MetadataCache {
    /// Create new metadata cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached versions of `name`, ascending, if fresh
    pub fn get(&self, name: &PackageName) -> Option<Vec<Version>> {
        self.fresh(name, |entry| entry.versions.keys().cloned().collect())
    }

    /// The spelling `version` of `name` was listed under, if cached and fresh
    pub fn spelling(&self, name: &PackageName, version: &Version) -> Option<String> {
        self.fresh(name, |entry| entry.versions.get(version).cloned())
            .flatten()
    }

    /// Store a listing with the default TTL
    pub fn insert(&self, name: PackageName, versions: BTreeMap<Version, String>) {
        self.cache.insert(name, CacheEntry::new(versions));
    }

    fn fresh<T>(&self, name: &PackageName, read: impl FnOnce(&CacheEntry) -> T) -> Option<T> {
        let fresh = self
            .cache
            .get(name)
            .map(|entry| entry.is_fresh().then(|| read(entry.value())));

        match fresh {
            Some(Some(value)) => Some(value),
            Some(None) => {
                // Read guard is already dropped here
                self.cache.remove(name);
                None
            },
            None => None,
        }
    }
}

#[cfg(test)]
mod tests;
