//! Package index access for sprig
//!
//! This crate provides the read-only [`PackageIndex`] contract the resolver
//! queries, an in-memory implementation loadable from a JSON index file, an
//! HTTP client for remote indexes with a TTL cache, and a [`Prefetcher`]
//! that fills a [`MemoryIndex`] concurrently before resolution starts.

pub mod api;
pub mod cache;
pub mod client;
pub mod index;
pub mod prefetch;
pub mod retry;

// Re-export main types
pub use api::{IndexFile, VersionListResponse, VersionMetadata};
pub use cache::{CacheEntry, MetadataCache};
pub use client::{AuthConfig, RegistryClient};
pub use index::{MemoryIndex, MetadataSource, PackageIndex};
pub use prefetch::{CancelHandle, FailedFetch, PrefetchReport, Prefetcher};
pub use retry::{retry_with_backoff, RetryConfig};

use sprig_core::error::SprigError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, SprigError>;
