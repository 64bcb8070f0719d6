//! Concurrent metadata prefetch
//!
//! Walks the dependency closure of the root requirements and fetches every
//! version's metadata as an independent task. Tasks share nothing mutable:
//! each returns its own result, and the coordinator merges results into a
//! [`MemoryIndex`] that the resolver then queries synchronously.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use sprig_core::error::SprigError;
use sprig_core::types::{PackageMetadata, PackageName, Version};

use crate::index::{MemoryIndex, MetadataSource};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::RegistryResult;

/// A fetch that failed after retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFetch {
    pub message: String,
    /// The index reported the package (or version) does not exist
    pub not_found: bool,
}

/// Outcome of a prefetch run
#[derive(Debug, Default)]
pub struct PrefetchReport {
    /// Everything fetched successfully
    pub index: MemoryIndex,
    /// Packages whose version list could not be fetched
    pub failed_packages: BTreeMap<PackageName, FailedFetch>,
    /// Versions excluded because their metadata could not be fetched
    pub failed_versions: BTreeMap<(PackageName, Version), FailedFetch>,
    /// Requests issued, retries included
    pub requests: usize,
}

/// Stops an in-flight prefetch
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Fills a [`MemoryIndex`] from a [`MetadataSource`] with bounded concurrency
pub struct Prefetcher<S: MetadataSource> {
    source: Arc<S>,
    retry: RetryConfig,
    concurrency: usize,
    cancel: CancelHandle,
    requests: Arc<AtomicUsize>,
}

enum FetchOutcome {
    Versions {
        name: PackageName,
        result: RegistryResult<Vec<Version>>,
    },
    Metadata {
        name: PackageName,
        version: Version,
        result: RegistryResult<PackageMetadata>,
    },
}

impl<S: MetadataSource> Prefetcher<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            retry: RetryConfig::default(),
            concurrency: 16,
            cancel: CancelHandle::default(),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Maximum requests in flight (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Handle that cancels this prefetcher from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fetch the closure of `roots`.
    ///
    /// Permanent failures are recorded in the report rather than returned;
    /// only cancellation (or a panicked task) fails the whole prefetch.
    pub async fn prefetch(
        &self,
        roots: impl IntoIterator<Item = PackageName>,
    ) -> RegistryResult<PrefetchReport> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut seen = BTreeSet::new();
        let mut report = PrefetchReport::default();

        for root in roots {
            if seen.insert(root.clone()) {
                self.spawn_versions(&mut tasks, &semaphore, root);
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&mut tasks));
            }

            let joined = tokio::select! {
                biased;
                _ = self.cancel.notify.notified() => continue,
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            let outcome = joined
                .map_err(|e| SprigError::fetch("metadata task failed".to_string(), e))?;

            match outcome {
                FetchOutcome::Versions { name, result } => match result {
                    Ok(versions) => {
                        debug!(package = %name, versions = versions.len(), "fetched version list");
                        report.index.mark_known(name.clone());
                        for version in versions {
                            self.spawn_metadata(&mut tasks, &semaphore, name.clone(), version);
                        }
                    },
                    Err(error) => {
                        warn!(package = %name, error = %error, "could not list versions");
                        report.failed_packages.insert(name, failed(&error));
                    },
                },
                FetchOutcome::Metadata {
                    name,
                    version,
                    result,
                } => match result {
                    Ok(metadata) => {
                        for dependency in &metadata.dependencies {
                            if seen.insert(dependency.name.clone()) {
                                self.spawn_versions(&mut tasks, &semaphore, dependency.name.clone());
                            }
                        }
                        report.index.insert(metadata);
                    },
                    Err(error) => {
                        warn!(
                            package = %name,
                            version = %version,
                            error = %error,
                            "excluding version whose metadata could not be fetched"
                        );
                        report.failed_versions.insert((name, version), failed(&error));
                    },
                },
            }
        }

        report.requests = self.requests.load(Ordering::SeqCst);
        info!(
            packages = report.index.len(),
            versions = report.index.version_count(),
            failed_packages = report.failed_packages.len(),
            failed_versions = report.failed_versions.len(),
            requests = report.requests,
            "metadata prefetch complete"
        );
        Ok(report)
    }

    fn cancelled(&self, tasks: &mut JoinSet<FetchOutcome>) -> SprigError {
        tasks.abort_all();
        warn!("metadata prefetch cancelled");
        SprigError::fetch_message("metadata prefetch cancelled")
    }

    fn spawn_versions(
        &self,
        tasks: &mut JoinSet<FetchOutcome>,
        semaphore: &Arc<Semaphore>,
        name: PackageName,
    ) {
        let source = Arc::clone(&self.source);
        let semaphore = Arc::clone(semaphore);
        let retry = self.retry.clone();
        let cancel = self.cancel.clone();
        let requests = Arc::clone(&self.requests);

        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    retry_with_backoff(&retry, || {
                        requests.fetch_add(1, Ordering::SeqCst);
                        let cancelled = cancel.is_cancelled();
                        let source = &source;
                        let name = &name;
                        async move {
                            if cancelled {
                                return Err(SprigError::fetch_message("cancelled"));
                            }
                            source.list_versions(name).await
                        }
                    })
                    .await
                },
                Err(_) => Err(SprigError::fetch_message("prefetch shut down")),
            };
            FetchOutcome::Versions { name, result }
        });
    }

    fn spawn_metadata(
        &self,
        tasks: &mut JoinSet<FetchOutcome>,
        semaphore: &Arc<Semaphore>,
        name: PackageName,
        version: Version,
    ) {
        let source = Arc::clone(&self.source);
        let semaphore = Arc::clone(semaphore);
        let retry = self.retry.clone();
        let cancel = self.cancel.clone();
        let requests = Arc::clone(&self.requests);

        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    retry_with_backoff(&retry, || {
                        requests.fetch_add(1, Ordering::SeqCst);
                        let cancelled = cancel.is_cancelled();
                        let source = &source;
                        let name = &name;
                        let version = &version;
                        async move {
                            if cancelled {
                                return Err(SprigError::fetch_message("cancelled"));
                            }
                            source.fetch_metadata(name, version).await
                        }
                    })
                    .await
                },
                Err(_) => Err(SprigError::fetch_message("prefetch shut down")),
            };
            FetchOutcome::Metadata {
                name,
                version,
                result,
            }
        });
    }
}

fn failed(error: &SprigError) -> FailedFetch {
    FailedFetch {
        message: error.to_string(),
        not_found: matches!(error, SprigError::PackageNotFound { .. }),
    }
}
