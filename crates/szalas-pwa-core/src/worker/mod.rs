//! Offline cache worker.
//!
//! This module provides the worker side of the PWA:
//! - `ServiceWorkerRuntime`: lifecycle state machine and event routing
//! - `OfflineCacheWorker`: precache on install, purge old generations on
//!   activate, network-first fetch with cache fallback
//! - `CacheStorage` / `Network`: the host services the worker relies on,
//!   with in-memory, on-disk and HTTP implementations

pub mod cache;
pub mod disk;
pub mod lifecycle;
pub mod network;
pub mod offline;
pub mod runtime;

use std::sync::Arc;

pub use cache::{add_all, Cache, CacheStorage, MemoryCacheStorage};
pub use disk::{CachedData, DiskCacheStorage, StoredEntry};
pub use lifecycle::{WorkerScope, WorkerState};
pub use network::{HttpNetwork, Network, StaticNetwork};
pub use offline::OfflineCacheWorker;
pub use runtime::{FetchResult, ServiceWorkerRuntime};

use crate::config::PwaConfig;
use crate::error::Result;

/// Build a runtime with the offline worker attached, scoped to
/// `config.origin`.
pub fn build_worker(
    config: &PwaConfig,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
) -> Result<(ServiceWorkerRuntime, Arc<OfflineCacheWorker>)> {
    let scope = Arc::new(WorkerScope::new(config.origin.clone()));
    let mut runtime = ServiceWorkerRuntime::new(scope.clone(), network.clone());
    let worker = Arc::new(OfflineCacheWorker::new(config, scope, caches, network)?);
    worker.attach(&mut runtime);
    Ok((runtime, worker))
}
