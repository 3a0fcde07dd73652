use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PwaConfig;
use crate::error::Result;
use crate::events::{ExtendableEvent, FetchEvent};
use crate::http::{resolve_url, Method, Request, Response};
use crate::worker::cache::{add_all, CacheStorage};
use crate::worker::lifecycle::WorkerScope;
use crate::worker::network::Network;
use crate::worker::runtime::ServiceWorkerRuntime;

/// Network-first worker with a versioned cache generation.
pub struct OfflineCacheWorker {
    cache_name: String,
    offline_url: String,
    precache_urls: Vec<String>,
    scope: Arc<WorkerScope>,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    writes: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineCacheWorker {
    /// Build the worker for `config`, resolving the offline and precache
    /// paths against the scope's origin.
    pub fn new(
        config: &PwaConfig,
        scope: Arc<WorkerScope>,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        let origin = scope.origin().to_string();
        let offline_url = resolve_url(&origin, &config.offline_url)?;
        let precache_urls = config
            .precache_urls
            .iter()
            .map(|path| resolve_url(&origin, path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cache_name: config.cache_name.clone(),
            offline_url,
            precache_urls,
            scope,
            caches,
            network,
            writes: Mutex::new(Vec::new()),
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn precache_urls(&self) -> &[String] {
        &self.precache_urls
    }

    /// Register the install, activate and fetch listeners.
    pub fn attach(self: &Arc<Self>, runtime: &mut ServiceWorkerRuntime) {
        let worker = self.clone();
        runtime.on_install(move |event| worker.handle_install(event));
        let worker = self.clone();
        runtime.on_activate(move |event| worker.handle_activate(event));
        let worker = self.clone();
        runtime.on_fetch(move |event| worker.handle_fetch(event));
    }

    // ===== Install =====

    /// Precache failures are logged, never propagated: the install always
    /// completes.
    pub fn handle_install(self: &Arc<Self>, event: &ExtendableEvent) {
        let worker = self.clone();
        event.wait_until(async move {
            match worker.precache().await {
                Ok(count) => info!(cache = %worker.cache_name, count, "Opened cache and stored precache list"),
                Err(e) => error!(cache = %worker.cache_name, error = %e, "Cache installation failed"),
            }
            Ok(())
        });
        self.scope.skip_waiting();
    }

    /// Open the current generation and store the seed list as one batch.
    pub async fn precache(&self) -> Result<usize> {
        let cache = self.caches.open(&self.cache_name).await?;
        add_all(cache.as_ref(), self.network.as_ref(), &self.precache_urls).await
    }

    // ===== Activate =====

    pub fn handle_activate(self: &Arc<Self>, event: &ExtendableEvent) {
        let worker = self.clone();
        event.wait_until(async move { worker.purge_stale_generations().await.map(|_| ()) });
        self.scope.claim_clients();
    }

    /// Delete every generation except the current one. Deletions run
    /// concurrently and all of them finish before this returns.
    pub async fn purge_stale_generations(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .caches
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != &self.cache_name)
            .collect();

        let deletions = stale.iter().map(|name| async move {
            info!(cache = %name, "Deleting old cache");
            self.caches.delete(name).await
        });
        for result in join_all(deletions).await {
            result?;
        }
        Ok(stale)
    }

    // ===== Fetch =====

    /// Only GET requests are claimed; everything else gets the host default.
    pub fn handle_fetch(self: &Arc<Self>, event: &FetchEvent) {
        let request = event.request();
        if request.method != Method::Get {
            return;
        }
        let worker = self.clone();
        let request = request.clone();
        if let Err(e) = event.respond_with(worker.network_first(request)) {
            warn!(error = %e, "Fetch already claimed by another listener");
        }
    }

    /// Network first; a 200 is written to the cache in the background.
    /// Only a failed request falls back to the cache.
    pub async fn network_first(self: Arc<Self>, request: Request) -> Option<Response> {
        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_in_background(request, response.clone());
                }
                Some(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network unavailable, trying cache");
                self.cache_fallback(&request).await
            }
        }
    }

    async fn cache_fallback(&self, request: &Request) -> Option<Response> {
        let cache = match self.caches.open(&self.cache_name).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(cache = %self.cache_name, error = %e, "Failed to open cache");
                return None;
            }
        };

        match cache.match_request(request).await {
            Ok(Some(response)) => return Some(response),
            Ok(None) => {}
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed"),
        }

        if !request.is_navigation() {
            return None;
        }
        match cache.match_request(&Request::get(&self.offline_url)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %self.offline_url, error = %e, "Offline page lookup failed");
                None
            }
        }
    }

    fn store_in_background(&self, request: Request, response: Response) {
        let caches = self.caches.clone();
        let cache_name = self.cache_name.clone();
        let handle = tokio::spawn(async move {
            let result = match caches.open(&cache_name).await {
                Ok(cache) => cache.put(&request, response).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(url = %request.url, error = %e, "Failed to update cache");
            }
        });

        let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        writes.retain(|h| !h.is_finished());
        writes.push(handle);
    }

    /// Wait for every background cache write started so far.
    pub async fn flush_cache_writes(&self) {
        let pending = std::mem::take(&mut *self.writes.lock().unwrap_or_else(PoisonError::into_inner));
        for result in join_all(pending).await {
            if let Err(e) = result {
                warn!(error = %e, "Cache write task failed");
            }
        }
    }
}
