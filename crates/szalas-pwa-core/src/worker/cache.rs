use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{PwaError, Result};
use crate::http::{CacheKey, Method, Request, Response};
use crate::worker::network::Network;

/// One named cache generation.
#[async_trait]
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    async fn match_request(&self, request: &Request) -> Result<Option<Response>>;

    /// Store one entry. Last write wins per key.
    async fn put(&self, request: &Request, response: Response) -> Result<()>;

    /// Store a batch atomically: either every entry lands or none does.
    async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<()>;

    async fn keys(&self) -> Result<Vec<CacheKey>>;
}

/// The set of cache generations for one origin.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if absent
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>>;

    async fn has(&self, name: &str) -> Result<bool>;

    /// Generation names in creation order
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete a whole generation. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// Reject entries the host's cache would refuse to store.
pub(crate) fn check_storable(request: &Request, response: &Response) -> Result<()> {
    if request.method != Method::Get {
        return Err(PwaError::Cache(format!(
            "{} requests cannot be cached",
            request.method
        )));
    }
    if response.status == 206 {
        return Err(PwaError::Cache(
            "Cannot cache partial responses (206)".to_string(),
        ));
    }
    Ok(())
}

/// Fetch every URL and store the results as a single batch.
///
/// A transport failure or a non-2xx status on any URL fails the whole batch
/// and nothing is written.
pub async fn add_all(cache: &dyn Cache, network: &dyn Network, urls: &[String]) -> Result<usize> {
    let requests: Vec<Request> = urls.iter().map(Request::get).collect();

    let responses = try_join_all(requests.iter().map(|request| async move {
        let response = network.fetch(request).await?;
        if !response.ok() {
            return Err(PwaError::from_status(&request.url, response.status));
        }
        Ok(response)
    }))
    .await?;

    let count = responses.len();
    cache
        .put_all(requests.into_iter().zip(responses).collect())
        .await?;
    debug!(cache = cache.name(), count, "Stored precache batch");
    Ok(count)
}

// ============================================================================
// In-memory storage
// ============================================================================

pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<CacheKey, Response>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&request.key()).cloned().map(Response::from_cache))
    }

    async fn put(&self, request: &Request, response: Response) -> Result<()> {
        check_storable(request, &response)?;
        self.entries.write().await.insert(request.key(), response);
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<()> {
        for (request, response) in &entries {
            check_storable(request, response)?;
        }
        let mut stored = self.entries.write().await;
        for (request, response) in entries {
            stored.insert(request.key(), response);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Process-local cache storage. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<Vec<(String, Arc<MemoryCache>)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        let mut caches = self.caches.write().await;
        if let Some((_, cache)) = caches.iter().find(|(n, _)| n == name) {
            return Ok(cache.clone() as Arc<dyn Cache>);
        }
        let cache = Arc::new(MemoryCache::new(name));
        caches.push((name.to_string(), cache.clone()));
        Ok(cache as Arc<dyn Cache>)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.caches.read().await.iter().any(|(n, _)| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        Ok(caches.len() != before)
    }
}
