//! Network access for the worker.
//!
//! `HttpNetwork` talks to a real origin; `StaticNetwork` serves canned
//! responses and can be switched offline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{PwaError, Result};
use crate::http::{CacheKey, Request, Response};

/// A live network. `Err` means the request never completed; an error status
/// is still `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

// ============================================================================
// HTTP
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Network backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "Network response");
        Ok(Response {
            status,
            headers,
            body,
            url,
            source: Default::default(),
        })
    }
}

// ============================================================================
// Static routes
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory network. Unrouted URLs and the offline switch both behave like
/// an unreachable host.
#[derive(Default)]
pub struct StaticNetwork {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    requests: Mutex<Vec<CacheKey>>,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network on which every request fails
    pub fn offline() -> Self {
        let network = Self::default();
        network.set_offline(true);
        network
    }

    pub fn route(self, url: impl Into<String>, response: Response) -> Self {
        self.set_route(url, response);
        self
    }

    pub fn set_route(&self, url: impl Into<String>, response: Response) {
        let url = url.into();
        let response = response.with_url(url.clone());
        lock(&self.routes).insert(url, response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<CacheKey> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        lock(&self.requests).push(request.key());
        if self.offline.load(Ordering::SeqCst) {
            return Err(PwaError::Network(format!("offline: {}", request.url)));
        }
        lock(&self.routes)
            .get(&request.url)
            .cloned()
            .ok_or_else(|| PwaError::Network(format!("unreachable: {}", request.url)))
    }
}
