use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::events::{EventTarget, ExtendableEvent, FetchEvent};
use crate::http::{Request, Response};
use crate::worker::lifecycle::{WorkerScope, WorkerState};
use crate::worker::network::Network;

/// What the page observes for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// A listener claimed the request and produced a response
    Responded(Response),
    /// A listener claimed the request but produced nothing; the page sees a
    /// failed fetch
    NoResponse,
    /// No listener claimed the request; the host fetched it itself
    Passthrough(Response),
}

impl FetchResult {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchResult::Responded(r) | FetchResult::Passthrough(r) => Some(r),
            FetchResult::NoResponse => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchResult::Responded(r) | FetchResult::Passthrough(r) => Some(r),
            FetchResult::NoResponse => None,
        }
    }
}

/// Drives one worker through its lifecycle and routes fetches to it.
///
/// Listeners are registered up front; afterwards the runtime is shared
/// immutably.
pub struct ServiceWorkerRuntime {
    scope: Arc<WorkerScope>,
    network: Arc<dyn Network>,
    install: EventTarget<ExtendableEvent>,
    activate: EventTarget<ExtendableEvent>,
    fetch: EventTarget<FetchEvent>,
}

impl ServiceWorkerRuntime {
    pub fn new(scope: Arc<WorkerScope>, network: Arc<dyn Network>) -> Self {
        Self {
            scope,
            network,
            install: EventTarget::new(),
            activate: EventTarget::new(),
            fetch: EventTarget::new(),
        }
    }

    pub fn scope(&self) -> &Arc<WorkerScope> {
        &self.scope
    }

    pub fn state(&self) -> WorkerState {
        self.scope.state()
    }

    pub fn on_install<F>(&mut self, listener: F)
    where
        F: Fn(&ExtendableEvent) + Send + Sync + 'static,
    {
        self.install.add_listener(listener);
    }

    pub fn on_activate<F>(&mut self, listener: F)
    where
        F: Fn(&ExtendableEvent) + Send + Sync + 'static,
    {
        self.activate.add_listener(listener);
    }

    pub fn on_fetch<F>(&mut self, listener: F)
    where
        F: Fn(&FetchEvent) + Send + Sync + 'static,
    {
        self.fetch.add_listener(listener);
    }

    /// Dispatch `install` and wait for its extensions. A failed extension
    /// makes the worker redundant.
    pub async fn install(&self) -> Result<()> {
        self.scope
            .transition(&[WorkerState::Parsed], WorkerState::Installing, "parsed")?;

        let event = ExtendableEvent::new();
        self.install.dispatch(&event);
        match event.settle().await {
            Ok(()) => {
                self.scope.set_state(WorkerState::Installed);
                info!(origin = self.scope.origin(), "Service worker installed");
                Ok(())
            }
            Err(e) => {
                self.scope.set_state(WorkerState::Redundant);
                error!(error = %e, "Service worker install failed");
                Err(e)
            }
        }
    }

    /// Dispatch `activate`. Called by the host once no older worker holds
    /// the origin. Extension failures are logged; activation still completes.
    pub async fn activate(&self) -> Result<()> {
        self.scope.transition(
            &[WorkerState::Installed],
            WorkerState::Activating,
            "installed",
        )?;

        let event = ExtendableEvent::new();
        self.activate.dispatch(&event);
        if let Err(e) = event.settle().await {
            warn!(error = %e, "Activation step failed");
        }
        self.scope.set_state(WorkerState::Activated);
        info!(origin = self.scope.origin(), "Service worker activated");
        Ok(())
    }

    /// Install, then activate straight away if the worker asked to skip
    /// waiting. Returns the resulting state.
    pub async fn start(&self) -> Result<WorkerState> {
        self.install().await?;
        if self.scope.skip_waiting_requested() {
            self.activate().await?;
        } else {
            debug!("Service worker waiting for activation");
        }
        Ok(self.state())
    }

    /// Route a request through the worker. Before activation, or when no
    /// listener claims it, the host's own fetch applies.
    pub async fn fetch(&self, request: Request) -> Result<FetchResult> {
        if !self.state().can_intercept_fetch() {
            return self.passthrough(&request).await;
        }

        let event = FetchEvent::new(request);
        self.fetch.dispatch(&event);
        match event.take_response() {
            Some(response) => Ok(match response.await {
                Some(r) => FetchResult::Responded(r),
                None => FetchResult::NoResponse,
            }),
            None => self.passthrough(event.request()).await,
        }
    }

    async fn passthrough(&self, request: &Request) -> Result<FetchResult> {
        debug!(method = %request.method, url = %request.url, "Fetch not intercepted");
        Ok(FetchResult::Passthrough(self.network.fetch(request).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PwaError;
    use crate::worker::network::StaticNetwork;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn runtime(network: StaticNetwork) -> ServiceWorkerRuntime {
        ServiceWorkerRuntime::new(
            Arc::new(WorkerScope::new("https://app.test")),
            Arc::new(network),
        )
    }

    #[tokio::test]
    async fn test_start_without_skip_waiting_stays_installed() {
        let rt = runtime(StaticNetwork::new());
        assert_eq!(rt.start().await.unwrap(), WorkerState::Installed);

        rt.activate().await.unwrap();
        assert_eq!(rt.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let mut rt = runtime(StaticNetwork::new());
        rt.on_install(|event| event.wait_until(async { Err(PwaError::Cache("disk full".into())) }));

        assert!(rt.install().await.is_err());
        assert_eq!(rt.state(), WorkerState::Redundant);
        assert!(rt.activate().await.is_err());
    }

    #[tokio::test]
    async fn test_install_runs_before_activate_can_start() {
        let rt = runtime(StaticNetwork::new());
        assert!(matches!(
            rt.activate().await,
            Err(PwaError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_activation_completes_despite_failing_extension() {
        let mut rt = runtime(StaticNetwork::new());
        rt.on_install(|_| {});
        rt.on_activate(|event| event.wait_until(async { Err(PwaError::Cache("locked".into())) }));

        rt.install().await.unwrap();
        rt.activate().await.unwrap();
        assert_eq!(rt.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_is_passthrough() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut rt = runtime(
            StaticNetwork::new().route("https://app.test/", Response::new(200, "home")),
        );
        let counter = calls.clone();
        rt.on_fetch(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = rt.fetch(Request::get("https://app.test/")).await.unwrap();
        assert!(matches!(result, FetchResult::Passthrough(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_routes_to_listener() {
        let mut rt = runtime(StaticNetwork::new());
        rt.on_fetch(|event| {
            let url = event.request().url.clone();
            event
                .respond_with(async move {
                    if url.ends_with("/missing") {
                        None
                    } else {
                        Some(Response::new(200, "from worker"))
                    }
                })
                .unwrap();
        });
        rt.install().await.unwrap();
        rt.activate().await.unwrap();

        let result = rt.fetch(Request::get("https://app.test/")).await.unwrap();
        assert_eq!(result.response().unwrap().text(), "from worker");

        let result = rt.fetch(Request::get("https://app.test/missing")).await.unwrap();
        assert_eq!(result, FetchResult::NoResponse);
    }
}
