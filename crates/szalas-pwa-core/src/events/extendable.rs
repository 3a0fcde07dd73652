use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{join_all, BoxFuture, FutureExt};

use crate::error::{PwaError, Result};
use crate::http::{Request, Response};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An event whose lifetime listeners can extend with `wait_until`.
#[derive(Default)]
pub struct ExtendableEvent {
    extensions: Mutex<Vec<BoxFuture<'static, Result<()>>>>,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the event alive until `future` completes.
    pub fn wait_until<F>(&self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        lock(&self.extensions).push(future.boxed());
    }

    pub fn pending(&self) -> usize {
        lock(&self.extensions).len()
    }

    /// Join every registered extension. All of them run to completion even
    /// when one fails; the first failure is returned.
    pub async fn settle(&self) -> Result<()> {
        let pending = std::mem::take(&mut *lock(&self.extensions));
        for result in join_all(pending).await {
            result?;
        }
        Ok(())
    }
}

/// A fetch routed through the worker.
pub struct FetchEvent {
    request: Request,
    response: Mutex<Option<BoxFuture<'static, Option<Response>>>>,
    responded: Mutex<bool>,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Mutex::new(None),
            responded: Mutex::new(false),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Claim the request. Must be called while the listener is running;
    /// resolving to `None` means the page sees a failed fetch.
    pub fn respond_with<F>(&self, future: F) -> Result<()>
    where
        F: Future<Output = Option<Response>> + Send + 'static,
    {
        let mut responded = lock(&self.responded);
        if *responded {
            return Err(PwaError::AlreadyResponded);
        }
        *responded = true;
        *lock(&self.response) = Some(future.boxed());
        Ok(())
    }

    pub fn was_responded(&self) -> bool {
        *lock(&self.responded)
    }

    pub(crate) fn take_response(&self) -> Option<BoxFuture<'static, Option<Response>>> {
        lock(&self.response).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_settle_joins_all_extensions() {
        let event = ExtendableEvent::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = done.clone();
            event.wait_until(async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(event.pending(), 3);
        event.settle().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(event.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_reports_failure_after_running_everything() {
        let event = ExtendableEvent::new();
        let done = Arc::new(AtomicUsize::new(0));
        event.wait_until(async { Err(PwaError::Cache("boom".into())) });
        let counter = done.clone();
        event.wait_until(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(event.settle().await.is_err());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_respond_with_only_once() {
        let event = FetchEvent::new(Request::get("https://app.test/"));
        assert!(!event.was_responded());
        event
            .respond_with(async { Some(Response::new(200, "hi")) })
            .unwrap();
        assert!(matches!(
            event.respond_with(async { None }),
            Err(PwaError::AlreadyResponded)
        ));

        let response = event.take_response().unwrap().await.unwrap();
        assert_eq!(response.text(), "hi");
    }
}
