use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::PwaConfig;
use crate::error::Result;

/// A registered worker as seen from the page.
#[async_trait]
pub trait WorkerRegistration: Send + Sync {
    fn scope(&self) -> String;

    /// Ask the host to re-check the worker script for changes
    async fn update(&self) -> Result<()>;
}

/// Host support for registering workers. Pages without it get no offline
/// support.
#[async_trait]
pub trait ServiceWorkerContainer: Send + Sync {
    async fn register(&self, script_path: &str) -> Result<Arc<dyn WorkerRegistration>>;
}

/// Register the worker script and start hourly update checks. Failure is
/// logged and leaves the page running without offline support.
pub async fn register_worker(
    container: &dyn ServiceWorkerContainer,
    config: &PwaConfig,
) -> Option<UpdateChecker> {
    match container.register(&config.worker_script_path).await {
        Ok(registration) => {
            info!(scope = %registration.scope(), "PWA: Service Worker registered successfully");
            Some(UpdateChecker::spawn(registration, config.update_interval()))
        }
        Err(e) => {
            error!(script = %config.worker_script_path, error = %e, "PWA: Service Worker registration failed");
            None
        }
    }
}

/// Periodic `update()` calls on a registration. The first check runs one
/// period after spawning. Dropping the checker stops it.
pub struct UpdateChecker {
    handle: JoinHandle<()>,
}

impl UpdateChecker {
    pub fn spawn(registration: Arc<dyn WorkerRegistration>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match registration.update().await {
                    Ok(()) => debug!(scope = %registration.scope(), "Checked for worker update"),
                    Err(e) => warn!(error = %e, "Worker update check failed"),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for UpdateChecker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PwaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub(crate) struct CountingRegistration {
        pub updates: AtomicUsize,
        pub fail_updates: bool,
    }

    #[async_trait]
    impl WorkerRegistration for CountingRegistration {
        fn scope(&self) -> String {
            "https://app.test/".to_string()
        }

        async fn update(&self) -> Result<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates {
                return Err(PwaError::Registration("script fetch failed".into()));
            }
            Ok(())
        }
    }

    pub(crate) struct FixedContainer {
        pub registration: Option<Arc<CountingRegistration>>,
        pub registered_paths: std::sync::Mutex<Vec<String>>,
    }

    impl FixedContainer {
        pub fn accepting() -> (Self, Arc<CountingRegistration>) {
            let registration = Arc::new(CountingRegistration::default());
            let container = Self {
                registration: Some(registration.clone()),
                registered_paths: Default::default(),
            };
            (container, registration)
        }

        pub fn rejecting() -> Self {
            Self {
                registration: None,
                registered_paths: Default::default(),
            }
        }
    }

    #[async_trait]
    impl ServiceWorkerContainer for FixedContainer {
        async fn register(&self, script_path: &str) -> Result<Arc<dyn WorkerRegistration>> {
            self.registered_paths.lock().unwrap().push(script_path.to_string());
            match &self.registration {
                Some(r) => Ok(r.clone() as Arc<dyn WorkerRegistration>),
                None => Err(PwaError::Registration("insecure context".into())),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_starts_hourly_updates() {
        let (container, registration) = FixedContainer::accepting();
        let checker = register_worker(&container, &PwaConfig::default())
            .await
            .unwrap();
        assert_eq!(
            *container.registered_paths.lock().unwrap(),
            vec!["/service-worker.js"]
        );

        tokio::time::sleep(Duration::from_secs(3599)).await;
        assert_eq!(registration.updates.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(registration.updates.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(registration.updates.load(Ordering::SeqCst), 2);

        checker.stop();
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(registration.updates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_registration_failure_is_swallowed() {
        let container = FixedContainer::rejecting();
        assert!(register_worker(&container, &PwaConfig::default()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_update_keeps_timer_running() {
        let registration = Arc::new(CountingRegistration {
            fail_updates: true,
            ..Default::default()
        });
        let checker = UpdateChecker::spawn(registration.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(181)).await;
        assert_eq!(registration.updates.load(Ordering::SeqCst), 3);
        assert!(checker.is_running());
    }
}
