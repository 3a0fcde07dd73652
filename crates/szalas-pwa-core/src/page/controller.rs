use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::config::PwaConfig;
use crate::events::{EventTarget, ExtendableEvent};
use crate::page::dom::{DisplayEnvironment, Document};
use crate::page::install::InstallPromptHandler;
use crate::page::prompt::InstallOffer;
use crate::page::registration::{register_worker, ServiceWorkerContainer, UpdateChecker};

/// Owns the page-side PWA state: the install handler, the page events it
/// listens to, and the worker registration's update timer.
pub struct PageController {
    config: PwaConfig,
    install: Arc<InstallPromptHandler>,
    container: Option<Arc<dyn ServiceWorkerContainer>>,
    update_checker: Arc<Mutex<Option<UpdateChecker>>>,
    before_install_prompt: EventTarget<InstallOffer>,
    install_click: EventTarget<ExtendableEvent>,
    app_installed: EventTarget<()>,
    load: EventTarget<ExtendableEvent>,
    booted: bool,
}

impl PageController {
    /// `container` is `None` when the host has no service worker support.
    pub fn new(
        config: PwaConfig,
        document: Arc<dyn Document>,
        container: Option<Arc<dyn ServiceWorkerContainer>>,
    ) -> Self {
        let install = Arc::new(InstallPromptHandler::new(&config, document));
        Self {
            config,
            install,
            container,
            update_checker: Arc::new(Mutex::new(None)),
            before_install_prompt: EventTarget::new(),
            install_click: EventTarget::new(),
            app_installed: EventTarget::new(),
            load: EventTarget::new(),
            booted: false,
        }
    }

    pub fn install_handler(&self) -> &Arc<InstallPromptHandler> {
        &self.install
    }

    /// Wire the page listeners and evaluate display mode. Only the first
    /// call has any effect.
    pub fn boot(&mut self, env: &dyn DisplayEnvironment) {
        if self.booted {
            debug!("Page already booted");
            return;
        }
        self.booted = true;

        let handler = self.install.clone();
        self.before_install_prompt
            .add_listener(move |offer| handler.on_before_install_prompt(offer.clone()));

        if self.install.has_trigger() {
            let handler = self.install.clone();
            self.install_click.add_listener(move |event| {
                let handler = handler.clone();
                event.wait_until(async move {
                    handler.on_install_click().await;
                    Ok(())
                });
            });
        } else {
            debug!(id = %self.config.install_trigger_id, "No install trigger on this page");
        }

        let handler = self.install.clone();
        self.app_installed
            .add_listener(move |_| handler.on_app_installed());

        if let Some(container) = self.container.clone() {
            let config = self.config.clone();
            let slot = self.update_checker.clone();
            self.load.add_listener(move |event| {
                let container = container.clone();
                let config = config.clone();
                let slot = slot.clone();
                event.wait_until(async move {
                    let checker = register_worker(container.as_ref(), &config).await;
                    *slot.lock().unwrap_or_else(PoisonError::into_inner) = checker;
                    Ok(())
                });
            });
        }

        self.install.apply_standalone_marker(env);
    }

    // ===== Event delivery =====

    pub fn offer_install(&self, offer: InstallOffer) {
        self.before_install_prompt.dispatch(&offer);
    }

    /// Deliver an install-trigger click and wait for the prompt to resolve.
    /// Returns false when the page has no trigger listener.
    pub async fn click_install(&self) -> bool {
        let event = ExtendableEvent::new();
        let delivered = self.install_click.dispatch(&event) > 0;
        // Click extensions never fail
        let _ = event.settle().await;
        delivered
    }

    pub fn app_installed(&self) {
        self.app_installed.dispatch(&());
    }

    pub async fn load(&self) {
        let event = ExtendableEvent::new();
        self.load.dispatch(&event);
        let _ = event.settle().await;
    }

    pub fn is_checking_for_updates(&self) -> bool {
        self.update_checker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }
}
