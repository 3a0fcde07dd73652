use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, info, warn};

use crate::config::PwaConfig;
use crate::page::dom::{DisplayEnvironment, Document};
use crate::page::prompt::{InstallOffer, PromptSlot, UserChoice};

pub const STANDALONE_MEDIA_QUERY: &str = "(display-mode: standalone)";

/// Whether the page runs as an installed app. Either signal is enough.
pub fn is_standalone(env: &dyn DisplayEnvironment) -> bool {
    env.matches_media(STANDALONE_MEDIA_QUERY) || env.navigator_standalone() == Some(true)
}

/// Mediates the install flow and mirrors it into the page.
///
/// Every operation is best effort: a missing trigger element turns the
/// show/hide steps into no-ops.
pub struct InstallPromptHandler {
    document: Arc<dyn Document>,
    trigger_id: String,
    standalone_class: String,
    slot: PromptSlot,
    last_choice: Mutex<Option<UserChoice>>,
    installed: AtomicBool,
    standalone: OnceLock<bool>,
}

impl InstallPromptHandler {
    pub fn new(config: &PwaConfig, document: Arc<dyn Document>) -> Self {
        Self {
            document,
            trigger_id: config.install_trigger_id.clone(),
            standalone_class: config.standalone_class.clone(),
            slot: PromptSlot::new(),
            last_choice: Mutex::new(None),
            installed: AtomicBool::new(false),
            standalone: OnceLock::new(),
        }
    }

    pub fn has_trigger(&self) -> bool {
        self.document.element_by_id(&self.trigger_id).is_some()
    }

    fn set_trigger_visible(&self, visible: bool) {
        if let Some(trigger) = self.document.element_by_id(&self.trigger_id) {
            trigger.set_visible(visible);
        }
    }

    /// Defer the offer and reveal the install trigger.
    pub fn on_before_install_prompt(&self, offer: InstallOffer) {
        offer.prevent_default();
        if self.slot.set(offer).is_some() {
            debug!("Replaced earlier install offer");
        }
        self.set_trigger_visible(true);
        info!("PWA: Install prompt available");
    }

    /// Replay the deferred offer. A no-op when nothing is held.
    ///
    /// The offer leaves the slot before the prompt is shown, so a second
    /// activation while the user is still deciding finds nothing to consume.
    pub async fn on_install_click(&self) -> Option<UserChoice> {
        let Some(offer) = self.slot.take() else {
            debug!("Install trigger activated without a pending offer");
            return None;
        };

        if let Err(e) = offer.prompt() {
            warn!(error = %e, "Failed to show install prompt");
            self.set_trigger_visible(false);
            return None;
        }

        let choice = offer.user_choice().await;
        info!(outcome = choice.outcome.as_str(), "PWA: User response to install prompt");
        *self.last_choice.lock().unwrap_or_else(PoisonError::into_inner) = Some(choice.clone());
        self.set_trigger_visible(false);
        Some(choice)
    }

    /// The app was installed, through our prompt or the host's own UI.
    pub fn on_app_installed(&self) {
        info!("PWA: App installed successfully");
        self.installed.store(true, Ordering::SeqCst);
        self.slot.clear();
        self.set_trigger_visible(false);
    }

    /// Evaluate display mode once per page load and mark the document root
    /// when running standalone. Later calls return the first answer.
    pub fn apply_standalone_marker(&self, env: &dyn DisplayEnvironment) -> bool {
        *self.standalone.get_or_init(|| {
            let standalone = is_standalone(env);
            if standalone {
                info!("PWA: Running as installed app");
                self.document.add_root_class(&self.standalone_class);
            }
            standalone
        })
    }

    pub fn has_pending_offer(&self) -> bool {
        self.slot.is_held()
    }

    pub fn last_choice(&self) -> Option<UserChoice> {
        self.last_choice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}
