use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{PwaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

impl InstallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallOutcome::Accepted => "accepted",
            InstallOutcome::Dismissed => "dismissed",
        }
    }
}

/// The user's answer to the native install prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserChoice {
    pub outcome: InstallOutcome,
    pub platform: String,
}

/// A pending offer to install the app, as delivered by the host.
#[async_trait]
pub trait BeforeInstallPromptEvent: Send + Sync {
    /// Suppress the host's own install banner
    fn prevent_default(&self);

    /// Show the native prompt. Valid once per offer.
    fn prompt(&self) -> Result<()>;

    /// Resolves when the user answers the prompt. No timeout.
    async fn user_choice(&self) -> UserChoice;
}

pub type InstallOffer = Arc<dyn BeforeInstallPromptEvent>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds at most one deferred offer.
#[derive(Default)]
pub struct PromptSlot {
    offer: Mutex<Option<InstallOffer>>,
}

impl PromptSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `offer`, returning the one it replaced
    pub fn set(&self, offer: InstallOffer) -> Option<InstallOffer> {
        lock(&self.offer).replace(offer)
    }

    /// Remove and return the held offer. Each offer can be taken once.
    pub fn take(&self) -> Option<InstallOffer> {
        lock(&self.offer).take()
    }

    /// Drop the held offer. Returns whether one was held.
    pub fn clear(&self) -> bool {
        self.take().is_some()
    }

    pub fn is_held(&self) -> bool {
        lock(&self.offer).is_some()
    }
}

// ============================================================================
// Scripted offers
// ============================================================================

/// Completes a pending `ScriptedOffer` choice.
pub struct ChoiceResolver {
    tx: oneshot::Sender<InstallOutcome>,
}

impl ChoiceResolver {
    pub fn resolve(self, outcome: InstallOutcome) {
        // The offer may already be gone; nothing to resolve then.
        let _ = self.tx.send(outcome);
    }
}

/// In-process offer whose answer is fixed up front or supplied later.
pub struct ScriptedOffer {
    platform: String,
    preset: Option<InstallOutcome>,
    pending: tokio::sync::Mutex<Option<oneshot::Receiver<InstallOutcome>>>,
    default_prevented: AtomicBool,
    prompts: AtomicUsize,
}

impl ScriptedOffer {
    /// An offer the user answers with `outcome` as soon as it is shown
    pub fn resolved(outcome: InstallOutcome) -> Self {
        Self {
            platform: "web".to_string(),
            preset: Some(outcome),
            pending: tokio::sync::Mutex::new(None),
            default_prevented: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        }
    }

    /// An offer whose answer arrives through the returned resolver. If the
    /// resolver is dropped the choice reads as dismissed.
    pub fn pending() -> (Self, ChoiceResolver) {
        let (tx, rx) = oneshot::channel();
        let offer = Self {
            platform: "web".to_string(),
            preset: None,
            pending: tokio::sync::Mutex::new(Some(rx)),
            default_prevented: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        };
        (offer, ChoiceResolver { tx })
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BeforeInstallPromptEvent for ScriptedOffer {
    fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::SeqCst);
    }

    fn prompt(&self) -> Result<()> {
        if self.prompts.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(PwaError::Prompt(
                "prompt() may only be called once per offer".to_string(),
            ));
        }
        Ok(())
    }

    async fn user_choice(&self) -> UserChoice {
        let outcome = match self.preset {
            Some(outcome) => outcome,
            None => {
                let rx = self.pending.lock().await.take();
                match rx {
                    Some(rx) => rx.await.unwrap_or(InstallOutcome::Dismissed),
                    None => InstallOutcome::Dismissed,
                }
            }
        };
        UserChoice {
            outcome,
            platform: self.platform.clone(),
        }
    }
}
