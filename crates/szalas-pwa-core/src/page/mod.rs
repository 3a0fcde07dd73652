//! Page-side install flow.
//!
//! This module provides:
//! - `InstallPromptHandler`: defers the host's install offer, replays it on
//!   request and reflects install / standalone state into the document
//! - `PromptSlot`: the single deferred-offer holder
//! - `register_worker` / `UpdateChecker`: worker registration with hourly
//!   update checks
//! - `PageController`: wires all of the above to the page events

pub mod controller;
pub mod dom;
pub mod install;
pub mod prompt;
pub mod registration;

pub use controller::PageController;
pub use dom::{DisplayEnvironment, Document, Element, MemoryDocument, MemoryElement, StaticDisplay};
pub use install::{is_standalone, InstallPromptHandler, STANDALONE_MEDIA_QUERY};
pub use prompt::{
    BeforeInstallPromptEvent, ChoiceResolver, InstallOffer, InstallOutcome, PromptSlot,
    ScriptedOffer, UserChoice,
};
pub use registration::{register_worker, ServiceWorkerContainer, UpdateChecker, WorkerRegistration};
