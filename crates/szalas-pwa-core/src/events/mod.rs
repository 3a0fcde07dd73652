//! Host-independent event dispatch.
//!
//! Lifecycle and page events are delivered through `EventTarget`s holding
//! synchronous listeners. Work that outlives a listener is attached to the
//! event itself:
//! - `ExtendableEvent::wait_until` for install/activate/load style events
//! - `FetchEvent::respond_with` for intercepted requests
//!
//! The dispatcher awaits the attached futures after all listeners have run.

pub mod dispatch;
pub mod extendable;

pub use dispatch::EventTarget;
pub use extendable::{ExtendableEvent, FetchEvent};
