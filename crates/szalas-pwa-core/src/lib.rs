//! Szałas PWA core library.
//!
//! Two halves of the installable, offline-capable web app:
//! - `page`: defers the host's install offer behind the install trigger,
//!   marks standalone launches, registers the worker and keeps it updated
//! - `worker`: precaches the app shell, drops stale cache generations on
//!   activation and answers fetches network-first with a cache fallback
//!
//! Both are written against small host traits (`Document`, `Network`,
//! `CacheStorage`, ...) so they run under tests, the CLI harness or any
//! other embedding.

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod manifest;
pub mod page;
pub mod worker;

pub use config::PwaConfig;
pub use error::{PwaError, Result};
pub use manifest::{ManifestProblem, WebAppManifest};
pub use page::{InstallPromptHandler, PageController};
pub use worker::{build_worker, OfflineCacheWorker, ServiceWorkerRuntime};
