//! Request and response types shared by the worker and its hosts.

pub mod request;
pub mod response;

pub use request::{resolve_url, CacheKey, Method, Request, RequestMode};
pub use response::{Response, ResponseSource};
