use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{PwaError, Result};

/// HTTP request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Request mode as reported by the host. Only `Navigate` changes behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

/// Identity of a cached entry: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A request seen by the fetch interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            mode: RequestMode::Cors,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A top-level page navigation
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn key(&self) -> CacheKey {
        CacheKey {
            method: self.method,
            url: self.url.clone(),
        }
    }
}

/// Resolve a path (or absolute URL) against an origin, the way the host
/// resolves script-relative URLs inside a worker.
pub fn resolve_url(origin: &str, path: &str) -> Result<String> {
    let base = Url::parse(origin).map_err(|e| PwaError::InvalidUrl(format!("{}: {}", origin, e)))?;
    let url = base
        .join(path)
        .map_err(|e| PwaError::InvalidUrl(format!("{}: {}", path, e)))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_is_get_in_navigate_mode() {
        let req = Request::navigate("https://app.test/");
        assert_eq!(req.method, Method::Get);
        assert!(req.is_navigation());
        assert!(!Request::get("https://app.test/").is_navigation());
    }

    #[test]
    fn test_cache_key_includes_method() {
        let get = Request::get("https://app.test/a").key();
        let head = Request::new(Method::Head, "https://app.test/a").key();
        assert_ne!(get, head);
        assert_eq!(get.to_string(), "GET https://app.test/a");
    }

    #[test]
    fn test_cache_keys_sort_by_method_then_url() {
        let mut keys = vec![
            Request::new(Method::Head, "https://app.test/a").key(),
            Request::get("https://app.test/b").key(),
            Request::get("https://app.test/a").key(),
        ];
        keys.sort();
        let shown: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            shown,
            vec![
                "GET https://app.test/a",
                "GET https://app.test/b",
                "HEAD https://app.test/a",
            ]
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://app.test", "/static/manifest.json").unwrap(),
            "https://app.test/static/manifest.json"
        );
        assert_eq!(resolve_url("https://app.test/", "/").unwrap(), "https://app.test/");
        assert_eq!(
            resolve_url("https://app.test", "https://cdn.test/x.js").unwrap(),
            "https://cdn.test/x.js"
        );
        assert!(resolve_url("not a url", "/").is_err());
    }
}
