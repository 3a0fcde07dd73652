use serde::{Deserialize, Serialize};

/// Where a response delivered by the interceptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    #[default]
    Network,
    Cache,
}

/// A fully buffered response.
///
/// The host hands out single-read bodies; here the body is buffered, so
/// `Clone` is the equivalent of `response.clone()` before one copy is stored
/// and the other returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub url: String,
    #[serde(skip)]
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            url: String::new(),
            source: ResponseSource::Network,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the 2xx range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only plain 200 responses are written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn from_cache(mut self) -> Self {
        self.source = ResponseSource::Cache;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_200_is_cacheable() {
        assert!(Response::new(200, "").is_cacheable());
        assert!(!Response::new(203, "").is_cacheable());
        assert!(!Response::new(404, "").is_cacheable());
        assert!(Response::new(204, "").ok());
        assert!(!Response::new(304, "").ok());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let resp = Response::new(200, "x").with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }
}
