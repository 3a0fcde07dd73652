use thiserror::Error;

use crate::worker::WorkerState;

#[derive(Error, Debug)]
pub enum PwaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid worker state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: WorkerState,
    },

    #[error("respondWith already called for this fetch event")]
    AlreadyResponded,

    #[error("Service worker registration failed: {0}")]
    Registration(String),

    #[error("Install prompt error: {0}")]
    Prompt(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

/// Maximum length for URLs quoted in error messages
const MAX_ERROR_URL_LENGTH: usize = 200;

impl PwaError {
    /// Truncate a URL to avoid logging excessive data
    fn truncate_url(url: &str) -> String {
        if url.len() <= MAX_ERROR_URL_LENGTH {
            url.to_string()
        } else {
            let cut: String = url.chars().take(MAX_ERROR_URL_LENGTH).collect();
            format!("{}... (truncated)", cut)
        }
    }

    pub fn from_status(url: &str, status: u16) -> Self {
        PwaError::BadStatus {
            url: Self::truncate_url(url),
            status,
        }
    }

    /// True when the request never produced a response at all.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, PwaError::Network(_) | PwaError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, PwaError>;
