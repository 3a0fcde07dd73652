//! Application configuration management.
//!
//! This module handles loading and saving the PWA configuration: the origin
//! the worker is scoped to, the current cache generation, the precache seed
//! list and the page-side identifiers.
//!
//! Configuration is stored at `~/.config/szalas-pwa/config.json`. Every field
//! has a default, so a missing or partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "szalas-pwa";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Bump the suffix whenever the precached shell changes; activation purges
/// every other generation.
pub const DEFAULT_CACHE_NAME: &str = "szalas-app-cache-v1";

pub const DEFAULT_OFFLINE_URL: &str = "/";

pub const DEFAULT_PRECACHE_URLS: [&str; 3] = [
    "/",
    "/static/manifest.json",
    "/static/assets/js/themeToggle.js",
];

pub const DEFAULT_WORKER_SCRIPT_PATH: &str = "/service-worker.js";

/// One hour between registration update checks.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 3_600_000;

pub const DEFAULT_INSTALL_TRIGGER_ID: &str = "pwa-install-button";

pub const DEFAULT_STANDALONE_CLASS: &str = "pwa-mode";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct PwaConfig {
    pub origin: String,
    pub cache_name: String,
    pub offline_url: String,
    pub precache_urls: Vec<String>,
    pub worker_script_path: String,
    pub update_interval_ms: u64,
    pub install_trigger_id: String,
    pub standalone_class: String,
    pub request_timeout_secs: u64,
}

impl Default for PwaConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            offline_url: DEFAULT_OFFLINE_URL.to_string(),
            precache_urls: DEFAULT_PRECACHE_URLS.iter().map(|s| s.to_string()).collect(),
            worker_script_path: DEFAULT_WORKER_SCRIPT_PATH.to_string(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            install_trigger_id: DEFAULT_INSTALL_TRIGGER_ID.to_string(),
            standalone_class: DEFAULT_STANDALONE_CLASS.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl PwaConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PwaConfig::default();
        assert_eq!(config.cache_name, "szalas-app-cache-v1");
        assert_eq!(config.offline_url, "/");
        assert_eq!(config.precache_urls.len(), 3);
        assert_eq!(config.update_interval(), Duration::from_secs(3600));
        assert_eq!(config.worker_script_path, "/service-worker.js");
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache_name": "szalas-app-cache-v2"}"#).unwrap();

        let config = PwaConfig::load_from(&path).unwrap();
        assert_eq!(config.cache_name, "szalas-app-cache-v2");
        assert_eq!(config.offline_url, "/");
        assert_eq!(config.install_trigger_id, "pwa-install-button");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = PwaConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, PwaConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = PwaConfig {
            origin: "https://szalas.test".to_string(),
            ..PwaConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(PwaConfig::load_from(&path).unwrap(), config);
    }
}
