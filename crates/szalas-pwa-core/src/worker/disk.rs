//! On-disk cache storage.
//!
//! Each generation is one JSON file under the cache directory. Entries carry
//! the time they were stored so the harness can show their age. Writes go
//! through a temp file and rename, so a batch either lands whole or not at all.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{PwaError, Result};
use crate::http::{CacheKey, Request, Response};
use crate::worker::cache::{check_storable, Cache, CacheStorage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: CacheKey,
    pub response: CachedData<Response>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GenerationFile {
    name: String,
    created_at: Option<DateTime<Utc>>,
    entries: BTreeMap<String, StoredEntry>,
}

/// File name for a generation. Lowercase ASCII letters, digits, `-` and `_`
/// are kept; every other byte becomes `%XX` with uppercase hex. `%` itself is
/// always escaped, so distinct names never share a file, even on
/// case-insensitive file systems.
fn file_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len() + 5);
    for byte in name.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || matches!(byte, b'-' | b'_') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded.push_str(".json");
    encoded
}

fn read_generation(path: &Path) -> Result<Option<GenerationFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

fn write_generation(path: &Path, generation: &GenerationFile) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(generation)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// List the generations in `dir`, oldest first. Files that are not readable
/// generations, or whose stored name does not map back to their file name,
/// are skipped.
fn list_generations(dir: &Path) -> Result<Vec<String>> {
    let mut generations = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let generation = match read_generation(&path) {
            Ok(Some(generation)) => generation,
            Ok(None) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable cache file");
                continue;
            }
        };
        let expected = file_name(&generation.name);
        if path.file_name().and_then(|n| n.to_str()) != Some(expected.as_str()) {
            warn!(path = %path.display(), cache = %generation.name, "Skipping misnamed cache file");
            continue;
        }
        generations.push((generation.created_at, generation.name));
    }
    generations.sort();
    Ok(generations.into_iter().map(|(_, name)| name).collect())
}

/// Run blocking file work off the async worker threads.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PwaError::Cache(format!("Cache file task failed: {}", e)))?
}

pub struct DiskCache {
    name: String,
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DiskCache {
    /// Stored entries with their timestamps, ordered by key
    pub async fn entries(&self) -> Result<Vec<StoredEntry>> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let generation = blocking(move || read_generation(&path)).await?;
        Ok(generation
            .map(|g| g.entries.into_values().collect())
            .unwrap_or_default())
    }

    async fn store(&self, entries: Vec<(Request, Response)>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let name = self.name.clone();
        blocking(move || {
            let mut generation = read_generation(&path)?.unwrap_or_else(|| GenerationFile {
                name,
                created_at: Some(Utc::now()),
                entries: BTreeMap::new(),
            });
            for (request, response) in entries {
                let key = request.key();
                generation.entries.insert(
                    key.to_string(),
                    StoredEntry {
                        key,
                        response: CachedData::new(response),
                    },
                );
            }
            write_generation(&path, &generation)
        })
        .await
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        let _guard = self.lock.lock().await;
        let key = request.key().to_string();
        let path = self.path.clone();
        let generation = blocking(move || read_generation(&path)).await?;
        Ok(generation
            .and_then(|mut g| g.entries.remove(&key))
            .map(|entry| entry.response.data.from_cache()))
    }

    async fn put(&self, request: &Request, response: Response) -> Result<()> {
        check_storable(request, &response)?;
        self.store(vec![(request.clone(), response)]).await
    }

    async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<()> {
        for (request, response) in &entries {
            check_storable(request, response)?;
        }
        self.store(entries).await
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        Ok(self.entries().await?.into_iter().map(|e| e.key).collect())
    }
}

/// Cache storage rooted at a directory, one file per generation.
pub struct DiskCacheStorage {
    cache_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DiskCacheStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            lock: Arc::new(Mutex::new(())),
        })
    }

    fn generation_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(file_name(name))
    }

    /// Open a generation as the concrete type, for entry listings
    pub async fn open_disk(&self, name: &str) -> Result<DiskCache> {
        let path = self.generation_path(name);
        {
            let _guard = self.lock.lock().await;
            let path = path.clone();
            let name = name.to_string();
            blocking(move || {
                if let Some(existing) = read_generation(&path)? {
                    if existing.name != name {
                        return Err(PwaError::Cache(format!(
                            "{} holds generation '{}', not '{}'",
                            path.display(),
                            existing.name,
                            name
                        )));
                    }
                    return Ok(());
                }
                debug!(cache = %name, path = %path.display(), "Creating cache generation");
                write_generation(
                    &path,
                    &GenerationFile {
                        name,
                        created_at: Some(Utc::now()),
                        entries: BTreeMap::new(),
                    },
                )
            })
            .await?;
        }
        Ok(DiskCache {
            name: name.to_string(),
            path,
            lock: self.lock.clone(),
        })
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        Ok(Arc::new(self.open_disk(name).await?) as Arc<dyn Cache>)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let path = self.generation_path(name);
        blocking(move || Ok(path.exists())).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let dir = self.cache_dir.clone();
        blocking(move || list_generations(&dir)).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let path = self.generation_path(name);
        blocking(move || {
            if !path.exists() {
                return Ok(false);
            }
            std::fs::remove_file(path)?;
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_rounding() {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");
        cached.cached_at = Utc::now() - Duration::minutes(61);
        assert_eq!(cached.age_display(), "1h ago");
        cached.cached_at = Utc::now() - Duration::days(3);
        assert_eq!(cached.age_display(), "3d ago");
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(file_name("szalas-app-cache-v1"), "szalas-app-cache-v1.json");
        assert_eq!(file_name("a/b c"), "a%2Fb%20c.json");
        assert_eq!(file_name("V1.0"), "%561%2E0.json");
    }

    #[tokio::test]
    async fn test_put_and_match_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::get("https://app.test/");
        {
            let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
            let cache = storage.open("v1").await.unwrap();
            cache.put(&req, Response::new(200, "home")).await.unwrap();
        }

        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        let cache = storage.open("v1").await.unwrap();
        let hit = cache.match_request(&req).await.unwrap().unwrap();
        assert_eq!(hit.text(), "home");
        assert_eq!(hit.source, crate::http::ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_keys_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("v1").await.unwrap();
        storage.open("v2").await.unwrap();

        let mut keys = storage.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["v1", "v2"]);
        assert!(storage.has("v1").await.unwrap());

        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.has("v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_entries_carry_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        let cache = storage.open_disk("v1").await.unwrap();
        cache
            .put_all(vec![
                (Request::get("https://app.test/a"), Response::new(200, "a")),
                (Request::get("https://app.test/b"), Response::new(200, "b")),
            ])
            .await
            .unwrap();

        let entries = cache.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.url, "https://app.test/a");
        assert_eq!(entries[0].response.age_display(), "just now");
    }

    #[tokio::test]
    async fn test_similar_names_are_separate_generations() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        let req = Request::get("https://app.test/");

        let old = storage.open("app_cache_v2").await.unwrap();
        old.put(&req, Response::new(200, "old")).await.unwrap();
        let current = storage.open("app cache v2").await.unwrap();
        current.put(&req, Response::new(200, "new")).await.unwrap();

        let mut keys = storage.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["app cache v2", "app_cache_v2"]);

        assert!(storage.delete("app_cache_v2").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["app cache v2"]);
        let hit = current.match_request(&req).await.unwrap().unwrap();
        assert_eq!(hit.text(), "new");
    }

    #[tokio::test]
    async fn test_keys_skip_foreign_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("v0").await.unwrap();
        std::fs::write(dir.path().join("notes.json"), r#"{"x":1}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "hello").unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["v0"]);
    }

    #[tokio::test]
    async fn test_open_rejects_file_holding_another_generation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("v1").await.unwrap();

        // Hand-edited file claiming a different name
        let path = dir.path().join("v1.json");
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replace("\"v1\"", "\"v9\"")).unwrap();

        assert!(matches!(storage.open("v1").await, Err(PwaError::Cache(_))));
        assert!(storage.keys().await.unwrap().is_empty());
    }
}
