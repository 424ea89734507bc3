//! URL → [`DownloadCacheEntry`] persisted index, `download-cache.json`.

use super::lock::FileLockGuard;
use super::{atomic_write_json, load_json_or_default};
use crate::diagnostics::CacheError;
use crate::model::DownloadCacheEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct DownloadCacheFile {
    #[serde(flatten)]
    entries: HashMap<String, DownloadCacheEntry>,
}

/// Singleton-of-record: constructed once by the CLI/embedding app and
/// threaded through by reference, never accessed via `static`/`OnceLock`.
pub struct DownloadCache {
    path: PathBuf,
    /// Held for the whole object's lifetime: the lock covers both the
    /// `load` that populated `inner` and every later `save`, per spec
    /// §4.7 ("the lock covers both load and save"). Released when the
    /// cache is dropped.
    _lock: FileLockGuard,
    inner: Mutex<HashMap<String, DownloadCacheEntry>>,
}

impl DownloadCache {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        let lock = FileLockGuard::acquire(&lock_path)?;
        let file: DownloadCacheFile = load_json_or_default(&path);
        Ok(Self {
            path,
            _lock: lock,
            inner: Mutex::new(file.entries),
        })
    }

    pub fn get(&self, url: &str) -> Option<DownloadCacheEntry> {
        self.inner.lock().unwrap().get(url).cloned()
    }

    pub fn insert(&self, entry: DownloadCacheEntry) {
        self.inner.lock().unwrap().insert(entry.url.clone(), entry);
    }

    pub fn provider_entries(&self, provider_url_prefix: Option<&str>) -> Vec<DownloadCacheEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .values()
            .filter(|e| provider_url_prefix.map(|p| e.url.starts_with(p)).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn clear(&self, provider_url_prefix: Option<&str>) -> usize {
        let mut inner = self.inner.lock().unwrap();
        match provider_url_prefix {
            Some(prefix) => {
                let before = inner.len();
                inner.retain(|url, _| !url.starts_with(prefix));
                before - inner.len()
            }
            None => {
                let removed = inner.len();
                inner.clear();
                removed
            }
        }
    }

    pub fn save(&self) -> Result<(), CacheError> {
        let entries = self.inner.lock().unwrap().clone();
        atomic_write_json(&self.path, &DownloadCacheFile { entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(url: &str, name: &str) -> DownloadCacheEntry {
        DownloadCacheEntry {
            url: url.to_string(),
            file_name: name.to_string(),
            is_archive_file: true,
            extract_instruction_guid: None,
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("download-cache.json");
        {
            let cache = DownloadCache::load(&path).unwrap();
            cache.insert(entry("https://example.com/a", "a.zip"));
            cache.save().unwrap();
        }
        let reloaded = DownloadCache::load(&path).unwrap();
        assert_eq!(reloaded.get("https://example.com/a").unwrap().file_name, "a.zip");
    }

    #[test]
    fn clear_with_provider_prefix_only_removes_matching() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("download-cache.json");
        let cache = DownloadCache::load(&path).unwrap();
        cache.insert(entry("https://nexus.example/a", "a.zip"));
        cache.insert(entry("https://other.example/b", "b.zip"));
        let removed = cache.clear(Some("https://nexus.example"));
        assert_eq!(removed, 1);
        assert!(cache.get("https://other.example/b").is_some());
    }
}
