//! Resource index: `MetadataHash -> ResourceMetadata`, `ContentId ->
//! ResourceMetadata`, and `MetadataHash -> ContentId`, persisted to
//! `resource-index.json`.

use super::lock::FileLockGuard;
use super::{atomic_write_json, load_json_or_default};
use crate::diagnostics::CacheError;
use crate::model::{ResourceMetadata, TrustLevel, RESOURCE_INDEX_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
struct ResourceIndexFile {
    schema_version: u32,
    last_saved_millis: u64,
    entries: HashMap<String, ResourceMetadata>,
    mappings: HashMap<String, String>,
}

impl Default for ResourceIndexFile {
    fn default() -> Self {
        Self {
            schema_version: RESOURCE_INDEX_SCHEMA_VERSION,
            last_saved_millis: 0,
            entries: HashMap::new(),
            mappings: HashMap::new(),
        }
    }
}

struct State {
    /// keyed by metadata_hash
    entries: HashMap<String, ResourceMetadata>,
    /// metadata_hash -> content_id
    mappings: HashMap<String, String>,
}

/// Singleton-of-record (spec §9 design note): constructed once and
/// threaded through by reference; never a `static`/`OnceLock` global.
pub struct ResourceIndex {
    path: PathBuf,
    /// Held for the whole object's lifetime, covering both the `load`
    /// that populated `inner` and every later `save` (spec §4.7: "the
    /// lock covers both load and save"). Released when the index is
    /// dropped.
    _lock: FileLockGuard,
    inner: Mutex<State>,
}

pub enum Observation {
    Inserted,
    Elevated { from: TrustLevel, to: TrustLevel },
    ConflictReplaced,
    ConflictKept,
}

impl ResourceIndex {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        let lock = FileLockGuard::acquire(&lock_path)?;
        let file: ResourceIndexFile = load_json_or_default(&path);
        Ok(Self {
            path,
            _lock: lock,
            inner: Mutex::new(State {
                entries: file.entries,
                mappings: file.mappings,
            }),
        })
    }

    pub fn by_metadata_hash(&self, metadata_hash: &str) -> Option<ResourceMetadata> {
        self.inner.lock().unwrap().entries.get(metadata_hash).cloned()
    }

    pub fn by_content_id(&self, content_id: &str) -> Option<ResourceMetadata> {
        let state = self.inner.lock().unwrap();
        state
            .entries
            .values()
            .find(|m| m.content_id == content_id)
            .cloned()
    }

    /// Records an observation of `new_metadata`, applying the trust
    /// elevation / conflict rules from spec §4.7.
    pub fn observe(&self, new_metadata: ResourceMetadata) -> Observation {
        let mut state = self.inner.lock().unwrap();
        let key = new_metadata.metadata_hash.clone();

        let Some(existing) = state.entries.get(&key).cloned() else {
            let mut inserted = new_metadata;
            inserted.trust = TrustLevel::ObservedOnce;
            state
                .mappings
                .insert(key.clone(), inserted.content_id.clone());
            state.entries.insert(key, inserted);
            return Observation::Inserted;
        };

        if existing.content_id == new_metadata.content_id {
            let from = existing.trust;
            let to = match existing.trust {
                TrustLevel::Unverified => TrustLevel::ObservedOnce,
                TrustLevel::ObservedOnce => TrustLevel::Verified,
                TrustLevel::Verified => TrustLevel::Verified,
            };
            let mut updated = existing;
            updated.trust = to;
            updated.last_verified_millis = new_metadata.last_verified_millis;
            updated.filenames.extend(new_metadata.filenames);
            state.entries.insert(key, updated);
            Observation::Elevated { from, to }
        } else if existing.trust == TrustLevel::Verified {
            Observation::ConflictKept
        } else {
            let mut replacement = new_metadata;
            replacement.trust = TrustLevel::ObservedOnce;
            state
                .mappings
                .insert(key.clone(), replacement.content_id.clone());
            state.entries.insert(key, replacement);
            Observation::ConflictReplaced
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_file_size(&self) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter_map(|m| m.file_size)
            .sum()
    }

    pub fn all_entries(&self) -> Vec<ResourceMetadata> {
        self.inner.lock().unwrap().entries.values().cloned().collect()
    }

    pub fn remove(&self, metadata_hash: &str) {
        let mut state = self.inner.lock().unwrap();
        state.entries.remove(metadata_hash);
        state.mappings.remove(metadata_hash);
    }

    /// Writes `metadata` verbatim, bypassing the trust-elevation rules in
    /// [`Self::observe`]. For callers that have already computed the
    /// correct trust themselves (GC's downgrade pass) rather than
    /// reporting a fresh observation.
    pub fn set(&self, metadata: ResourceMetadata) {
        let mut state = self.inner.lock().unwrap();
        let key = metadata.metadata_hash.clone();
        state.mappings.insert(key.clone(), metadata.content_id.clone());
        state.entries.insert(key, metadata);
    }

    pub fn save(&self, now_millis: u64) -> Result<(), CacheError> {
        let state = self.inner.lock().unwrap();
        let file = ResourceIndexFile {
            schema_version: RESOURCE_INDEX_SCHEMA_VERSION,
            last_saved_millis: now_millis,
            entries: state.entries.clone(),
            mappings: state.mappings.clone(),
        };
        atomic_write_json(&self.path, &file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
