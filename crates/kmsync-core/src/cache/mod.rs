//! Resource cache & index (C7): two persisted indices, both guarded by a
//! cross-platform file lock and written atomically (serialize → `.tmp` →
//! rename, keeping one `.bak`).

pub mod download_cache;
pub mod gc;
pub mod lock;
pub mod resource_index;

pub use download_cache::DownloadCache;
pub use resource_index::ResourceIndex;

use crate::diagnostics::CacheError;
use serde::Serialize;
use std::path::Path;

/// Serializes `value` to `path` atomically: write `path.tmp`, keep the
/// previous contents at `path.bak`, then rename `.tmp` over `path`.
pub(crate) fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &bytes)?;
    if path.exists() {
        let bak_path = path.with_extension("bak");
        let _ = std::fs::copy(path, &bak_path);
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Loads JSON state from `path`. Corruption produces a warning (logged by
/// the caller) and falls back to `Default::default()` rather than
/// crashing.
pub(crate) fn load_json_or_default<T>(path: &Path) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => T::default(),
    }
}
