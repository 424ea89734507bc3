//! Cross-platform advisory file locking via `fs2`, guarding both load and
//! save of the resource cache/index's persisted JSON files.

use crate::diagnostics::CacheError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

pub struct FileLockGuard {
    file: File,
}

impl FileLockGuard {
    /// Acquires an exclusive, non-blocking lock on `lock_path`, creating
    /// it if absent. Returns `CacheError::Locked` rather than blocking —
    /// contention is the caller's responsibility to pace or fail loudly.
    pub fn acquire(lock_path: &Path) -> Result<Self, CacheError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)?;
        if let Err(e) = file.try_lock_exclusive() {
            tracing::warn!("cache lock held by another process: {} ({e})", lock_path.display());
            return Err(CacheError::Locked);
        }
        tracing::debug!("acquired cache lock: {}", lock_path.display());
        Ok(Self { file })
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
