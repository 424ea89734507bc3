//! Planner context: bundles the dependencies a full plan run needs —
//! config, the two persisted caches, and the filesystem roots — mirroring
//! the teacher's `ValidatorContext` bundling pattern (config + fs +
//! root_dir) one level up, at the plan-run boundary rather than the
//! single-validator boundary.

use crate::cache::{DownloadCache, ResourceIndex};
use crate::config::PlanDocument;
use crate::exec::ExecContext;
use std::path::PathBuf;

/// Everything a `plan` run needs beyond the component list itself.
pub struct PlannerContext {
    pub mod_archive_dir: PathBuf,
    pub kotor_install_root: PathBuf,
    pub app_data_root: PathBuf,
    pub download_cache: DownloadCache,
    pub resource_index: ResourceIndex,
}

impl PlannerContext {
    pub fn from_document(doc: &PlanDocument, app_data_root: PathBuf) -> Result<Self, crate::diagnostics::CacheError> {
        std::fs::create_dir_all(&app_data_root)?;
        let download_cache = DownloadCache::load(app_data_root.join("download-cache.json"))?;
        let resource_index = ResourceIndex::load(app_data_root.join("resource-index.json"))?;
        Ok(Self {
            mod_archive_dir: doc.mod_archive_dir.clone(),
            kotor_install_root: doc.kotor_install_root.clone(),
            app_data_root,
            download_cache,
            resource_index,
        })
    }

    pub fn exec_context(&self, now_millis: u64) -> ExecContext {
        ExecContext::new(
            self.mod_archive_dir.to_string_lossy().to_string(),
            self.kotor_install_root.to_string_lossy().to_string(),
            now_millis,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn from_document_creates_app_data_root_and_loads_empty_caches() {
        let dir = tempdir().unwrap();
        let doc = PlanDocument {
            kotor_install_root: dir.path().join("kotor"),
            mod_archive_dir: dir.path().join("mods"),
            app_data_root: None,
            components: Vec::new(),
        };
        let app_data_root = dir.path().join("app-data");
        let ctx = PlannerContext::from_document(&doc, app_data_root.clone()).unwrap();
        assert!(app_data_root.is_dir());
        assert_eq!(ctx.resource_index.len(), 0);
    }
}
