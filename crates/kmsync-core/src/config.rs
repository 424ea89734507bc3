//! Plan document loading (TOML) and the run-wide planner configuration.
//! JSON-schema generation via `schemars` mirrors the teacher's own
//! `schemars`-derived config types, so downstream tools can validate a
//! plan document before handing it to `kmsync`.

use crate::model::Component;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read plan document: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse plan document: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The top-level document an author hands to `kmsync plan`: the set of
/// components plus the two filesystem roots every path placeholder
/// resolves against.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanDocument {
    pub kotor_install_root: PathBuf,
    pub mod_archive_dir: PathBuf,
    /// Overrides `<app-data>/KOTORModSync` for cache/index persistence.
    #[serde(default)]
    pub app_data_root: Option<PathBuf>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl PlanDocument {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let doc: PlanDocument = toml::from_str(&text)?;
        Ok(doc)
    }

    pub fn selected_components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.selected)
    }
}

/// Resolves the app-data root (`<app-data>/KOTORModSync/`), honoring the
/// `KMSYNC_APP_DATA_DIR` environment override used by tests and by
/// operators who want an alternate root.
pub fn resolve_app_data_root(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    if let Ok(env_dir) = std::env::var("KMSYNC_APP_DATA_DIR") {
        return PathBuf::from(env_dir);
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("KOTORModSync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_minimal_plan_document() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            kotor_install_root = "C:\\Games\\KOTOR"
            mod_archive_dir = "C:\\Mods"
            "#
        )
        .unwrap();
        let doc = PlanDocument::load(file.path()).unwrap();
        assert!(doc.components.is_empty());
        assert!(doc.app_data_root.is_none());
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not = = valid toml").unwrap();
        assert!(PlanDocument::load(file.path()).is_err());
    }

    #[test]
    fn app_data_root_respects_env_override() {
        std::env::set_var("KMSYNC_APP_DATA_DIR", "/tmp/kmsync-test-override");
        let root = resolve_app_data_root(None);
        assert_eq!(root, PathBuf::from("/tmp/kmsync-test-override"));
        std::env::remove_var("KMSYNC_APP_DATA_DIR");
    }

    #[test]
    fn app_data_root_explicit_override_wins_over_env() {
        std::env::set_var("KMSYNC_APP_DATA_DIR", "/tmp/should-not-be-used");
        let root = resolve_app_data_root(Some(Path::new("/tmp/explicit")));
        assert_eq!(root, PathBuf::from("/tmp/explicit"));
        std::env::remove_var("KMSYNC_APP_DATA_DIR");
    }
}
