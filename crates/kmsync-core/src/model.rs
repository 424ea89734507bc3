//! Core data model: components, instructions, options, and the archive/
//! resource metadata types that feed the planner.
//!
//! See spec §3 for the authoritative attribute list. Ids are `Uuid`-backed
//! newtypes rather than bare strings so arena lookups (§9 design note on
//! parent back-references) are type-checked instead of stringly-typed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ComponentId);
id_newtype!(InstructionId);
id_newtype!(OptionId);

/// The kind of operation an [`Instruction`] performs. A closed tagged
/// variant (spec §9 design note: "reflection-like behavior... maps to a
/// closed tagged variant for action kinds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ActionKind {
    Extract,
    Move,
    Copy,
    Delete,
    Rename,
    Patcher,
    Execute,
    Choose,
    DelDuplicate,
}

impl ActionKind {
    /// Whether `destination` is meaningful for this action.
    pub fn uses_destination(self) -> bool {
        matches!(
            self,
            ActionKind::Move | ActionKind::Copy | ActionKind::Patcher
        )
    }

    /// Whether `arguments` is meaningful for this action.
    pub fn uses_arguments(self) -> bool {
        matches!(self, ActionKind::Rename | ActionKind::Patcher)
    }

    /// Whether `overwrite` is meaningful for this action.
    pub fn uses_overwrite(self) -> bool {
        matches!(self, ActionKind::Move | ActionKind::Copy)
    }
}

/// A single planned operation. See spec §3.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Instruction {
    pub id: InstructionId,
    pub action: ActionKind,
    /// Pattern-bearing source paths. For `Choose`, these are [`OptionId`]s
    /// encoded as their string form rather than paths.
    pub source: Vec<String>,
    pub destination: Option<String>,
    pub arguments: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    /// Missing source matches are tolerated rather than an issue.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub dependencies: HashSet<InstructionId>,
    #[serde(default)]
    pub restrictions: HashSet<InstructionId>,
}

impl Instruction {
    pub fn new(action: ActionKind, source: Vec<String>) -> Self {
        Self {
            id: InstructionId::new(),
            action,
            source,
            destination: None,
            arguments: None,
            overwrite: false,
            optional: false,
            dependencies: HashSet::new(),
            restrictions: HashSet::new(),
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Option ids referenced by a `Choose` instruction's source list.
    pub fn choose_option_ids(&self) -> Vec<OptionId> {
        if self.action != ActionKind::Choose {
            return Vec::new();
        }
        self.source
            .iter()
            .filter_map(|s| Uuid::parse_str(s).ok().map(OptionId))
            .collect()
    }
}

/// A user-selectable alternative inside a `Choose`. See spec §3/§4.5.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Option_ {
    pub id: OptionId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub selected: bool,
    pub instructions: Vec<Instruction>,
}

impl Option_ {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OptionId::new(),
            name: name.into(),
            description: String::new(),
            selected: false,
            instructions: Vec::new(),
        }
    }
}

/// Installation method reported by the Auto-Generator. A closed enum
/// (rather than a free string) whose `Display` produces the original
/// string values for persistence/serialization compatibility.
///
/// Open question (spec §9): once a Hybrid archive run sets this, it is
/// never downgraded back to a single method even if a later run only
/// detects loose files. Preserved as-is; see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum InstallationMethod {
    #[default]
    Unknown,
    TslPatcher,
    Override,
    Hybrid,
    DelDuplicate,
}

impl fmt::Display for InstallationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallationMethod::Unknown => "Unknown",
            InstallationMethod::TslPatcher => "TSLPatcher",
            InstallationMethod::Override => "Override",
            InstallationMethod::Hybrid => "Hybrid",
            InstallationMethod::DelDuplicate => "DelDuplicate",
        };
        write!(f, "{s}")
    }
}

/// Per-URL filename policy: whether the resolved filename should be taken
/// verbatim from the provider or pinned to an author-declared override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilenamePolicy {
    /// URL -> pinned filename override, when the author wants a specific
    /// on-disk name regardless of what the provider resolves to.
    #[serde(default)]
    pub overrides: std::collections::HashMap<String, String>,
}

/// A selectable unit (a mod). See spec §3.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub mod_links: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub options: Vec<Option_>,
    #[serde(default)]
    pub dependencies: HashSet<ComponentId>,
    #[serde(default)]
    pub restrictions: HashSet<ComponentId>,
    #[serde(default)]
    pub filename_policy: FilenamePolicy,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub installation_method: InstallationMethod,
}

impl Component {
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: ComponentId::new(),
            name: name.into(),
            author: author.into(),
            mod_links: Vec::new(),
            instructions: Vec::new(),
            options: Vec::new(),
            dependencies: HashSet::new(),
            restrictions: HashSet::new(),
            filename_policy: FilenamePolicy::default(),
            selected: false,
            installation_method: InstallationMethod::Unknown,
        }
    }

    /// Find an option by id anywhere in this component's `Choose`
    /// instructions (arena-style lookup, spec §9).
    pub fn find_option(&self, id: OptionId) -> Option<&Option_> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn find_option_mut(&mut self, id: OptionId) -> Option<&mut Option_> {
        self.options.iter_mut().find(|o| o.id == id)
    }

    /// All `Extract` source patterns across the component and every one of
    /// its options, used by download-necessity analysis (§4.6).
    pub fn all_extract_patterns(&self) -> Vec<String> {
        let mut out = Vec::new();
        for instr in &self.instructions {
            if instr.action == ActionKind::Extract {
                out.extend(instr.source.iter().cloned());
            }
        }
        for opt in &self.options {
            for instr in &opt.instructions {
                if instr.action == ActionKind::Extract {
                    out.extend(instr.source.iter().cloned());
                }
            }
        }
        out
    }
}

/// Severity of a [`ValidationIssue`]. Ordered `Critical < Error < Warning
/// < Info` is **not** how this is declared; severities are compared
/// explicitly via [`Severity::is_at_least_error`] rather than relying on
/// derive-order, since "most severe first" differs by call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn is_at_least_error(self) -> bool {
        self >= Severity::Error
    }
}

/// Category of a [`ValidationIssue`], one per executor/VFS operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    ExtractArchive,
    MoveFile,
    CopyFile,
    DeleteFile,
    RenameFile,
    Patcher,
    Execute,
    Choose,
}

/// A single entry in the VFS's append-only issue log. See spec §3/§7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    pub component_id: Option<ComponentId>,
    pub instruction_id: Option<InstructionId>,
    pub instruction_index: Option<usize>,
    /// Milliseconds since Unix epoch. Stamped by the caller (the core
    /// never calls `SystemTime::now()` directly inside pure functions) so
    /// tests remain deterministic.
    pub timestamp_millis: u64,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        message: impl Into<String>,
        timestamp_millis: u64,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            component_id: None,
            instruction_id: None,
            instruction_index: None,
            timestamp_millis,
        }
    }

    pub fn with_instruction(mut self, id: InstructionId, index: usize) -> Self {
        self.instruction_id = Some(id);
        self.instruction_index = Some(index);
        self
    }

    pub fn with_component(mut self, id: ComponentId) -> Self {
        self.component_id = Some(id);
        self
    }
}

/// Booleans and folder classification produced by the archive inspector
/// (C2). See spec §3/§4.2.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveAnalysis {
    pub has_tsl_patch_data: bool,
    pub has_namespaces_ini: bool,
    pub has_changes_ini: bool,
    pub has_simple_override_files: bool,
    pub has_flat_files: bool,
    /// Top-level folders containing at least one recognized game file.
    pub game_file_folders: Vec<String>,
    pub patcher_path: Option<String>,
    pub patcher_executable: Option<String>,
}

impl ArchiveAnalysis {
    pub fn is_hybrid(&self) -> bool {
        self.has_tsl_patch_data
            && (self.has_simple_override_files || self.has_flat_files)
    }
}

/// Trust level for a [`ResourceMetadata`] record. Ordered
/// `Unverified < ObservedOnce < Verified` (spec glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrustLevel {
    Unverified,
    ObservedOnce,
    Verified,
}

/// A resolved URL -> on-disk filename mapping. Persisted to
/// `download-cache.json` keyed by URL. See spec §3/§4.7/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadCacheEntry {
    pub url: String,
    pub file_name: String,
    pub is_archive_file: bool,
    #[serde(default)]
    pub extract_instruction_guid: Option<InstructionId>,
}

/// Per-resource provenance record. Persisted in `resource-index.json`
/// keyed by [`MetadataHash`]/[`ContentId`]. See spec §3/§4.7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub metadata_hash: String,
    pub content_id: String,
    pub content_hash_sha256: Option<String>,
    pub piece_length: Option<u64>,
    pub piece_hashes: Vec<String>,
    pub primary_url: String,
    #[serde(default)]
    pub handler_metadata: std::collections::HashMap<String, serde_json::Value>,
    pub file_size: Option<u64>,
    pub first_seen_millis: u64,
    pub last_verified_millis: u64,
    pub trust: TrustLevel,
    pub schema_version: u32,
    #[serde(default)]
    pub filenames: HashSet<String>,
}

pub const RESOURCE_INDEX_SCHEMA_VERSION: u32 = 1;

/// C6's successful output: every selected component in author-declared
/// order, each with its final instruction list and the set of URLs still
/// needing a download.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallPlan {
    pub entries: Vec<InstallPlanEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPlanEntry {
    pub component_id: ComponentId,
    pub component_name: String,
    pub instructions: Vec<Instruction>,
    pub needed_urls: HashSet<String>,
    pub outcome: PlanEntryOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanEntryOutcome {
    Clean,
    NonCriticalPathMismatch,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_kind_field_relevance() {
        assert!(ActionKind::Move.uses_destination());
        assert!(!ActionKind::Delete.uses_destination());
        assert!(ActionKind::Rename.uses_arguments());
        assert!(!ActionKind::Move.uses_arguments());
        assert!(ActionKind::Copy.uses_overwrite());
        assert!(!ActionKind::Extract.uses_overwrite());
    }

    #[test]
    fn installation_method_display_matches_source_strings() {
        assert_eq!(InstallationMethod::TslPatcher.to_string(), "TSLPatcher");
        assert_eq!(InstallationMethod::Hybrid.to_string(), "Hybrid");
    }

    #[test]
    fn severity_ordering_is_at_least_error() {
        assert!(!Severity::Warning.is_at_least_error());
        assert!(Severity::Error.is_at_least_error());
        assert!(Severity::Critical.is_at_least_error());
    }

    #[test]
    fn choose_option_ids_ignores_non_choose_instructions() {
        let instr = Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\*".into()]);
        assert!(instr.choose_option_ids().is_empty());
    }

    #[test]
    fn choose_option_ids_parses_uuids() {
        let opt_id = OptionId::new();
        let instr = Instruction::new(ActionKind::Choose, vec![opt_id.to_string()]);
        assert_eq!(instr.choose_option_ids(), vec![opt_id]);
    }

    #[test]
    fn archive_analysis_hybrid_detection() {
        let mut a = ArchiveAnalysis {
            has_tsl_patch_data: true,
            ..Default::default()
        };
        assert!(!a.is_hybrid());
        a.has_flat_files = true;
        assert!(a.is_hybrid());
    }

    #[test]
    fn component_all_extract_patterns_includes_options() {
        let mut c = Component::new("Test", "Author");
        c.instructions
            .push(Instruction::new(ActionKind::Extract, vec!["a.zip".into()]));
        let mut opt = Option_::new("Opt A");
        opt.instructions
            .push(Instruction::new(ActionKind::Extract, vec!["b.zip".into()]));
        c.options.push(opt);

        let patterns = c.all_extract_patterns();
        assert_eq!(patterns, vec!["a.zip".to_string(), "b.zip".to_string()]);
    }
}
