//! The file-system interface consumed by the executor (C4) and produced
//! by two providers: [`crate::vfs::Vfs`] (in-memory) and
//! [`crate::real_fs::RealDiskFs`] (thin real-disk delegate). See spec
//! §4.3/§6.

use crate::diagnostics::ExecSignal;
use crate::model::ValidationIssue;

/// Operations the executor needs from a file-system provider. Mutating
/// operations never return an error for "ordinary" precondition failures
/// (missing source, destination exists without overwrite) — those are
/// logged as a [`ValidationIssue`] via [`PlannerFs::log_issue`] instead.
/// The only operation that returns an exceptional signal is `enumerate`,
/// because upstream auto-repair pivots on `WildcardPatternNotFound`.
pub trait PlannerFs {
    fn file_exists(&self, path: &str) -> bool;
    fn dir_exists(&self, path: &str) -> bool;

    /// Idempotent; creates parent directories as needed.
    fn create_dir(&mut self, path: &str);

    fn copy_file(&mut self, src: &str, dst: &str, overwrite: bool);
    fn move_file(&mut self, src: &str, dst: &str, overwrite: bool);
    fn delete_file(&mut self, path: &str);
    fn rename_file(&mut self, src: &str, new_name: &str);

    /// Scans the archive's content set (lazily on first reference) and
    /// adds every entry under `dst_dir/` to the file set, creating
    /// intermediate directories. Logs an issue on a corrupted archive
    /// rather than returning an error; no entries are added in that case.
    fn extract_archive(&mut self, archive_path: &str, dst_dir: &str);

    /// Resolves each pattern (already placeholder-substituted by the
    /// caller) against the known file set. Returns the concrete matches.
    /// A pattern that matches nothing contributes to the returned
    /// `WildcardPatternNotFound` signal rather than an issue.
    fn enumerate(
        &self,
        patterns: &[String],
        include_subfolders: bool,
    ) -> Result<Vec<String>, ExecSignal>;

    /// All known file paths, for tests and download-necessity analysis.
    fn known_files(&self) -> Vec<String>;

    fn log_issue(&mut self, issue: ValidationIssue);
    fn issues(&self) -> &[ValidationIssue];
    fn take_issues(&mut self) -> Vec<ValidationIssue>;
}

