//! Thin real-disk implementation of [`PlannerFs`]. Included for
//! completeness of the trait contract — a second conforming provider to
//! typecheck against — but is explicitly out of scope for deep testing;
//! the in-memory [`crate::vfs::Vfs`] carries the dry-run semantics that
//! matter in practice.

use crate::diagnostics::ExecSignal;
use crate::fs::PlannerFs;
use crate::model::{IssueCategory, Severity, ValidationIssue};
use crate::path;
use std::path::Path;

pub struct RealDiskFs {
    issues: Vec<ValidationIssue>,
    now_millis_fn: fn() -> u64,
}

impl RealDiskFs {
    pub fn new(now_millis_fn: fn() -> u64) -> Self {
        Self {
            issues: Vec::new(),
            now_millis_fn,
        }
    }

    fn now(&self) -> u64 {
        (self.now_millis_fn)()
    }
}

impl PlannerFs for RealDiskFs {
    fn file_exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn dir_exists(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn create_dir(&mut self, path: &str) {
        let _ = std::fs::create_dir_all(path);
    }

    fn copy_file(&mut self, src: &str, dst: &str, overwrite: bool) {
        if !self.file_exists(src) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::CopyFile,
                format!("source file does not exist: {src}"),
                now,
            ));
            return;
        }
        if self.file_exists(dst) && !overwrite {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::CopyFile,
                format!("destination exists without overwrite: {dst}"),
                now,
            ));
            return;
        }
        if let Some(parent) = Path::new(dst).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::copy(src, dst) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::CopyFile,
                format!("copy failed: {e}"),
                now,
            ));
        }
    }

    fn move_file(&mut self, src: &str, dst: &str, overwrite: bool) {
        if !self.file_exists(src) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::MoveFile,
                format!("source file does not exist: {src}"),
                now,
            ));
            return;
        }
        if self.file_exists(dst) && !overwrite {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::MoveFile,
                format!("destination exists without overwrite: {dst}"),
                now,
            ));
            return;
        }
        if let Some(parent) = Path::new(dst).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::rename(src, dst) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::MoveFile,
                format!("move failed: {e}"),
                now,
            ));
        }
    }

    fn delete_file(&mut self, path: &str) {
        if !self.file_exists(path) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Warning,
                IssueCategory::DeleteFile,
                format!("file to delete does not exist: {path}"),
                now,
            ));
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::DeleteFile,
                format!("delete failed: {e}"),
                now,
            ));
        }
    }

    fn rename_file(&mut self, src: &str, new_name: &str) {
        if !self.file_exists(src) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::RenameFile,
                format!("source file does not exist: {src}"),
                now,
            ));
            return;
        }
        let dst = Path::new(src).with_file_name(new_name);
        if let Err(e) = std::fs::rename(src, &dst) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::RenameFile,
                format!("rename failed: {e}"),
                now,
            ));
        }
    }

    fn extract_archive(&mut self, archive_path: &str, dst_dir: &str) {
        use crate::archive::{open_archive_reader, ArchiveKind};
        let kind = ArchiveKind::from_path(archive_path);
        let reader = match open_archive_reader(kind, Path::new(archive_path)) {
            Ok(r) => r,
            Err(e) => {
                let now = self.now();
                self.log_issue(ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::ExtractArchive,
                    format!("failed to open archive: {e}"),
                    now,
                ));
                return;
            }
        };
        let _ = std::fs::create_dir_all(dst_dir);
        if let Err(e) = reader.extract_all(Path::new(dst_dir)) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::ExtractArchive,
                format!("extraction failed: {e}"),
                now,
            ));
        }
    }

    fn enumerate(
        &self,
        patterns: &[String],
        include_subfolders: bool,
    ) -> Result<Vec<String>, ExecSignal> {
        let mut matched = Vec::new();
        let mut unresolved = Vec::new();
        for pattern in patterns {
            // Resolve against whatever real root the pattern's own
            // directory component names; this is deliberately shallow
            // since RealDiskFs is not exercised by tests in depth.
            let dir = Path::new(pattern)
                .parent()
                .unwrap_or_else(|| Path::new("."));
            let mut any = false;
            if dir.is_dir() {
                let walker: Box<dyn Iterator<Item = walkdir::DirEntry>> = if include_subfolders {
                    Box::new(walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
                } else {
                    Box::new(
                        walkdir::WalkDir::new(dir)
                            .max_depth(1)
                            .into_iter()
                            .filter_map(|e| e.ok()),
                    )
                };
                for entry in walker {
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    let p = entry.path().to_string_lossy().to_string();
                    if path::matches(&p, pattern) {
                        matched.push(path::normalize(&p).into_inner());
                        any = true;
                    }
                }
            }
            if !any {
                unresolved.push(pattern.clone());
            }
        }
        if !unresolved.is_empty() {
            return Err(ExecSignal::WildcardPatternNotFound {
                patterns: unresolved,
            });
        }
        matched.sort();
        matched.dedup();
        Ok(matched)
    }

    fn known_files(&self) -> Vec<String> {
        Vec::new()
    }

    fn log_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    fn take_issues(&mut self) -> Vec<ValidationIssue> {
        std::mem::take(&mut self.issues)
    }
}
