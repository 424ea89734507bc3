//! In-memory virtual file system (C3): single-threaded,
//! exclusive-owner-per-run. Doubles as the production dry-run engine and
//! as the test fixture builder — dry-run *is* the product here, not a
//! test seam.

use crate::diagnostics::ExecSignal;
use crate::fs::PlannerFs;
use crate::model::{IssueCategory, Severity, ValidationIssue};
use crate::path;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Lazily-scanned contents of a tracked archive: entry path -> size.
#[derive(Debug, Clone, Default)]
pub struct ArchiveContents {
    pub entries: HashMap<String, u64>,
}

pub struct Vfs {
    files: HashSet<String>,
    dirs: HashSet<String>,
    /// archive path (normalized) -> lazily scanned contents.
    archive_cache: HashMap<String, ArchiveContents>,
    /// archive path -> directory it was last extracted into, for
    /// nested-folder detection in the validator's repair passes.
    tracked_archives: HashMap<String, String>,
    issues: Vec<ValidationIssue>,
    now_millis: u64,
}

impl Vfs {
    pub fn new(now_millis: u64) -> Self {
        Self {
            files: HashSet::new(),
            dirs: HashSet::new(),
            archive_cache: HashMap::new(),
            tracked_archives: HashMap::new(),
            issues: Vec::new(),
            now_millis,
        }
    }

    /// Enumerates a real root directory recursively and populates the
    /// file/directory sets. The VFS that results behaves identically to
    /// one built file-by-file, but in one pass.
    pub fn from_root(root: &Path, now_millis: u64) -> std::io::Result<Self> {
        let mut vfs = Self::new(now_millis);
        let root_norm = path::normalize(&root.to_string_lossy()).into_inner();
        for entry in walkdir::WalkDir::new(root).into_iter() {
            let entry = entry.map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;
            let p = path::normalize(&entry.path().to_string_lossy()).into_inner();
            if entry.file_type().is_dir() {
                vfs.ensure_dir(&p);
            } else {
                vfs.ensure_parent_dirs(&p);
                vfs.files.insert(p);
            }
        }
        vfs.ensure_dir(&root_norm);
        Ok(vfs)
    }

    /// Directly registers a file, for test fixture construction.
    pub fn add_file(&mut self, path: &str) -> &mut Self {
        let norm = path::normalize(path).into_inner();
        self.ensure_parent_dirs(&norm);
        self.files.insert(norm);
        self
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let norm = path::normalize(path).into_inner();
        self.ensure_dir(&norm);
        self
    }

    /// Registers a test-only archive with a fixed content listing,
    /// avoiding any real archive reader.
    pub fn add_archive_contents(&mut self, archive_path: &str, entries: Vec<(String, u64)>) {
        let norm = path::normalize(archive_path).into_inner();
        self.files.insert(norm.clone());
        self.archive_cache.insert(
            norm,
            ArchiveContents {
                entries: entries.into_iter().collect(),
            },
        );
    }

    fn ensure_dir(&mut self, normalized: &str) {
        self.dirs.insert(normalized.to_string());
        self.ensure_parent_dirs(normalized);
    }

    fn ensure_parent_dirs(&mut self, normalized: &str) {
        let mut parts: Vec<&str> = normalized.split('\\').filter(|s| !s.is_empty()).collect();
        while parts.len() > 1 {
            parts.pop();
            let parent = parts.join("\\");
            if parent.is_empty() {
                break;
            }
            if !self.dirs.insert(parent.clone()) {
                break;
            }
        }
    }

    pub fn tracked_archive_dest(&self, archive_path: &str) -> Option<&str> {
        let norm = path::normalize(archive_path).into_inner();
        self.tracked_archives.get(&norm).map(|s| s.as_str())
    }

    fn now(&self) -> u64 {
        self.now_millis
    }
}

impl PlannerFs for Vfs {
    fn file_exists(&self, path: &str) -> bool {
        let norm = path::normalize(path).into_inner().to_ascii_lowercase();
        self.files.iter().any(|f| f.to_ascii_lowercase() == norm)
    }

    fn dir_exists(&self, path: &str) -> bool {
        let norm = path::normalize(path).into_inner().to_ascii_lowercase();
        self.dirs.iter().any(|d| d.to_ascii_lowercase() == norm)
    }

    fn create_dir(&mut self, path: &str) {
        let norm = path::normalize(path).into_inner();
        self.ensure_dir(&norm);
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
        let norm = path::normalize(dst).into_inner();
        self.ensure_parent_dirs(&norm);
        self.files.insert(norm);
        tracing::debug!("copied {src} -> {dst}");
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
        let src_norm = path::normalize(src).into_inner().to_ascii_lowercase();
        self.files.retain(|f| f.to_ascii_lowercase() != src_norm);
        let dst_norm = path::normalize(dst).into_inner();
        self.ensure_parent_dirs(&dst_norm);
        self.files.insert(dst_norm);
        tracing::debug!("moved {src} -> {dst}");
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
        let norm = path::normalize(path).into_inner().to_ascii_lowercase();
        self.files.retain(|f| f.to_ascii_lowercase() != norm);
        tracing::debug!("deleted {path}");
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
        let src_norm = path::normalize(src).into_inner();
        let lower = src_norm.to_ascii_lowercase();
        self.files.retain(|f| f.to_ascii_lowercase() != lower);
        let mut parts: Vec<&str> = src_norm.split('\\').collect();
        if let Some(last) = parts.last_mut() {
            *last = new_name;
        }
        let renamed = parts.join("\\");
        self.files.insert(renamed);
        tracing::debug!("renamed {src} -> {new_name}");
    }

    fn extract_archive(&mut self, archive_path: &str, dst_dir: &str) {
        let archive_norm = path::normalize(archive_path).into_inner();
        if !self.files.contains(&archive_norm) {
            let now = self.now();
            self.log_issue(ValidationIssue::new(
                Severity::Error,
                IssueCategory::ExtractArchive,
                format!("archive does not exist: {archive_path}"),
                now,
            ));
            return;
        }
        let contents = match self.archive_cache.get(&archive_norm) {
            Some(c) => c.clone(),
            None => {
                // No lazily-opened reader is wired in the VFS itself
                // (archive reading is C2's job, invoked by the caller
                // before calling extract_archive); an archive with no
                // pre-registered contents extracts to an empty set.
                ArchiveContents::default()
            }
        };
        let dst_norm = path::normalize(dst_dir).into_inner();
        self.ensure_dir(&dst_norm);
        for entry in contents.entries.keys() {
            let entry_norm = path::normalize(entry).into_inner();
            let full = format!("{dst_norm}\\{entry_norm}");
            self.ensure_parent_dirs(&full);
            self.files.insert(full);
        }
        self.tracked_archives.insert(archive_norm, dst_norm);
        tracing::debug!("extracted {archive_path} -> {dst_dir}");
    }

    fn enumerate(
        &self,
        patterns: &[String],
        include_subfolders: bool,
    ) -> Result<Vec<String>, ExecSignal> {
        let mut matched = Vec::new();
        let mut unresolved = Vec::new();
        for pattern in patterns {
            let mut any = false;
            for file in &self.files {
                if !include_subfolders {
                    let pattern_depth = pattern.matches('\\').count();
                    let file_depth = file.matches('\\').count();
                    if file_depth > pattern_depth {
                        continue;
                    }
                }
                if path::matches(file, pattern) {
                    matched.push(file.clone());
                    any = true;
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
        let mut v: Vec<String> = self.files.iter().cloned().collect();
        v.sort();
        v
    }

    fn log_issue(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Critical | Severity::Error => tracing::error!("{}", issue.message),
            Severity::Warning => tracing::warn!("{}", issue.message),
            Severity::Info => tracing::debug!("{}", issue.message),
        }
        self.issues.push(issue);
    }

    fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    fn take_issues(&mut self) -> Vec<ValidationIssue> {
        std::mem::take(&mut self.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_requires_existing_source() {
        let mut vfs = Vfs::new(0);
        vfs.copy_file("a.txt", "b.txt", false);
        assert_eq!(vfs.issues().len(), 1);
        assert!(!vfs.file_exists("b.txt"));
    }

    #[test]
    fn copy_refuses_overwrite_without_flag() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("a.txt").add_file("b.txt");
        vfs.copy_file("a.txt", "b.txt", false);
        assert_eq!(vfs.issues().len(), 1);
        vfs.copy_file("a.txt", "b.txt", true);
        assert_eq!(vfs.issues().len(), 1, "second call with overwrite should not add another issue");
    }

    #[test]
    fn move_removes_source_and_creates_parent_dirs() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("src\\a.txt");
        vfs.move_file("src\\a.txt", "dst\\sub\\a.txt", false);
        assert!(!vfs.file_exists("src\\a.txt"));
        assert!(vfs.file_exists("dst\\sub\\a.txt"));
        assert!(vfs.dir_exists("dst\\sub"));
        assert!(vfs.dir_exists("dst"));
    }

    #[test]
    fn delete_missing_file_is_warning_not_error() {
        let mut vfs = Vfs::new(0);
        vfs.delete_file("missing.txt");
        assert_eq!(vfs.issues()[0].severity, Severity::Warning);
    }

    #[test]
    fn extract_archive_adds_entries_under_destination() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("mod.zip");
        vfs.add_archive_contents(
            "mod.zip",
            vec![("tslpatchdata\\changes.ini".to_string(), 10)],
        );
        vfs.extract_archive("mod.zip", "extracted\\mod");
        assert!(vfs.file_exists("extracted\\mod\\tslpatchdata\\changes.ini"));
    }

    #[test]
    fn enumerate_reports_unresolved_patterns_as_signal() {
        let vfs = Vfs::new(0);
        let result = vfs.enumerate(&["<<modDirectory>>\\*.2da".to_string()], true);
        assert!(matches!(result, Err(ExecSignal::WildcardPatternNotFound { .. })));
    }

    #[test]
    fn enumerate_matches_known_files() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("Override\\foo.2da");
        vfs.add_file("Override\\bar.tga");
        let result = vfs.enumerate(&["Override\\*.2da".to_string()], true).unwrap();
        assert_eq!(result, vec!["Override\\foo.2da".to_string()]);
    }
}
