//! Archive reading and inspection (C2). Enumerates entries lazily
//! without extracting, and classifies a mod archive's shape for the
//! auto-instruction generator (C5).

use crate::diagnostics::{message_indicates_corruption, ArchiveError};
use crate::model::ArchiveAnalysis;
use std::io::Read;
use std::path::Path;

/// The fixed KOTOR/Bethesda-engine game-file extension set (spec §4.2).
pub const GAME_FILE_EXTENSIONS: &[&str] = &[
    "2da", "are", "bik", "dds", "dlg", "erf", "git", "gui", "ifo", "jrl", "lip", "lyt", "mdl",
    "mdx", "mod", "ncs", "pth", "rim", "ssf", "tga", "tlk", "tpc", "txi", "utc", "utd", "ute",
    "uti", "utm", "utp", "uts", "utw", "vis", "wav",
];

fn extension_of(entry: &str) -> Option<String> {
    entry
        .rsplit('.')
        .next()
        .filter(|ext| *ext != entry)
        .map(|e| e.to_ascii_lowercase())
}

fn is_game_file(entry: &str) -> bool {
    extension_of(entry)
        .map(|ext| GAME_FILE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// A single non-directory archive entry.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub key: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Archive format dispatch, derived from file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZ,
    Rar,
    Unknown,
}

impl ArchiveKind {
    pub fn from_path(path: &str) -> Self {
        match extension_of(path).as_deref() {
            Some("zip") => ArchiveKind::Zip,
            Some("7z") => ArchiveKind::SevenZ,
            Some("rar") => ArchiveKind::Rar,
            _ => ArchiveKind::Unknown,
        }
    }
}

/// Reader interface consumed by the inspector and the real-disk executor.
pub trait ArchiveReader {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError>;
    fn extract_all(&self, dst_dir: &Path) -> Result<(), ArchiveError>;
}

pub struct ZipReader {
    path: std::path::PathBuf,
}

impl ZipReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ArchiveReader for ZipReader {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let file = std::fs::File::open(&self.path)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| map_zip_err(&e))?;
        let mut out = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|e| map_zip_err(&e))?;
            out.push(ArchiveEntry {
                key: entry.name().to_string(),
                size: entry.size(),
                is_dir: entry.is_dir(),
            });
        }
        Ok(out)
    }

    fn extract_all(&self, dst_dir: &Path) -> Result<(), ArchiveError> {
        let file = std::fs::File::open(&self.path)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| map_zip_err(&e))?;
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| map_zip_err(&e))?;
            let out_path = match entry.enclosed_name() {
                Some(p) => dst_dir.join(p),
                None => continue,
            };
            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out_file = std::fs::File::create(&out_path)?;
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            std::io::Write::write_all(&mut out_file, &buf)?;
        }
        Ok(())
    }
}

fn map_zip_err(e: &zip::result::ZipError) -> ArchiveError {
    let msg = e.to_string();
    if message_indicates_corruption(&msg) {
        ArchiveError::CorruptedArchive(msg)
    } else {
        ArchiveError::ReadFailed(msg)
    }
}

pub struct SevenZReader {
    path: std::path::PathBuf,
}

impl SevenZReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ArchiveReader for SevenZReader {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let reader = sevenz_rust::SevenZReader::open(&self.path, sevenz_rust::Password::empty())
            .map_err(|e| {
                let msg = e.to_string();
                if message_indicates_corruption(&msg) {
                    ArchiveError::CorruptedArchive(msg)
                } else {
                    ArchiveError::ReadFailed(msg)
                }
            })?;
        let out = reader
            .archive()
            .files
            .iter()
            .map(|f| ArchiveEntry {
                key: f.name().to_string(),
                size: f.size(),
                is_dir: f.is_directory(),
            })
            .collect();
        Ok(out)
    }

    fn extract_all(&self, dst_dir: &Path) -> Result<(), ArchiveError> {
        sevenz_rust::decompress_file(&self.path, dst_dir).map_err(|e| {
            let msg = e.to_string();
            if message_indicates_corruption(&msg) {
                ArchiveError::CorruptedArchive(msg)
            } else {
                ArchiveError::ReadFailed(msg)
            }
        })
    }
}

/// RAR support: no maintained pure-Rust decoder exists in the ecosystem.
/// Rather than fabricate a dependency, this always reports
/// `UnsupportedFormat`, which the inspector surfaces as a
/// [`crate::model::ValidationIssue`] instead of panicking.
pub struct RarReader;

impl ArchiveReader for RarReader {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        Err(ArchiveError::UnsupportedFormat("rar".to_string()))
    }

    fn extract_all(&self, _dst_dir: &Path) -> Result<(), ArchiveError> {
        Err(ArchiveError::UnsupportedFormat("rar".to_string()))
    }
}

pub fn open_archive_reader(
    kind: ArchiveKind,
    path: &Path,
) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
    match kind {
        ArchiveKind::Zip => Ok(Box::new(ZipReader::new(path))),
        ArchiveKind::SevenZ => Ok(Box::new(SevenZReader::new(path))),
        ArchiveKind::Rar => Ok(Box::new(RarReader)),
        ArchiveKind::Unknown => Err(ArchiveError::UnsupportedFormat(
            path.to_string_lossy().to_string(),
        )),
    }
}

const TSLPATCHDATA: &str = "tslpatchdata";

/// Inspects an archive's entry listing (already retrieved via an
/// [`ArchiveReader`]) and classifies its shape. Pure with respect to its
/// input — callers retrieve entries first so this stays unit-testable
/// without touching disk.
pub fn analyze_entries(entries: &[ArchiveEntry]) -> ArchiveAnalysis {
    let mut analysis = ArchiveAnalysis::default();
    let mut patcher_parent: Option<String> = None;
    let mut game_folders = std::collections::BTreeSet::new();
    let mut has_root_game_file = false;
    let mut simple_override_present = false;

    for entry in entries {
        if entry.is_dir {
            continue;
        }
        let normalized = entry.key.replace('/', "\\");
        let segments: Vec<&str> = normalized.split('\\').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }

        if let Some(pos) = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case(TSLPATCHDATA))
        {
            analysis.has_tsl_patch_data = true;
            let parent = segments[..pos].join("\\");
            patcher_parent = Some(parent);
        }

        let file_name = *segments.last().unwrap();
        let lower = file_name.to_ascii_lowercase();
        if lower == "namespaces.ini" {
            analysis.has_namespaces_ini = true;
        }
        if lower == "changes.ini" {
            analysis.has_changes_ini = true;
        }
        if lower.ends_with(".exe") {
            analysis.patcher_executable.get_or_insert(file_name.to_string());
        }

        if is_game_file(&normalized) {
            simple_override_present = true;
            if segments.len() == 1 {
                has_root_game_file = true;
            } else {
                game_folders.insert(segments[0].to_string());
            }
        }
    }

    analysis.patcher_path = patcher_parent;
    analysis.has_flat_files = has_root_game_file;
    analysis.has_simple_override_files = simple_override_present;
    analysis.game_file_folders = game_folders.into_iter().collect();
    analysis
}
