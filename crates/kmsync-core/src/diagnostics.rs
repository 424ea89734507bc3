//! Error types for the three channels described by the execution model:
//! issue-stream data ([`crate::model::ValidationIssue`], not an error
//! type), exceptional signals ([`ExecSignal`], [`ArchiveError`],
//! [`CacheError`]), and fatal errors ([`PlanError`]).

use crate::model::InstructionId;
use thiserror::Error;

/// Exceptional signals raised by the executor. These are ordinary
/// local-control-flow results, not crashes: callers (the validator's
/// repair loop) match on them directly.
#[derive(Debug, Error, Clone)]
pub enum ExecSignal {
    #[error("no file matched any of the patterns: {patterns:?}")]
    WildcardPatternNotFound { patterns: Vec<String> },

    #[error("instruction {index} ({id}) failed: {message}")]
    InstructionFailed {
        index: usize,
        id: InstructionId,
        message: String,
    },
}

/// Errors surfaced by archive readers.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive is corrupted: {0}")]
    CorruptedArchive(String),

    /// An archive library error that didn't match any known corruption
    /// indicator (spec §4.2) — distinct from `CorruptedArchive` so callers
    /// don't treat an unrelated read failure (e.g. permissions) as proof
    /// the archive itself is bad.
    #[error("failed to read archive: {0}")]
    ReadFailed(String),

    #[error("archive format is not supported: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error reading archive: {0}")]
    Io(#[from] std::io::Error),
}

/// The fixed substring set that indicates archive corruption regardless
/// of which reader reported it (spec §4.2).
pub const CORRUPTION_INDICATORS: &[&str] = &[
    "invalid central directory",
    "unexpected end of file",
    "unexpected eof",
    "crc mismatch",
    "crc32 checksum failed",
    "nextheaderoffset",
    "bad magic",
    "invalid header",
];

pub fn message_indicates_corruption(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    CORRUPTION_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Errors raised by the resource cache/index (C7).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file is locked by another process")]
    Locked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize cache state: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Top-level fatal error surfaced at the CLI boundary as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan document is malformed: {0}")]
    MalformedPlan(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("execution failed: {0}")]
    Exec(#[from] ExecSignal),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_indicators_are_case_insensitive() {
        assert!(message_indicates_corruption("Unexpected End Of File"));
        assert!(message_indicates_corruption("CRC Mismatch detected"));
        assert!(!message_indicates_corruption("file not found"));
    }

    #[test]
    fn exec_signal_displays_patterns() {
        let sig = ExecSignal::WildcardPatternNotFound {
            patterns: vec!["<<modDirectory>>\\*.2da".to_string()],
        };
        assert!(sig.to_string().contains("modDirectory"));
    }
}
