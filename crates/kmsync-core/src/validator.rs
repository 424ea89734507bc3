//! Component validator (C6): decides which URLs still need downloading
//! and, when a dry run fails, applies a fixed sequence of repairs before
//! giving up. Caches outcomes for 5 minutes keyed by
//! (component, mod-archive-dir, instruction-count).

use crate::diagnostics::ExecSignal;
use crate::exec::{ExecContext, Executor};
use crate::model::{ActionKind, Component, ComponentId};
use crate::path;
use crate::vfs::Vfs;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ValidationCacheKey {
    component_id: ComponentId,
    mod_archive_dir: String,
    instruction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Clean,
    NonCriticalPathMismatch,
    Failed { patterns: Vec<String> },
}

/// What still needs to be fetched, nominated either for specific patterns
/// or, when no pattern can be matched to a URL, for every component URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadNecessity {
    pub needed_urls: HashSet<String>,
}

pub struct Validator {
    cache: Mutex<HashMap<ValidationCacheKey, (Instant, ValidationOutcome)>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Collects the set of filenames known to exist (from `known_names`,
    /// typically disk + resource registry + tracked-archive contents) and
    /// tests whether every `Extract` source pattern resolves against it.
    /// Patterns that don't nominate their URLs; when none can be matched
    /// to a specific pattern, every component URL is nominated.
    pub fn analyze_download_necessity(&self, component: &Component, known_names: &HashSet<String>) -> DownloadNecessity {
        let patterns = component.all_extract_patterns();
        let mut unmatched = Vec::new();
        for pattern in &patterns {
            let has_match = known_names.iter().any(|name| path::matches(name, pattern) || path::patterns_overlap(name, pattern));
            if !has_match {
                unmatched.push(pattern.clone());
            }
        }

        let mut necessity = DownloadNecessity::default();
        if unmatched.is_empty() {
            return necessity;
        }
        // No per-pattern URL association is modeled at this layer (that
        // lives in DownloadCacheEntry); fall back to nominating every URL.
        necessity.needed_urls.extend(component.mod_links.iter().cloned());
        necessity
    }

    pub fn validate(
        &self,
        component: &Component,
        mod_archive_dir: &str,
        ctx: &ExecContext,
        downloaded_files_on_disk: &HashSet<String>,
    ) -> ValidationOutcome {
        let key = ValidationCacheKey {
            component_id: component.id,
            mod_archive_dir: mod_archive_dir.to_string(),
            instruction_count: component.instructions.len(),
        };
        if let Some(outcome) = self.cached(&key) {
            return outcome;
        }

        let outcome = self.validate_uncached(component, ctx, downloaded_files_on_disk);
        self.cache
            .lock()
            .unwrap()
            .insert(key, (Instant::now(), outcome.clone()));
        outcome
    }

    fn cached(&self, key: &ValidationCacheKey) -> Option<ValidationOutcome> {
        let cache = self.cache.lock().unwrap();
        cache.get(key).and_then(|(at, outcome)| {
            if at.elapsed() < CACHE_TTL {
                Some(outcome.clone())
            } else {
                None
            }
        })
    }

    fn validate_uncached(
        &self,
        component: &Component,
        ctx: &ExecContext,
        downloaded_files_on_disk: &HashSet<String>,
    ) -> ValidationOutcome {
        let mut vfs = Vfs::new(ctx.now_millis);
        for name in downloaded_files_on_disk {
            vfs.add_file(name);
        }
        let mut exec = Executor::new();
        match exec.run_component(component, &mut vfs, ctx) {
            Ok(()) => return ValidationOutcome::Clean,
            Err(ExecSignal::WildcardPatternNotFound { patterns }) => {
                let repaired = self.apply_repairs(component, &patterns, ctx, downloaded_files_on_disk);
                if let Some(outcome) = repaired {
                    return outcome;
                }
            }
            Err(ExecSignal::InstructionFailed { .. }) => {
                return ValidationOutcome::Failed {
                    patterns: Vec::new(),
                };
            }
        }

        // Final fallback: if everything that was supposed to be
        // downloaded already exists on disk, downgrade to a non-critical
        // mismatch rather than a hard failure.
        let extract_patterns = component.all_extract_patterns();
        let all_present = extract_patterns.iter().all(|p| {
            downloaded_files_on_disk
                .iter()
                .any(|f| path::matches(f, p) || path::patterns_overlap(f, p))
        });
        if all_present {
            ValidationOutcome::NonCriticalPathMismatch
        } else {
            ValidationOutcome::Failed {
                patterns: extract_patterns,
            }
        }
    }

    /// Applies the fixed repair sequence once, re-running the executor
    /// after. Returns `None` when repairs didn't clear the failure (the
    /// caller then falls through to the non-critical-mismatch check).
    fn apply_repairs(
        &self,
        component: &Component,
        failing_patterns: &[String],
        ctx: &ExecContext,
        known_files: &HashSet<String>,
    ) -> Option<ValidationOutcome> {
        tracing::debug!(
            "attempting repair cascade for '{}' against {} failing pattern(s)",
            component.name,
            failing_patterns.len()
        );
        let mut repaired = component.clone();
        fix_duplicate_folder(&mut repaired, failing_patterns, ctx);
        fix_nested_archive(&mut repaired, failing_patterns, known_files, ctx);
        fix_archive_name_mismatch(&mut repaired, failing_patterns, known_files, ctx);

        let mut vfs = Vfs::new(ctx.now_millis);
        for name in known_files {
            vfs.add_file(name);
        }
        let mut exec = Executor::new();
        match exec.run_component(&repaired, &mut vfs, ctx) {
            Ok(()) => {
                tracing::debug!("repair cascade fixed '{}'", component.name);
                Some(ValidationOutcome::Clean)
            }
            Err(_) => {
                tracing::warn!("repair cascade could not fix '{}'", component.name);
                None
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapses `<<modDirectory>>\X\X\y` produced by naive path joins.
/// `failing_patterns` are the fully-resolved paths the executor reported
/// as unmatched, while `instr.source` always retains the raw,
/// placeholder-bearing literal — so the comparison resolves each source
/// through `ctx` before matching it against a failing pattern.
fn fix_duplicate_folder(component: &mut Component, failing_patterns: &[String], ctx: &ExecContext) {
    for instr in component.instructions.iter_mut() {
        for src in instr.source.iter_mut() {
            if failing_patterns.iter().any(|p| *p == ctx.resolve(src)) {
                if let Some(fixed) = collapse_duplicate_segment(src) {
                    *src = fixed;
                }
            }
        }
    }
}

fn collapse_duplicate_segment(pattern: &str) -> Option<String> {
    let segments: Vec<&str> = pattern.split('\\').collect();
    for i in 0..segments.len().saturating_sub(1) {
        if segments[i] == segments[i + 1] && !segments[i].is_empty() {
            let mut fixed: Vec<&str> = segments.clone();
            fixed.remove(i + 1);
            return Some(fixed.join("\\"));
        }
    }
    None
}

/// If a tracked archive `X.zip` extracts to `X/` whose only child is
/// another `X/`, rewrite `X*\sub\*` to `X*\X*\sub\*`.
fn fix_nested_archive(
    component: &mut Component,
    failing_patterns: &[String],
    known_files: &HashSet<String>,
    ctx: &ExecContext,
) {
    for instr in component.instructions.iter_mut() {
        for src in instr.source.iter_mut() {
            if !failing_patterns.iter().any(|p| *p == ctx.resolve(src)) {
                continue;
            }
            let segments: Vec<&str> = src.split('\\').collect();
            if segments.len() < 2 {
                continue;
            }
            let archive_seg = segments[segments.len() - 2];
            let base = archive_seg.trim_end_matches('*');
            if base.is_empty() {
                continue;
            }
            let nested_prefix = format!("{base}\\{base}");
            let looks_nested = known_files.iter().any(|f| f.contains(&nested_prefix));
            if looks_nested {
                let mut fixed = segments.clone();
                fixed.insert(segments.len() - 1, archive_seg);
                *src = fixed.join("\\");
            }
        }
    }
}

/// For each failing pattern referencing an archive filename, find a
/// cached entry whose base name has similarity ≥ 0.7 to the pattern's
/// expected base name, and rewrite the reference.
fn fix_archive_name_mismatch(
    component: &mut Component,
    failing_patterns: &[String],
    known_files: &HashSet<String>,
    ctx: &ExecContext,
) {
    for instr in component.instructions.iter_mut() {
        for src in instr.source.iter_mut() {
            if !failing_patterns.iter().any(|p| *p == ctx.resolve(src)) {
                continue;
            }
            let Some(file_name) = src.rsplit('\\').next() else {
                continue;
            };
            let expected_base = strip_wildcards(file_name);
            if expected_base.is_empty() {
                continue;
            }
            let best = known_files
                .iter()
                .filter_map(|f| {
                    let candidate_name = f.rsplit('\\').next().unwrap_or(f);
                    let score = similarity(&expected_base, candidate_name);
                    (score >= 0.7).then_some((score, candidate_name.to_string()))
                })
                .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            if let Some((_, candidate_name)) = best {
                let candidate_base = strip_extension(&candidate_name);
                *src = replace_case_insensitive(src, &expected_base, &candidate_base);
            }
        }
    }
}

fn strip_wildcards(name: &str) -> String {
    name.trim_matches('*').trim_end_matches(".2da").to_string()
}

fn strip_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((base, _)) => base.to_string(),
        None => name.to_string(),
    }
}

fn replace_case_insensitive(haystack: &str, from: &str, to: &str) -> String {
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_from = from.to_ascii_lowercase();
    if let Some(pos) = lower_haystack.find(&lower_from) {
        let mut out = String::with_capacity(haystack.len());
        out.push_str(&haystack[..pos]);
        out.push_str(to);
        out.push_str(&haystack[pos + from.len()..]);
        out
    } else {
        haystack.to_string()
    }
}

/// Similarity cascade: exact (1.0), substring (0.95), normalized (0.90),
/// token Jaccard ≥ 0.5 (0.75–0.90), Levenshtein-ratio ≥ 0.7 (×0.85),
/// longest-common-substring ratio ≥ 0.6 (×0.80).
fn similarity(a: &str, b: &str) -> f64 {
    if a.eq_ignore_ascii_case(b) {
        return 1.0;
    }
    let la = a.to_ascii_lowercase();
    let lb = b.to_ascii_lowercase();
    if la.contains(&lb) || lb.contains(&la) {
        return 0.95;
    }
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na == nb {
        return 0.90;
    }

    let ta: HashSet<&str> = na.split_whitespace().collect();
    let tb: HashSet<&str> = nb.split_whitespace().collect();
    if !ta.is_empty() && !tb.is_empty() {
        let intersection = ta.intersection(&tb).count();
        let union = ta.union(&tb).count();
        let jaccard = intersection as f64 / union as f64;
        if jaccard >= 0.5 {
            return 0.75 + jaccard.min(1.0) * 0.15;
        }
    }

    let lev_ratio = levenshtein_ratio(&na, &nb);
    if lev_ratio >= 0.7 {
        return lev_ratio * 0.85;
    }

    let lcs_ratio = lcs_ratio(&na, &nb);
    if lcs_ratio >= 0.6 {
        return lcs_ratio * 0.80;
    }

    0.0
}

/// Lowercases, collapses whitespace/dashes/underscores to single spaces,
/// strips version tokens (`v?\d+(\.\d+)*`), removes non-word characters.
fn normalize_name(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut spaced = String::with_capacity(lower.len());
    for c in lower.chars() {
        if c == '-' || c == '_' || c == '.' || c.is_whitespace() {
            spaced.push(' ');
        } else if c.is_alphanumeric() {
            spaced.push(c);
        }
    }
    let tokens: Vec<String> = spaced
        .split_whitespace()
        .filter(|tok| !is_version_token(tok))
        .map(|tok| tok.to_string())
        .collect();
    tokens.join(" ")
}

fn is_version_token(tok: &str) -> bool {
    let stripped = tok.strip_prefix('v').unwrap_or(tok);
    if stripped.is_empty() {
        return false;
    }
    stripped.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let dist = levenshtein_distance(a, b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (dist as f64 / max_len as f64)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

fn lcs_ratio(a: &str, b: &str) -> f64 {
    let len = longest_common_substring_len(a, b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    len as f64 / max_len as f64
}

fn longest_common_substring_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for i in 1..=a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                curr[j] = prev[j - 1] + 1;
                best = best.max(curr[j]);
            }
        }
        prev = curr;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_exact_match_is_one() {
        assert_eq!(similarity("foo", "foo"), 1.0);
    }

    #[test]
    fn similarity_substring_containment() {
        assert_eq!(similarity("foo", "foobar"), 0.95);
    }

    #[test]
    fn similarity_version_token_stripped_in_normalization() {
        assert_eq!(normalize_name("Mod-v1.2.3"), "mod");
        assert_eq!(normalize_name("Mod v2"), "mod");
    }

    #[test]
    fn similarity_dotted_version_numbers_tokenize_like_underscored_ones() {
        // spec scenario 3: Mod_v1_2_3.zip vs Mod_v1.2.4.zip both normalize
        // to "mod zip" once `.` is treated as a word-boundary, so the
        // normalized-match branch (0.90) fires instead of falling through
        // to the weaker cascade tiers.
        assert_eq!(normalize_name("Mod_v1_2_3.zip"), normalize_name("Mod_v1.2.4.zip"));
        assert_eq!(similarity("Mod_v1_2_3.zip", "Mod_v1.2.4.zip"), 0.90);
    }

    #[test]
    fn similarity_levenshtein_close_strings() {
        let score = similarity("modnmae", "modname");
        assert!(score > 0.0, "near-miss typo should score above zero: {score}");
    }

    #[test]
    fn similarity_unrelated_strings_score_zero() {
        assert_eq!(similarity("alpha", "zzzzzzz"), 0.0);
    }

    #[test]
    fn collapse_duplicate_segment_removes_repeat() {
        let fixed = collapse_duplicate_segment("<<modDirectory>>\\X\\X\\y.2da").unwrap();
        assert_eq!(fixed, "<<modDirectory>>\\X\\y.2da");
    }

    #[test]
    fn collapse_duplicate_segment_none_when_no_repeat() {
        assert!(collapse_duplicate_segment("<<modDirectory>>\\X\\Y\\y.2da").is_none());
    }

    #[test]
    fn download_necessity_empty_when_all_patterns_resolve() {
        let mut component = Component::new("Test", "Author");
        component
            .instructions
            .push(extract_instruction("Mod.zip"));
        let mut known = HashSet::new();
        known.insert("Mod.zip".to_string());
        let validator = Validator::new();
        let necessity = validator.analyze_download_necessity(&component, &known);
        assert!(necessity.needed_urls.is_empty());
    }

    #[test]
    fn download_necessity_falls_back_to_all_urls_when_unmatched() {
        let mut component = Component::new("Test", "Author");
        component.mod_links.push("https://example.com/mod".to_string());
        component
            .instructions
            .push(extract_instruction("Missing.zip"));
        let known = HashSet::new();
        let validator = Validator::new();
        let necessity = validator.analyze_download_necessity(&component, &known);
        assert_eq!(necessity.needed_urls.len(), 1);
    }

    fn extract_instruction(name: &str) -> crate::model::Instruction {
        crate::model::Instruction::new(ActionKind::Extract, vec![name.to_string()])
    }

    #[test]
    fn duplicate_folder_repair_fires_against_a_placeholder_bearing_instruction() {
        // The executor reports failing patterns fully resolved
        // (`ctx.resolve` already applied), while `instr.source` keeps the
        // raw `<<modDirectory>>`-bearing literal. The repair must resolve
        // each source before comparing it to a failing pattern, or the
        // comparison can never match and the repair never fires.
        let mut component = Component::new("Test", "Author");
        component.instructions.push(
            crate::model::Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\X\\X\\y.2da".to_string()])
                .with_destination("<<kotorDirectory>>\\Override\\y.2da"),
        );
        let ctx = ExecContext::new("M", "K", 0);
        let mut known = HashSet::new();
        known.insert("M\\X\\y.2da".to_string());

        let validator = Validator::new();
        let outcome = validator.validate(&component, "M", &ctx, &known);
        assert_eq!(outcome, ValidationOutcome::Clean);
    }
}
