//! Garbage collection and quota eviction over a [`super::ResourceIndex`].

use super::resource_index::ResourceIndex;
use crate::model::TrustLevel;
use std::path::Path;

const NINETY_DAYS_MILLIS: u64 = 90 * 24 * 60 * 60 * 1000;
const THIRTY_DAYS_MILLIS: u64 = 30 * 24 * 60 * 60 * 1000;
const ONE_YEAR_MILLIS: u64 = 365 * 24 * 60 * 60 * 1000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcReport {
    pub deleted_stale_verified: usize,
    pub deleted_never_verified: usize,
    pub downgraded: usize,
}

/// (i) delete entries whose `LastVerified` is older than 90 days and
/// whose file no longer exists; (ii) delete never-verified entries older
/// than 365 days; (iii) downgrade `Verified -> ObservedOnce` at 30-day
/// lapse, `ObservedOnce -> Unverified` at the next 30-day lapse.
pub fn collect_garbage(index: &ResourceIndex, now_millis: u64, file_exists: impl Fn(&str) -> bool) -> GcReport {
    let mut report = GcReport::default();

    for entry in index.all_entries() {
        let age_since_verified = now_millis.saturating_sub(entry.last_verified_millis);
        let age_since_first_seen = now_millis.saturating_sub(entry.first_seen_millis);

        let any_file_exists = entry.filenames.iter().any(|f| file_exists(f));

        if age_since_verified > NINETY_DAYS_MILLIS && !any_file_exists {
            index.remove(&entry.metadata_hash);
            report.deleted_stale_verified += 1;
            continue;
        }

        if entry.trust == TrustLevel::Unverified && age_since_first_seen > ONE_YEAR_MILLIS {
            index.remove(&entry.metadata_hash);
            report.deleted_never_verified += 1;
            continue;
        }

        let downgraded = match entry.trust {
            TrustLevel::Verified if age_since_verified > THIRTY_DAYS_MILLIS => Some(TrustLevel::ObservedOnce),
            TrustLevel::ObservedOnce if age_since_verified > 2 * THIRTY_DAYS_MILLIS => Some(TrustLevel::Unverified),
            _ => None,
        };
        if let Some(new_trust) = downgraded {
            let mut updated = entry.clone();
            updated.trust = new_trust;
            // Write the downgraded trust directly: `observe` would force a
            // fresh `ObservedOnce` on insert, which would stomp the
            // `Unverified` downgrade case for an entry GC just removed.
            index.set(updated);
            report.downgraded += 1;
        }
    }

    report
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QuotaReport {
    pub evicted: usize,
    pub freed_bytes: u64,
}

/// LRU by `LastVerified` (fallback `FirstSeen`) until total cache bytes
/// <= `max_bytes`. Deletes files from disk and drops entries from the
/// index.
pub fn enforce_quota(
    index: &ResourceIndex,
    max_bytes: u64,
    delete_file: impl Fn(&str),
) -> QuotaReport {
    let mut report = QuotaReport::default();
    let mut total: u64 = index.all_entries().iter().filter_map(|m| m.file_size).sum();
    if total <= max_bytes {
        return report;
    }

    let mut entries = index.all_entries();
    entries.sort_by_key(|m| {
        if m.last_verified_millis > 0 {
            m.last_verified_millis
        } else {
            m.first_seen_millis
        }
    });

    for entry in entries {
        if total <= max_bytes {
            break;
        }
        for filename in &entry.filenames {
            delete_file(filename);
        }
        index.remove(&entry.metadata_hash);
        let size = entry.file_size.unwrap_or(0);
        total = total.saturating_sub(size);
        report.evicted += 1;
        report.freed_bytes += size;
    }

    report
}

#[allow(dead_code)]
fn path_exists(p: &str) -> bool {
    Path::new(p).exists()
}
