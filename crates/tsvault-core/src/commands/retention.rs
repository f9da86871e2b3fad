use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::archive::{metadata_path, parse_archive_file_name, METADATA_EXTENSION, PARTIAL_SUFFIX};
use crate::error::Result;
use crate::platform::fs::modified_age;
use crate::tier::Tier;

#[derive(Debug, Default)]
pub struct PruneStats {
    /// Files removed: archives, their sidecars, stale partial dumps.
    pub deleted: Vec<PathBuf>,
    /// Archives still within the window.
    pub kept: usize,
    pub bytes_freed: u64,
    /// Files that were due for deletion but could not be removed.
    pub failures: usize,
}

/// What a tier directory entry is, from its file name alone.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Candidate {
    Archive,
    Partial,
    /// A sidecar whose archive is already gone.
    OrphanSidecar,
}

pub(crate) fn classify(dir: &Path, name: &str, tier: Tier) -> Option<Candidate> {
    let is_tier_archive = |n: &str| parse_archive_file_name(n).is_some_and(|a| a.tier == tier);

    if is_tier_archive(name) {
        return Some(Candidate::Archive);
    }
    if let Some(base) = name.strip_suffix(PARTIAL_SUFFIX) {
        return is_tier_archive(base).then_some(Candidate::Partial);
    }
    if let Some(stem) = name.strip_suffix(&format!(".{METADATA_EXTENSION}")) {
        let archive = format!("{stem}.{}", crate::archive::ARCHIVE_EXTENSION);
        if is_tier_archive(&archive) && !dir.join(&archive).exists() {
            return Some(Candidate::OrphanSidecar);
        }
    }
    None
}

/// Delete every archive (with its sidecar) and every stale `.partial` dump in
/// `dir` whose modification age exceeds `window`. There is no minimum count;
/// the directory may end up empty. Foreign files are never touched.
///
/// Individual deletion failures are logged and counted, not returned, so one
/// stuck file cannot block the rest of the sweep.
pub fn prune_tier(dir: &Path, tier: Tier, window: Duration, now: SystemTime) -> Result<PruneStats> {
    let mut stats = PruneStats::default();

    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
        Err(e) => return Err(e.into()),
    };

    let mut candidates = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(kind) = classify(dir, &name, tier) {
            candidates.push((entry.path(), kind));
        }
    }
    for (path, kind) in candidates {
        let age = match modified_age(&path, now) {
            Ok(age) => age,
            // Removed underneath us, e.g. by a concurrent run of the same tier.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if age <= window {
            if kind == Candidate::Archive {
                stats.kept += 1;
            }
            continue;
        }

        debug!(path = %path.display(), age_secs = age.as_secs(), "expired");
        remove(&path, &mut stats);
        if kind == Candidate::Archive {
            let sidecar = metadata_path(&path);
            if sidecar.exists() {
                remove(&sidecar, &mut stats);
            }
        }
    }

    info!(
        %tier,
        deleted = stats.deleted.len(),
        kept = stats.kept,
        bytes_freed = stats.bytes_freed,
        "retention sweep finished"
    );
    Ok(stats)
}

fn remove(path: &Path, stats: &mut PruneStats) {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "deleted");
            stats.bytes_freed += size;
            stats.deleted.push(path.to_path_buf());
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not delete expired file");
            stats.failures += 1;
        }
    }
}
