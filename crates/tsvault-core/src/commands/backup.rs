use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::retention::{prune_tier, PruneStats};
use super::util::check_cancelled;
use super::verify::verify_archive;
use crate::archive::{
    archive_file_name, metadata_path, partial_path, write_metadata, ArchiveMetadata,
    VerificationOutcome,
};
use crate::config::TsvaultConfig;
use crate::engine::{collect_stats, DatabaseEngine};
use crate::error::{Result, TsvaultError};
use crate::storage::{upload_archive, Uploader};
use crate::tier::Tier;

/// What happened to the off-host copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    NotConfigured,
    Uploaded(String),
    /// Logged and reported; never fails the backup.
    Failed(String),
}

#[derive(Debug)]
pub struct BackupReport {
    pub tier: Tier,
    pub archive: PathBuf,
    pub metadata: ArchiveMetadata,
    pub prune: PruneStats,
    pub upload: UploadStatus,
}

/// Produce one archive for `tier`, then sweep the tier directory.
///
/// The retention sweep runs whether or not the dump and integrity check
/// succeeded; only cancellation skips it. A dump failure leaves the
/// `.partial` file behind. An integrity failure keeps the archive and its
/// sidecar (recording `failed`) but fails the run.
pub fn run(
    config: &TsvaultConfig,
    engine: &dyn DatabaseEngine,
    uploader: Option<&dyn Uploader>,
    tier: Tier,
    shutdown: Option<&AtomicBool>,
) -> Result<BackupReport> {
    run_at(config, engine, uploader, tier, shutdown, Utc::now())
}

pub(crate) fn run_at(
    config: &TsvaultConfig,
    engine: &dyn DatabaseEngine,
    uploader: Option<&dyn Uploader>,
    tier: Tier,
    shutdown: Option<&AtomicBool>,
    now: DateTime<Utc>,
) -> Result<BackupReport> {
    let dir = config.tier_dir(tier);
    let window = config.retention.window(tier)?;
    let archive = dir.join(archive_file_name(&config.database.name, tier, now));
    if archive.exists() || partial_path(&archive).exists() {
        return Err(TsvaultError::ArchiveExists(archive.display().to_string()));
    }
    std::fs::create_dir_all(&dir)?;

    info!(%tier, database = %config.database.name, archive = %archive.display(), "backup starting");
    let created = create_archive(config, engine, tier, &archive, now, shutdown);

    let swept =
        check_cancelled(shutdown, "prune").and_then(|_| prune_tier(&dir, tier, window, SystemTime::now()));

    let prune = match (swept, &created) {
        (Ok(stats), _) => stats,
        (Err(e), Ok(_)) => return Err(e),
        (Err(e), Err(_)) => {
            warn!(%tier, error = %e, "retention sweep skipped");
            PruneStats::default()
        }
    };
    let metadata = created?;

    let upload = match uploader {
        None => UploadStatus::NotConfigured,
        Some(up) => match upload_archive(up, tier, &archive) {
            Ok(()) => UploadStatus::Uploaded(up.describe()),
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "upload failed; local archive kept");
                UploadStatus::Failed(e.to_string())
            }
        },
    };

    info!(
        %tier,
        archive = %archive.display(),
        bytes = metadata.archive_size_bytes,
        verification = metadata.verification.as_str(),
        "backup finished"
    );
    Ok(BackupReport {
        tier,
        archive,
        metadata,
        prune,
        upload,
    })
}

/// Dump to `<archive>.partial`, rename into place, verify, write the sidecar.
fn create_archive(
    config: &TsvaultConfig,
    engine: &dyn DatabaseEngine,
    tier: Tier,
    archive: &Path,
    now: DateTime<Utc>,
    shutdown: Option<&AtomicBool>,
) -> Result<ArchiveMetadata> {
    let started = Instant::now();
    let database = &config.database.name;

    check_cancelled(shutdown, "dump")?;
    let stats = collect_stats(engine, database);

    let partial = partial_path(archive);
    if let Err(e) = engine.dump(database, &partial, config.compression_level) {
        if partial.exists() {
            warn!(partial = %partial.display(), "dump failed; partial file left for inspection");
        }
        return Err(e);
    }
    std::fs::rename(&partial, archive)?;
    let archive_size_bytes = std::fs::metadata(archive)?.len();
    info!(archive = %archive.display(), bytes = archive_size_bytes, "dump complete");

    let verification = if config.verify {
        check_cancelled(shutdown, "verify")?;
        verify_archive(engine, archive)
    } else {
        Ok(0)
    };
    let outcome = match (&verification, config.verify) {
        (_, false) => VerificationOutcome::NotRun,
        (Ok(_), true) => VerificationOutcome::Passed,
        (Err(_), true) => VerificationOutcome::Failed,
    };

    let metadata = ArchiveMetadata {
        archive: archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        tier,
        database: database.clone(),
        created_at: now,
        hostname: crate::platform::hostname(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        compression_level: config.compression_level,
        stats,
        archive_size_bytes,
        verification: outcome,
        duration_secs: started.elapsed().as_secs_f64(),
    };
    write_metadata(&metadata_path(archive), &metadata)?;

    verification?;
    Ok(metadata)
}
