use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::util::check_cancelled;
use crate::archive::{metadata_path, read_metadata};
use crate::config::TsvaultConfig;
use crate::engine::{
    collect_counts, is_valid_identifier, quote_identifier, DatabaseEngine, POST_RESTORE_SQL,
    PRE_RESTORE_SQL,
};
use crate::error::{Result, TsvaultError};

#[derive(Debug)]
pub struct RestoreReport {
    pub target: String,
    pub archive: PathBuf,
    pub table_count: Option<u64>,
    pub hypertable_count: Option<u64>,
    /// Differences against the archive's sidecar. Informational only.
    pub mismatches: Vec<String>,
}

/// `<db>_restored_<YYYYmmdd_HHMMSS>`.
pub fn default_target_name(database: &str, now: DateTime<Utc>) -> String {
    format!("{database}_restored_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Replay `archive` into a freshly created database.
///
/// Argument problems (missing archive, bad or protected target name) are
/// rejected before anything touches the server. Once the target exists, any
/// failure drops it again before the error is returned.
pub fn run(
    config: &TsvaultConfig,
    engine: &dyn DatabaseEngine,
    archive: &Path,
    target: Option<&str>,
    shutdown: Option<&AtomicBool>,
) -> Result<RestoreReport> {
    if !archive.is_file() {
        return Err(TsvaultError::ArchiveNotFound(archive.display().to_string()));
    }
    let target = match target {
        Some(t) => t.to_string(),
        None => default_target_name(&config.database.name, Utc::now()),
    };
    if !is_valid_identifier(&target) {
        return Err(TsvaultError::InvalidDatabaseName(target));
    }
    if target == config.database.name || target == config.database.maintenance_db {
        return Err(TsvaultError::Usage(format!(
            "refusing to restore into '{target}': it is the live or maintenance database"
        )));
    }

    check_cancelled(shutdown, "create database")?;
    info!(archive = %archive.display(), %target, "restore starting");
    // CREATE DATABASE is atomic: when it fails there is nothing of ours to drop,
    // and the name may belong to someone else's database.
    engine.create_database(&target)?;

    if let Err(e) = populate(config, engine, archive, &target, shutdown) {
        warn!(%target, error = %e, "restore failed; dropping target");
        if let Err(drop_err) = engine.drop_database(&target) {
            warn!(%target, error = %drop_err, "could not drop restore target");
        }
        return Err(match e {
            TsvaultError::Cancelled(_) => e,
            other => TsvaultError::Restore {
                target,
                reason: other.to_string(),
            },
        });
    }

    let (table_count, hypertable_count) = collect_counts(engine, &target);
    let mismatches = compare_with_sidecar(archive, table_count, hypertable_count);
    for m in &mismatches {
        warn!(%target, "{m}");
    }

    info!(%target, ?table_count, ?hypertable_count, "restore finished");
    Ok(RestoreReport {
        target,
        archive: archive.to_path_buf(),
        table_count,
        hypertable_count,
        mismatches,
    })
}

fn populate(
    config: &TsvaultConfig,
    engine: &dyn DatabaseEngine,
    archive: &Path,
    target: &str,
    shutdown: Option<&AtomicBool>,
) -> Result<()> {
    for ext in &config.database.extensions {
        engine.execute(
            target,
            &format!("CREATE EXTENSION IF NOT EXISTS {}", quote_identifier(ext)),
        )?;
    }
    let timescale = config
        .database
        .extensions
        .iter()
        .any(|e| e == "timescaledb");

    if timescale {
        engine.execute(target, PRE_RESTORE_SQL)?;
    }
    check_cancelled(shutdown, "replay")?;
    engine.restore(archive, target, config.parallel_jobs)?;
    if timescale {
        engine.execute(target, POST_RESTORE_SQL)?;
    }
    Ok(())
}

fn compare_with_sidecar(
    archive: &Path,
    tables: Option<u64>,
    hypertables: Option<u64>,
) -> Vec<String> {
    let sidecar = metadata_path(archive);
    if !sidecar.is_file() {
        return Vec::new();
    }
    let meta = match read_metadata(&sidecar) {
        Ok(m) => m,
        Err(e) => {
            warn!(sidecar = %sidecar.display(), error = %e, "unreadable sidecar; skipping count comparison");
            return Vec::new();
        }
    };

    let mut mismatches = Vec::new();
    for (what, expected, actual) in [
        ("table count", meta.stats.table_count, tables),
        ("hypertable count", meta.stats.hypertable_count, hypertables),
    ] {
        if let (Some(expected), Some(actual)) = (expected, actual) {
            if expected != actual {
                mismatches.push(format!(
                    "{what} differs: archive recorded {expected}, restored {actual}"
                ));
            }
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn default_target_embeds_source_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        assert_eq!(default_target_name("tsdb", now), "tsdb_restored_20260314_093000");
    }

    #[test]
    fn no_sidecar_means_no_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.dump");
        std::fs::write(&archive, "x").unwrap();
        assert!(compare_with_sidecar(&archive, Some(1), Some(1)).is_empty());
    }

    #[test]
    fn garbage_sidecar_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.dump");
        std::fs::write(&archive, "x").unwrap();
        std::fs::write(metadata_path(&archive), "not json").unwrap();
        assert!(compare_with_sidecar(&archive, Some(1), Some(1)).is_empty());
    }
}
