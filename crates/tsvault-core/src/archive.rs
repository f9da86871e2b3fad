//! Archive file naming, discovery and the JSON metadata sidecar.
//!
//! Layout inside a tier directory:
//!
//! ```text
//! <db>_<tier>_<YYYYmmdd_HHMMSS>.dump          archive (pg_dump custom format)
//! <db>_<tier>_<YYYYmmdd_HHMMSS>.json          metadata sidecar
//! <db>_<tier>_<YYYYmmdd_HHMMSS>.dump.partial  dump in progress or failed dump
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::DatabaseStats;
use crate::error::Result;
use crate::tier::Tier;

pub const ARCHIVE_EXTENSION: &str = "dump";
pub const METADATA_EXTENSION: &str = "json";
pub const PARTIAL_SUFFIX: &str = ".partial";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;

/// File name for an archive of `database` in `tier` created at `time`.
pub fn archive_file_name(database: &str, tier: Tier, time: DateTime<Utc>) -> String {
    format!(
        "{database}_{tier}_{}.{ARCHIVE_EXTENSION}",
        time.format(TIMESTAMP_FORMAT)
    )
}

/// Parsed components of an archive file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub database: String,
    pub tier: Tier,
    pub created: DateTime<Utc>,
}

/// Parse `<db>_<tier>_<ts>.dump`. Returns `None` for anything else, including
/// sidecars and `.partial` files.
pub fn parse_archive_file_name(name: &str) -> Option<ArchiveName> {
    let stem = name.strip_suffix(&format!(".{ARCHIVE_EXTENSION}"))?;
    if stem.len() < TIMESTAMP_LEN + 2 || !stem.is_char_boundary(stem.len() - TIMESTAMP_LEN) {
        return None;
    }
    let (head, ts) = stem.split_at(stem.len() - TIMESTAMP_LEN);
    let head = head.strip_suffix('_')?;
    let (database, raw_tier) = head.rsplit_once('_')?;
    if database.is_empty() {
        return None;
    }
    // Names are always written lowercase; reject `DAILY` and friends.
    let tier: Tier = raw_tier.parse().ok()?;
    if tier.as_str() != raw_tier {
        return None;
    }
    let created = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    Some(ArchiveName {
        database: database.to_string(),
        tier,
        created,
    })
}

/// Sidecar path for an archive: same base name, `.json` extension.
pub fn metadata_path(archive: &Path) -> PathBuf {
    archive.with_extension(METADATA_EXTENSION)
}

/// Temporary path a dump is written to before it is renamed into place.
pub fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// An archive found on disk.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub name: ArchiveName,
    pub size: u64,
    pub modified: SystemTime,
}

impl ArchiveEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn has_metadata(&self) -> bool {
        metadata_path(&self.path).is_file()
    }
}

/// List the archives of one tier directory, newest first (by embedded
/// timestamp, then modification time). A missing directory is empty.
pub fn list_archives(dir: &Path, tier: Tier) -> Result<Vec<ArchiveEntry>> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for dirent in read_dir {
        let dirent = dirent?;
        let file_name = dirent.file_name();
        let Some(name) = file_name.to_str().and_then(parse_archive_file_name) else {
            continue;
        };
        if name.tier != tier {
            continue;
        }
        let meta = dirent.metadata()?;
        if !meta.is_file() {
            continue;
        }
        entries.push(ArchiveEntry {
            path: dirent.path(),
            name,
            size: meta.len(),
            modified: meta.modified()?,
        });
    }

    entries.sort_by(|a, b| {
        b.name
            .created
            .cmp(&a.name.created)
            .then(b.modified.cmp(&a.modified))
    });
    Ok(entries)
}

/// Outcome of the table-of-contents check for one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Passed,
    Failed,
    NotRun,
}

impl VerificationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationOutcome::Passed => "passed",
            VerificationOutcome::Failed => "failed",
            VerificationOutcome::NotRun => "not run",
        }
    }
}

/// Descriptive record written next to every archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub archive: String,
    pub tier: Tier,
    pub database: String,
    pub created_at: DateTime<Utc>,
    pub hostname: String,
    pub tool_version: String,
    pub compression_level: u8,
    #[serde(flatten)]
    pub stats: DatabaseStats,
    pub archive_size_bytes: u64,
    pub verification: VerificationOutcome,
    pub duration_secs: f64,
}

/// Write a sidecar through a temp file and rename so readers never see a
/// half-written document.
pub fn write_metadata(path: &Path, metadata: &ArchiveMetadata) -> Result<()> {
    let tmp = {
        let mut name = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    };
    let json = serde_json::to_vec_pretty(metadata)?;
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> Result<ArchiveMetadata> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
