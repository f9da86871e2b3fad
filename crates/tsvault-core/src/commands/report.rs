use std::path::PathBuf;

use super::retention::{classify, Candidate};
use crate::archive::{list_archives, ArchiveEntry};
use crate::config::TsvaultConfig;
use crate::error::Result;
use crate::joblog::{last_outcome, latest_log, tail_lines, Component, Outcome};
use crate::platform::fs::{disk_usage, DiskUsage};
use crate::tier::Tier;

#[derive(Debug)]
pub struct TierSummary {
    pub tier: Tier,
    pub dir: PathBuf,
    pub count: usize,
    pub total_bytes: u64,
    pub newest: Option<ArchiveEntry>,
    /// `.partial` files left by failed or running dumps.
    pub partials: usize,
}

#[derive(Debug)]
pub struct LastRun {
    pub log: PathBuf,
    /// Last marker line in the log, if any.
    pub outcome: Option<(Outcome, String)>,
    pub tail: Vec<String>,
}

#[derive(Debug)]
pub struct Report {
    pub root: PathBuf,
    pub tiers: Vec<TierSummary>,
    pub disk: Option<DiskUsage>,
    pub last_run: Option<LastRun>,
}

impl Report {
    pub fn total_archives(&self) -> usize {
        self.tiers.iter().map(|t| t.count).sum()
    }
}

/// Read-only summary of the backup tree and the newest backup log.
pub fn run(config: &TsvaultConfig, lines: usize) -> Result<Report> {
    let mut tiers = Vec::with_capacity(Tier::ALL.len());
    for tier in Tier::ALL {
        let dir = config.tier_dir(tier);
        let archives = list_archives(&dir, tier)?;
        tiers.push(TierSummary {
            tier,
            count: archives.len(),
            total_bytes: archives.iter().map(|a| a.size).sum(),
            newest: archives.into_iter().next(),
            partials: count_partials(&dir, tier)?,
            dir,
        });
    }

    let last_run = match latest_log(&config.storage.log_dir(), Component::Backup)? {
        Some(log) => Some(LastRun {
            outcome: last_outcome(&log)?,
            tail: tail_lines(&log, lines)?,
            log,
        }),
        None => None,
    };

    Ok(Report {
        root: config.storage.root.clone(),
        tiers,
        disk: disk_usage(&config.storage.root).ok(),
        last_run,
    })
}

/// Interrupted dumps of this tier: exactly the `.partial` files the next
/// prune will consider.
fn count_partials(dir: &std::path::Path, tier: Tier) -> Result<usize> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut n = 0;
    for entry in read_dir {
        let name = entry?.file_name();
        if classify(dir, &name.to_string_lossy(), tier) == Some(Candidate::Partial) {
            n += 1;
        }
    }
    Ok(n)
}
