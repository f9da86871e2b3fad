use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

use crate::commands;
use crate::commands::backup::BackupReport;
use crate::config::TsvaultConfig;
use crate::error::Result;
use crate::testutil::{test_config, FakeEngine};
use crate::tier::Tier;

pub const LIVE_TABLES: u64 = 12;
pub const LIVE_HYPERTABLES: u64 = 3;

/// Backup root in a temp dir plus a fake server holding the live `tsdb`.
pub struct Fixture {
    _tmp: tempfile::TempDir,
    pub root: PathBuf,
    pub config: TsvaultConfig,
    pub engine: FakeEngine,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("backups");
        let config = test_config(&root);
        let engine = FakeEngine::new();
        engine.add_database("tsdb", LIVE_TABLES, LIVE_HYPERTABLES);
        Self {
            _tmp: tmp,
            root,
            config,
            engine,
        }
    }

    pub fn tier_dir(&self, tier: Tier) -> PathBuf {
        self.config.tier_dir(tier)
    }

    pub fn backup_at(&self, tier: Tier, now: DateTime<Utc>) -> Result<BackupReport> {
        commands::backup::run_at(&self.config, &self.engine, None, tier, None, now)
    }

    /// File names in a tier directory, sorted.
    pub fn files(&self, tier: Tier) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.tier_dir(tier)) {
            Ok(rd) => rd
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

pub fn at(day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, min, sec).unwrap()
}
