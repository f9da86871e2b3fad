use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use super::deserialize::*;
use super::hooks::HooksConfig;
use crate::error::{Result, TsvaultError};
use crate::tier::Tier;

/// Process-wide configuration. Built once at startup and passed by reference
/// into every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TsvaultConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    /// pg_dump compression level (0-9).
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,
    /// Parallel jobs handed to pg_restore.
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: u32,
    /// Run `pg_restore --list` over every fresh archive.
    #[serde(default = "default_verify")]
    pub verify: bool,
    /// Upper bound for any single external tool invocation.
    #[serde(
        default = "default_command_timeout",
        deserialize_with = "deserialize_duration_string"
    )]
    pub command_timeout: String,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

impl TsvaultConfig {
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.storage.validate()?;
        for tier in Tier::ALL {
            self.retention.window(tier)?;
        }
        if self.compression_level > 9 {
            return Err(TsvaultError::Config(format!(
                "compression_level must be in [0, 9], got {}",
                self.compression_level
            )));
        }
        if !(1..=64).contains(&self.parallel_jobs) {
            return Err(TsvaultError::Config(format!(
                "parallel_jobs must be in [1, 64], got {}",
                self.parallel_jobs
            )));
        }
        self.command_timeout()?;
        if let Some(s3) = &self.upload.s3 {
            s3.validate()?;
        }
        self.monitor.validate()?;
        self.schedule.validate()?;
        self.hooks.validate()?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Result<Duration> {
        parse_human_duration(&self.command_timeout)
    }

    /// Directory holding archives of one tier.
    pub fn tier_dir(&self, tier: Tier) -> PathBuf {
        self.storage.root.join(tier.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Live database to back up.
    #[serde(deserialize_with = "deserialize_strict_string")]
    pub name: String,
    #[serde(default = "default_host", deserialize_with = "deserialize_strict_string")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user", deserialize_with = "deserialize_strict_string")]
    pub user: String,
    /// Exported as `PGPASSWORD`; prefer `~/.pgpass` or `${VAR}` expansion.
    #[serde(default, deserialize_with = "deserialize_optional_strict_string")]
    pub password: Option<String>,
    /// Database used for CREATE/DROP DATABASE during restores.
    #[serde(
        default = "default_maintenance_db",
        deserialize_with = "deserialize_strict_string"
    )]
    pub maintenance_db: String,
    /// Directory containing psql, pg_dump and pg_restore. Default: `$PATH`.
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
    /// Extensions installed into every restore target before replay.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl DatabaseConfig {
    fn validate(&self) -> Result<()> {
        if !crate::engine::is_valid_identifier(&self.name) {
            return Err(TsvaultError::Config(format!(
                "database.name '{}' is not a plain identifier",
                self.name
            )));
        }
        if let Some(dir) = &self.bin_dir {
            require_absolute("database.bin_dir", dir)?;
        }
        for ext in &self.extensions {
            if ext.is_empty() || ext.contains('"') {
                return Err(TsvaultError::Config(format!(
                    "database.extensions: invalid extension name '{ext}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backup root; tier directories live directly below it.
    pub root: PathBuf,
    /// Job log directory. Default: `<root>/logs`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        require_absolute("storage.root", &self.root)?;
        if let Some(dir) = &self.log_dir {
            require_absolute("storage.log_dir", dir)?;
        }
        Ok(())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.root.join("logs"))
    }
}

/// Maximum archive age per tier. Pure age-based: there is no minimum count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(
        default = "default_daily_retention",
        deserialize_with = "deserialize_duration_string"
    )]
    pub daily: String,
    #[serde(
        default = "default_weekly_retention",
        deserialize_with = "deserialize_duration_string"
    )]
    pub weekly: String,
    #[serde(
        default = "default_monthly_retention",
        deserialize_with = "deserialize_duration_string"
    )]
    pub monthly: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            daily: default_daily_retention(),
            weekly: default_weekly_retention(),
            monthly: default_monthly_retention(),
        }
    }
}

impl RetentionConfig {
    pub fn window(&self, tier: Tier) -> Result<Duration> {
        let raw = match tier {
            Tier::Daily => &self.daily,
            Tier::Weekly => &self.weekly,
            Tier::Monthly => &self.monthly,
        };
        // Windows are whole hours or more; `m` would read as minutes.
        if raw.trim().ends_with(|c: char| matches!(c, 's' | 'S' | 'm' | 'M')) {
            return Err(TsvaultError::Config(format!(
                "retention.{tier}: '{raw}' is below an hour (use h, d or w)"
            )));
        }
        parse_human_duration(raw)
            .map_err(|e| TsvaultError::Config(format!("retention.{tier}: {e}")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Off-host copy target. Absent = local only.
    #[serde(default)]
    pub s3: Option<S3UploadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3UploadConfig {
    /// Service endpoint, e.g. `https://s3.eu-central-1.amazonaws.com`.
    #[serde(deserialize_with = "deserialize_strict_string")]
    pub endpoint: String,
    #[serde(deserialize_with = "deserialize_strict_string")]
    pub bucket: String,
    #[serde(default = "default_s3_region", deserialize_with = "deserialize_strict_string")]
    pub region: String,
    /// Key prefix; archives land under `<prefix>/<tier>/<file>`.
    #[serde(default, deserialize_with = "deserialize_optional_strict_string")]
    pub prefix: Option<String>,
    #[serde(deserialize_with = "deserialize_strict_string")]
    pub access_key_id: String,
    #[serde(deserialize_with = "deserialize_strict_string")]
    pub secret_access_key: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl S3UploadConfig {
    fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(TsvaultError::Config(format!(
                "upload.s3.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.bucket.is_empty() {
            return Err(TsvaultError::Config("upload.s3.bucket must not be empty".into()));
        }
        Ok(())
    }
}

/// Transport retry for a single S3 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default = "default_disk_warning_percent")]
    pub disk_warning_percent: u8,
    #[serde(default = "default_disk_critical_percent")]
    pub disk_critical_percent: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            freshness: FreshnessConfig::default(),
            disk_warning_percent: default_disk_warning_percent(),
            disk_critical_percent: default_disk_critical_percent(),
        }
    }
}

impl MonitorConfig {
    fn validate(&self) -> Result<()> {
        if self.disk_warning_percent >= self.disk_critical_percent
            || self.disk_critical_percent > 100
        {
            return Err(TsvaultError::Config(format!(
                "monitor: need disk_warning_percent < disk_critical_percent <= 100, got {} / {}",
                self.disk_warning_percent, self.disk_critical_percent
            )));
        }
        for tier in Tier::ALL {
            self.freshness.threshold(tier)?;
        }
        Ok(())
    }
}

/// How recent the newest archive of a tier must be for the monitor to be
/// satisfied. Looser than the tier's cadence; tiers without a threshold are
/// not checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreshnessConfig {
    #[serde(
        default = "default_daily_freshness",
        deserialize_with = "deserialize_duration_string"
    )]
    pub daily: String,
    #[serde(
        default = "default_weekly_freshness",
        deserialize_with = "deserialize_duration_string"
    )]
    pub weekly: String,
    #[serde(default, deserialize_with = "deserialize_optional_duration_string")]
    pub monthly: Option<String>,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            daily: default_daily_freshness(),
            weekly: default_weekly_freshness(),
            monthly: None,
        }
    }
}

impl FreshnessConfig {
    pub fn threshold(&self, tier: Tier) -> Result<Option<Duration>> {
        let raw = match tier {
            Tier::Daily => Some(&self.daily),
            Tier::Weekly => Some(&self.weekly),
            Tier::Monthly => self.monthly.as_ref(),
        };
        raw.map(|r| {
            parse_human_duration(r)
                .map_err(|e| TsvaultError::Config(format!("monitor.freshness.{tier}: {e}")))
        })
        .transpose()
    }
}

/// Cron expressions rendered by `tsvault cron`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_daily_cron", deserialize_with = "deserialize_strict_string")]
    pub daily: String,
    #[serde(default = "default_weekly_cron", deserialize_with = "deserialize_strict_string")]
    pub weekly: String,
    #[serde(default = "default_monthly_cron", deserialize_with = "deserialize_strict_string")]
    pub monthly: String,
    #[serde(default = "default_monitor_cron", deserialize_with = "deserialize_strict_string")]
    pub monitor: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily: default_daily_cron(),
            weekly: default_weekly_cron(),
            monthly: default_monthly_cron(),
            monitor: default_monitor_cron(),
        }
    }
}

impl ScheduleConfig {
    pub fn for_tier(&self, tier: Tier) -> &str {
        match tier {
            Tier::Daily => &self.daily,
            Tier::Weekly => &self.weekly,
            Tier::Monthly => &self.monthly,
        }
    }

    fn validate(&self) -> Result<()> {
        let entries = [
            ("daily", &self.daily),
            ("weekly", &self.weekly),
            ("monthly", &self.monthly),
            ("monitor", &self.monitor),
        ];
        for (key, expr) in entries {
            if expr.split_whitespace().count() != 5 {
                return Err(TsvaultError::Config(format!(
                    "schedule.{key}: expected 5 cron fields, got '{expr}'"
                )));
            }
        }
        Ok(())
    }
}

fn require_absolute(key: &str, path: &Path) -> Result<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(TsvaultError::Config(format!(
            "{key} must be an absolute path, got '{}'",
            path.display()
        )))
    }
}
