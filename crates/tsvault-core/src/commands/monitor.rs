use std::fmt;
use std::time::SystemTime;

use tracing::{info, warn};

use super::util::humanize_duration;
use super::verify::verify_archive;
use crate::archive::{list_archives, ArchiveEntry};
use crate::config::TsvaultConfig;
use crate::engine::DatabaseEngine;
use crate::error::Result;
use crate::platform::fs::disk_usage;
use crate::tier::Tier;

/// Health classification, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    /// The check had nothing to look at. Counts as OK in the aggregate.
    Skipped,
    Ok,
    Degraded,
    Critical,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Skipped => "SKIPPED",
            Status::Ok => "OK",
            Status::Degraded => "DEGRADED",
            Status::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    pub detail: String,
}

impl CheckResult {
    fn new(name: impl Into<String>, status: Status, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }

    /// `[OK] freshness.daily: ...`
    pub fn status_line(&self) -> String {
        format!("[{}] {}: {}", self.status, self.name, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub checks: Vec<CheckResult>,
}

impl MonitorReport {
    /// Worst status across all checks.
    pub fn status(&self) -> Status {
        match self.checks.iter().map(|c| c.status).max() {
            None | Some(Status::Skipped) => Status::Ok,
            Some(s) => s,
        }
    }

    /// 0 OK, 1 degraded, 2 critical.
    pub fn exit_code(&self) -> i32 {
        match self.status() {
            Status::Skipped | Status::Ok => 0,
            Status::Degraded => 1,
            Status::Critical => 2,
        }
    }

    /// Report for a host with no usable configuration.
    pub fn unconfigured(reason: &str) -> Self {
        Self {
            checks: vec![CheckResult::new(
                "configuration",
                Status::Degraded,
                format!("unconfigured ({reason})"),
            )],
        }
    }

    /// One-line summary for logs and hook context.
    pub fn summary(&self) -> String {
        let problems: Vec<_> = self
            .checks
            .iter()
            .filter(|c| c.status >= Status::Degraded)
            .map(|c| c.name.as_str())
            .collect();
        if problems.is_empty() {
            format!("status {}", self.status())
        } else {
            format!("status {} ({})", self.status(), problems.join(", "))
        }
    }
}

/// Evaluate freshness per tier, disk utilization and the integrity of the
/// newest archive. Reads only; nothing in the backup tree is modified.
pub fn run(config: &TsvaultConfig, engine: &dyn DatabaseEngine, now: SystemTime) -> Result<MonitorReport> {
    let mut checks = Vec::new();
    let mut newest: Option<ArchiveEntry> = None;

    for tier in Tier::ALL {
        let archives = list_archives(&config.tier_dir(tier), tier)?;
        let tier_newest = archives.iter().max_by_key(|a| a.modified).cloned();
        if let Some(threshold) = config.monitor.freshness.threshold(tier)? {
            checks.push(check_freshness(tier, tier_newest.as_ref(), threshold, now));
        }
        if let Some(candidate) = tier_newest {
            if newest.as_ref().map_or(true, |n| candidate.modified > n.modified) {
                newest = Some(candidate);
            }
        }
    }

    checks.push(check_disk(config));
    checks.push(check_integrity(engine, newest.as_ref()));

    for check in &checks {
        match check.status {
            Status::Ok | Status::Skipped => info!("{}", check.status_line()),
            Status::Degraded | Status::Critical => warn!("{}", check.status_line()),
        }
    }
    Ok(MonitorReport { checks })
}

fn check_freshness(
    tier: Tier,
    newest: Option<&ArchiveEntry>,
    threshold: std::time::Duration,
    now: SystemTime,
) -> CheckResult {
    let name = format!("freshness.{tier}");
    let Some(entry) = newest else {
        return CheckResult::new(name, Status::Degraded, "no backups found");
    };
    let age = now.duration_since(entry.modified).unwrap_or_default();
    let detail = format!(
        "newest {} is {} old (threshold {})",
        entry.file_name(),
        humanize_duration(age),
        humanize_duration(threshold)
    );
    let status = if age > threshold {
        Status::Degraded
    } else {
        Status::Ok
    };
    CheckResult::new(name, status, detail)
}

fn check_disk(config: &TsvaultConfig) -> CheckResult {
    let root = &config.storage.root;
    let usage = match disk_usage(root) {
        Ok(u) => u,
        Err(e) => {
            return CheckResult::new(
                "storage",
                Status::Degraded,
                format!("cannot read usage of {}: {e}", root.display()),
            )
        }
    };
    let percent = usage.used_percent();
    let warning = config.monitor.disk_warning_percent;
    let critical = config.monitor.disk_critical_percent;
    CheckResult::new(
        "storage",
        disk_status(percent, warning, critical),
        format!(
            "{percent}% used on {} (warning {warning}%, critical {critical}%)",
            root.display()
        ),
    )
}

/// At or above `critical` is critical, at or above `warning` degraded.
fn disk_status(percent: u8, warning: u8, critical: u8) -> Status {
    if percent >= critical {
        Status::Critical
    } else if percent >= warning {
        Status::Degraded
    } else {
        Status::Ok
    }
}

fn check_integrity(engine: &dyn DatabaseEngine, newest: Option<&ArchiveEntry>) -> CheckResult {
    let Some(entry) = newest else {
        return CheckResult::new("integrity", Status::Skipped, "no archive to verify");
    };
    match verify_archive(engine, &entry.path) {
        Ok(entries) => CheckResult::new(
            "integrity",
            Status::Ok,
            format!("{} lists {entries} entries", entry.file_name()),
        ),
        Err(e) => CheckResult::new("integrity", Status::Critical, e.to_string()),
    }
}
