//! Per-day, per-component append-only job logs.
//!
//! `<log_dir>/<component>-YYYY-MM-DD.log` receives the formatted tracing
//! output of a run plus exactly one marker line per invocation:
//!
//! ```text
//! 2026-03-14T02:00:41+01:00 [SUCCESS] backup daily: tsdb_daily_20260314_020007.dump
//! 2026-03-15T02:00:12+01:00 [FAILURE] backup daily: pg_dump failed (exit code 1): ...
//! ```
//!
//! Readers only look for the bracketed markers, never at tracing formatting.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, SecondsFormat};

use crate::error::Result;

pub const SUCCESS_MARKER: &str = "[SUCCESS]";
pub const FAILURE_MARKER: &str = "[FAILURE]";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which flow a log belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Backup,
    Restore,
    Monitor,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Backup => "backup",
            Component::Restore => "restore",
            Component::Monitor => "monitor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn marker(self) -> &'static str {
        match self {
            Outcome::Success => SUCCESS_MARKER,
            Outcome::Failure => FAILURE_MARKER,
        }
    }
}

pub fn log_path(log_dir: &Path, component: Component, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}-{}.log", component.as_str(), date.format(DATE_FORMAT)))
}

/// Today's log file (local calendar day).
pub fn today_path(log_dir: &Path, component: Component) -> PathBuf {
    log_path(log_dir, component, Local::now().date_naive())
}

/// Open a log file for appending, creating it and its directory as needed.
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Append one marker line to today's log of `component`.
pub fn append_marker(
    log_dir: &Path,
    component: Component,
    outcome: Outcome,
    message: &str,
) -> Result<()> {
    let mut file = open_append(&today_path(log_dir, component))?;
    let line = format!(
        "{} {} {}\n",
        Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        outcome.marker(),
        message.replace('\n', " "),
    );
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Most recent log of `component` in `log_dir`, judged by the date in its
/// file name.
pub fn latest_log(log_dir: &Path, component: Component) -> Result<Option<PathBuf>> {
    let read_dir = match std::fs::read_dir(log_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let prefix = format!("{}-", component.as_str());

    let mut best: Option<(NaiveDate, PathBuf)> = None;
    for entry in read_dir {
        let entry = entry?;
        let name = entry.file_name();
        let Some(date) = name
            .to_str()
            .and_then(|n| n.strip_prefix(&prefix))
            .and_then(|n| n.strip_suffix(".log"))
            .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(d, _)| date > *d) {
            best = Some((date, entry.path()));
        }
    }
    Ok(best.map(|(_, p)| p))
}

/// Last `n` lines of a log file.
pub fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = std::collections::VecDeque::with_capacity(n.min(1024));
    for line in reader.lines() {
        let line = line?;
        if n == 0 {
            continue;
        }
        if lines.len() == n {
            lines.pop_front();
        }
        lines.push_back(line);
    }
    Ok(lines.into_iter().collect())
}

/// Outcome of the last run recorded in a log file, if any marker exists.
pub fn last_outcome(path: &Path) -> Result<Option<(Outcome, String)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut last = None;
    for line in reader.lines() {
        let line = line?;
        if line.contains(SUCCESS_MARKER) {
            last = Some((Outcome::Success, line));
        } else if line.contains(FAILURE_MARKER) {
            last = Some((Outcome::Failure, line));
        }
    }
    Ok(last)
}
