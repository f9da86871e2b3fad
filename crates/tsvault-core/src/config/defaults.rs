use std::time::Duration;

use crate::error::{Result, TsvaultError};

pub(super) fn default_host() -> String {
    "localhost".to_string()
}

pub(super) fn default_port() -> u16 {
    5432
}

pub(super) fn default_user() -> String {
    "postgres".to_string()
}

pub(super) fn default_maintenance_db() -> String {
    "postgres".to_string()
}

/// Extensions every restore target gets before replay.
pub(super) fn default_extensions() -> Vec<String> {
    vec![
        "timescaledb".to_string(),
        "pgcrypto".to_string(),
        "uuid-ossp".to_string(),
    ]
}

pub(super) fn default_daily_retention() -> String {
    "7d".to_string()
}

pub(super) fn default_weekly_retention() -> String {
    "4w".to_string()
}

pub(super) fn default_monthly_retention() -> String {
    "365d".to_string()
}

pub(super) fn default_compression_level() -> u8 {
    6
}

pub(super) fn default_parallel_jobs() -> u32 {
    4
}

pub(super) fn default_verify() -> bool {
    true
}

pub(super) fn default_command_timeout() -> String {
    "6h".to_string()
}

pub(super) fn default_daily_freshness() -> String {
    "30h".to_string()
}

pub(super) fn default_weekly_freshness() -> String {
    "8d".to_string()
}

pub(super) fn default_disk_warning_percent() -> u8 {
    80
}

pub(super) fn default_disk_critical_percent() -> u8 {
    90
}

pub(super) fn default_s3_region() -> String {
    "us-east-1".to_string()
}

pub(super) fn default_max_retries() -> usize {
    3
}

pub(super) fn default_retry_delay_ms() -> u64 {
    1000
}

pub(super) fn default_retry_max_delay_ms() -> u64 {
    60_000
}

pub(super) fn default_daily_cron() -> String {
    "0 2 * * *".to_string()
}

pub(super) fn default_weekly_cron() -> String {
    "0 3 * * 0".to_string()
}

pub(super) fn default_monthly_cron() -> String {
    "0 4 1 * *".to_string()
}

pub(super) fn default_monitor_cron() -> String {
    "0 * * * *".to_string()
}

/// Parse a simple duration string like "90s", "30m", "4h", "7d" or "2w".
/// A bare number is taken as days.
pub fn parse_human_duration(raw: &str) -> Result<Duration> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(TsvaultError::Config("duration must not be empty".into()));
    }

    let (num_part, unit) = match input.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&input[..input.len() - 1], Some(c)),
        Some(_) => (input, None),
        None => {
            return Err(TsvaultError::Config("duration must not be empty".into()));
        }
    };

    let value: u64 = num_part
        .trim()
        .parse()
        .map_err(|_| TsvaultError::Config(format!("invalid duration value: '{raw}'")))?;

    let secs = match unit {
        Some('s') | Some('S') => value,
        Some('m') | Some('M') => value.saturating_mul(60),
        Some('h') | Some('H') => value.saturating_mul(60 * 60),
        Some('d') | Some('D') => value.saturating_mul(60 * 60 * 24),
        Some('w') | Some('W') => value.saturating_mul(60 * 60 * 24 * 7),
        Some(other) => {
            return Err(TsvaultError::Config(format!(
                "unsupported duration suffix '{other}' in '{raw}' (use s/m/h/d/w)"
            )));
        }
        None => value.saturating_mul(60 * 60 * 24),
    };

    if secs == 0 {
        return Err(TsvaultError::Config(
            "duration must be greater than zero".into(),
        ));
    }

    Ok(Duration::from_secs(secs))
}
