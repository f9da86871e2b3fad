use std::path::Path;

use crate::config::TsvaultConfig;
use crate::tier::Tier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub schedule: String,
    pub command: String,
    pub label: String,
}

impl CronEntry {
    pub fn line(&self) -> String {
        format!("{} {}", self.schedule, self.command)
    }
}

/// One entry per tier plus the hourly health check, each invoking `exe`
/// with an explicit `--config` so cron's minimal environment finds it.
pub fn cron_entries(config: &TsvaultConfig, exe: &Path, config_path: &Path) -> Vec<CronEntry> {
    let base = format!(
        "{} --config {}",
        cron_quote(&exe.display().to_string()),
        cron_quote(&config_path.display().to_string())
    );

    let mut entries: Vec<CronEntry> = Tier::ALL
        .iter()
        .map(|&tier| CronEntry {
            schedule: config.schedule.for_tier(tier).to_string(),
            command: format!("{base} backup {tier}"),
            label: format!("{tier} backup"),
        })
        .collect();
    entries.push(CronEntry {
        schedule: config.schedule.monitor.clone(),
        command: format!("{base} monitor"),
        label: "health check".into(),
    });
    entries
}

/// Crontab text with a comment above each entry.
pub fn render_crontab(entries: &[CronEntry]) -> String {
    let mut out = String::from("# tsvault: TimescaleDB backups\n");
    for entry in entries {
        out.push_str(&format!("# {}\n{}\n", entry.label, entry.line()));
    }
    out
}

/// Single-quote for `sh` when needed and escape `%`, which cron turns into
/// a newline.
fn cron_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,".contains(c));
    let quoted = if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    };
    quoted.replace('%', "\\%")
}
