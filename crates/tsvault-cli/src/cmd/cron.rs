use std::path::Path;

use tsvault_core::commands::schedule::{cron_entries, render_crontab};
use tsvault_core::config::TsvaultConfig;

/// Print crontab entries that run this executable against the active config.
pub(crate) fn run_cron(
    config: &TsvaultConfig,
    config_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let exe = std::env::current_exe()?;
    // cron runs from $HOME; relative config paths must not survive.
    let config_path = std::fs::canonicalize(config_path)?;
    print!("{}", render_crontab(&cron_entries(config, &exe, &config_path)));
    Ok(())
}
