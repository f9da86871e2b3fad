use std::fs::File;
use std::path::Path;

use tsvault_core::config::{self, ConfigSource, TsvaultConfig};
use tsvault_core::error::TsvaultError;
use tsvault_core::joblog::{self, Component, Outcome};

use crate::cli::Commands;
use crate::cmd;

/// Find and load the configuration. A missing file is reported as a usage
/// error naming every place that was searched.
pub(crate) fn load(cli_config: Option<&str>) -> Result<(ConfigSource, TsvaultConfig), TsvaultError> {
    let Some(source) = config::resolve_config_path(cli_config) else {
        let searched: Vec<String> = config::default_config_search_paths()
            .iter()
            .map(|(path, _)| path.display().to_string())
            .collect();
        return Err(TsvaultError::Usage(format!(
            "no configuration file found (searched {}); run `tsvault config` to create one",
            searched.join(", ")
        )));
    };
    let cfg = config::load_config(source.path())?;
    Ok((source, cfg))
}

/// The job log a command writes to, if any.
pub(crate) fn component_for(cmd: &Commands) -> Option<Component> {
    match cmd {
        Commands::Backup { .. } => Some(Component::Backup),
        Commands::Restore { .. } => Some(Component::Restore),
        Commands::Monitor => Some(Component::Monitor),
        _ => None,
    }
}

/// Open today's job log for the tracing layer. Failure only costs the log copy.
pub(crate) fn open_job_log(cfg: &TsvaultConfig, component: Component) -> Option<File> {
    let path = joblog::today_path(&cfg.storage.log_dir(), component);
    match joblog::open_append(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: cannot open job log {}: {e}", path.display());
            None
        }
    }
}

/// Append the `[SUCCESS]` / `[FAILURE]` line that closes every run.
pub(crate) fn record_outcome(
    cfg: &TsvaultConfig,
    component: Component,
    outcome: Outcome,
    message: &str,
) {
    if let Err(e) = joblog::append_marker(&cfg.storage.log_dir(), component, outcome, message) {
        tracing::warn!(component = component.as_str(), "failed to write job log marker: {e}");
    }
}

/// Run a command that has a loaded configuration. Returns the exit code.
pub(crate) fn dispatch_command(
    cmd: &Commands,
    cfg: &TsvaultConfig,
    source: &ConfigSource,
) -> Result<i32, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Backup { tier } => cmd::backup::run_backup(cfg, *tier).map(|()| 0),
        Commands::Restore { archive, target } => {
            cmd::restore::run_restore(cfg, Path::new(archive), target.as_deref()).map(|()| 0)
        }
        Commands::Monitor => cmd::monitor::run_monitor(cfg),
        Commands::Report { lines } => {
            cmd::report::run_report(cfg, *lines);
            Ok(0)
        }
        Commands::Cron => cmd::cron::run_cron(cfg, source.path()).map(|()| 0),
        Commands::Config { .. } => Err("config is handled before configuration loading".into()),
    }
}

/// Exit code for an error that reached `main`: the core's classification when
/// it is a [`TsvaultError`], 1 otherwise.
pub(crate) fn exit_code_for(err: &(dyn std::error::Error + 'static)) -> i32 {
    err.downcast_ref::<TsvaultError>()
        .map_or(1, TsvaultError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_map_to_two() {
        let err: Box<dyn std::error::Error> =
            Box::new(TsvaultError::ArchiveNotFound("/x.dump".into()));
        assert_eq!(exit_code_for(err.as_ref()), 2);
    }

    #[test]
    fn foreign_errors_map_to_one() {
        let err: Box<dyn std::error::Error> = "boom".into();
        assert_eq!(exit_code_for(err.as_ref()), 1);
    }

    #[test]
    fn only_running_commands_have_job_logs() {
        assert_eq!(component_for(&Commands::Monitor), Some(Component::Monitor));
        assert_eq!(component_for(&Commands::Cron), None);
        assert_eq!(component_for(&Commands::Report { lines: 5 }), None);
    }
}
