use std::path::Path;

use tsvault_core::commands;
use tsvault_core::config::TsvaultConfig;
use tsvault_core::engine::pg::PgTools;
use tsvault_core::hooks::{self, HookContext};
use tsvault_core::joblog::{Component, Outcome};

use crate::dispatch::record_outcome;
use crate::signal::SHUTDOWN;

/// Restore into a new database. The target name is the only thing written to
/// stdout so scripts can capture it.
pub(crate) fn run_restore(
    config: &TsvaultConfig,
    archive: &Path,
    target: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = HookContext::new("restore", &config.database.name);
    ctx.archive = Some(archive.display().to_string());

    let result = hooks::run_with_hooks(&config.hooks, &mut ctx, |_| {
        let engine = PgTools::from_config(config)?;
        commands::restore::run(config, &engine, archive, target, Some(&SHUTDOWN))
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            record_outcome(
                config,
                Component::Restore,
                Outcome::Failure,
                &format!("restore of {}: {e}", archive.display()),
            );
            return Err(e.into());
        }
    };

    for mismatch in &report.mismatches {
        eprintln!("Warning: {mismatch}");
    }
    let counts = match (report.table_count, report.hypertable_count) {
        (Some(t), Some(h)) => format!(" ({t} tables, {h} hypertables)"),
        _ => String::new(),
    };
    record_outcome(
        config,
        Component::Restore,
        Outcome::Success,
        &format!("restored {} into {}{counts}", archive.display(), report.target),
    );
    eprintln!("Restored {} into database '{}'{counts}", archive.display(), report.target);
    println!("{}", report.target);
    Ok(())
}
