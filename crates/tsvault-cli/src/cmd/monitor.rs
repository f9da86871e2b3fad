use std::time::SystemTime;

use tsvault_core::commands::{self, monitor::MonitorReport, monitor::Status};
use tsvault_core::config::TsvaultConfig;
use tsvault_core::engine::pg::PgTools;
use tsvault_core::hooks::{self, HookContext};
use tsvault_core::joblog::{Component, Outcome};

use crate::dispatch::record_outcome;

/// Run all checks, print one line per check and return the monitor's exit
/// code. Anything worse than OK runs the `failed` hooks.
pub(crate) fn run_monitor(config: &TsvaultConfig) -> Result<i32, Box<dyn std::error::Error>> {
    let mut ctx = HookContext::new("monitor", &config.database.name);

    let result = hooks::run_with_hooks(&config.hooks, &mut ctx, |ctx| {
        let engine = PgTools::from_config(config)?;
        let report = commands::monitor::run(config, &engine, SystemTime::now())?;
        if report.status() > Status::Ok {
            ctx.error = Some(report.summary());
        }
        Ok(report)
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            record_outcome(config, Component::Monitor, Outcome::Failure, &format!("monitor: {e}"));
            return Err(e.into());
        }
    };

    print_report(&report);
    let outcome = if report.exit_code() == 0 {
        Outcome::Success
    } else {
        Outcome::Failure
    };
    record_outcome(config, Component::Monitor, outcome, &report.summary());
    Ok(report.exit_code())
}

/// Status lines for stdout. The core already logs each check, which is what
/// lands in the monitor job log.
pub(crate) fn print_report(report: &MonitorReport) {
    for check in &report.checks {
        println!("{}", check.status_line());
    }
}
