mod cli;
mod cmd;
mod config_gen;
mod dispatch;
mod format;
mod logging;
mod signal;
mod table;

use clap::Parser;

use tsvault_core::commands::monitor::MonitorReport;

use cli::{Cli, Commands};
use config_gen::run_config_generate;
use dispatch::{component_for, dispatch_command, exit_code_for, load, open_job_log};

fn main() {
    let cli = Cli::parse();

    // Handle `config` subcommand early — no config file needed
    if let Commands::Config { dest } = &cli.command {
        logging::init(cli.verbose, None);
        if let Err(e) = run_config_generate(dest.as_deref()) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let (source, cfg) = match load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init(cli.verbose, None);
            match &cli.command {
                // Health checks still answer without a configuration.
                Commands::Monitor => {
                    let report = MonitorReport::unconfigured(&e.to_string());
                    cmd::monitor::print_report(&report);
                    std::process::exit(report.exit_code());
                }
                Commands::Report { .. } => {
                    cmd::report::print_unconfigured(&e.to_string());
                    return;
                }
                _ => {
                    eprintln!("Error: {e}");
                    std::process::exit(e.exit_code());
                }
            }
        }
    };

    let job_log = component_for(&cli.command).and_then(|c| open_job_log(&cfg, c));
    logging::init(cli.verbose, job_log);
    signal::install_signal_handlers();

    tracing::info!(command = cli.command.name(), "using config: {source}");

    match dispatch_command(&cli.command, &cfg, &source) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(exit_code_for(e.as_ref()));
        }
    }
}
