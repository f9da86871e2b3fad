use clap::{Parser, Subcommand};

use tsvault_core::tier::Tier;

#[derive(Parser)]
#[command(
    name = "tsvault",
    version,
    about = "Tiered backups for PostgreSQL/TimescaleDB",
    after_help = "\
Configuration file lookup order:
  1. --config <path>             (explicit flag)
  2. $TSVAULT_CONFIG             (environment variable)
  3. ./tsvault.yaml              (project)
  4. $XDG_CONFIG_HOME/tsvault/config.yaml (or ~/.config/tsvault/config.yaml)
  5. /etc/tsvault/config.yaml    (system)

Exit codes:
  0  success (monitor: all checks OK)
  1  failed run (monitor: degraded or unconfigured)
  2  usage error (monitor: critical)"
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides TSVAULT_CONFIG and default search)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Dump the database into a new archive of the given tier, verify it and
    /// prune the tier
    Backup {
        /// Tier to write: daily, weekly or monthly
        tier: Tier,
    },

    /// Replay an archive into a new scratch database
    Restore {
        /// Path to a .dump archive
        archive: String,

        /// Name of the database to create (default: <db>_restored_<timestamp>)
        target: Option<String>,
    },

    /// Check backup freshness, disk usage and the newest archive
    Monitor,

    /// Summarize archives per tier and the last backup run
    Report {
        /// Number of trailing lines to show from the latest backup log
        #[arg(long, default_value_t = 20)]
        lines: usize,
    },

    /// Print crontab entries for the configured schedule
    Cron,

    /// Generate a starter configuration file
    Config {
        /// Destination path (default: ./tsvault.yaml)
        #[arg(short, long)]
        dest: Option<String>,
    },
}

impl Commands {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Commands::Backup { .. } => "backup",
            Commands::Restore { .. } => "restore",
            Commands::Monitor => "monitor",
            Commands::Report { .. } => "report",
            Commands::Cron => "cron",
            Commands::Config { .. } => "config",
        }
    }
}
