use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use tracing::debug;

use super::{quote_identifier, DatabaseEngine};
use crate::config::{DatabaseConfig, TsvaultConfig};
use crate::error::{Result, TsvaultError};
use crate::platform::shell::run_command_with_timeout;

const STDERR_TAIL_BYTES: usize = 2048;

/// [`DatabaseEngine`] backed by the stock PostgreSQL client binaries.
///
/// Connection parameters are passed as flags; the password, if configured,
/// travels through `PGPASSWORD`. `--no-password` keeps the tools from ever
/// prompting under cron.
pub struct PgTools {
    bin_dir: Option<PathBuf>,
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    maintenance_db: String,
    timeout: Duration,
}

impl PgTools {
    pub fn new(db: &DatabaseConfig, timeout: Duration) -> Self {
        Self {
            bin_dir: db.bin_dir.clone(),
            host: db.host.clone(),
            port: db.port,
            user: db.user.clone(),
            password: db.password.clone(),
            maintenance_db: db.maintenance_db.clone(),
            timeout,
        }
    }

    pub fn from_config(config: &TsvaultConfig) -> Result<Self> {
        Ok(Self::new(&config.database, config.command_timeout()?))
    }

    fn program(&self, tool: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    fn command(&self, tool: &str) -> Command {
        let mut cmd = Command::new(self.program(tool));
        cmd.arg("--host")
            .arg(&self.host)
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--username")
            .arg(&self.user)
            .arg("--no-password")
            .env("PGAPPNAME", "tsvault");
        if let Some(pw) = &self.password {
            cmd.env("PGPASSWORD", pw);
        }
        cmd
    }

    fn psql(&self, database: &str, sql: &str) -> Command {
        let mut cmd = self.command("psql");
        cmd.arg("--no-psqlrc")
            .arg("--tuples-only")
            .arg("--no-align")
            .arg("--set")
            .arg("ON_ERROR_STOP=1")
            .arg("--dbname")
            .arg(database)
            .arg("--command")
            .arg(sql);
        cmd
    }

    fn run(&self, tool: &str, mut cmd: Command) -> Result<Output> {
        debug!(tool, command = ?cmd, "running");
        let output = run_command_with_timeout(&mut cmd, self.timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                TsvaultError::Timeout {
                    tool: tool.to_string(),
                    secs: self.timeout.as_secs(),
                }
            } else {
                TsvaultError::CommandFailed {
                    tool: tool.to_string(),
                    code: "none".into(),
                    stderr: format!("failed to start {}: {e}", self.program(tool).display()),
                }
            }
        })?;

        if !output.status.success() {
            return Err(TsvaultError::CommandFailed {
                tool: tool.to_string(),
                code: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".into()),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(output)
    }
}

impl DatabaseEngine for PgTools {
    fn query_scalar(&self, database: &str, sql: &str) -> Result<String> {
        let output = self.run("psql", self.psql(database, sql))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or("").trim().to_string())
    }

    fn execute(&self, database: &str, sql: &str) -> Result<()> {
        self.run("psql", self.psql(database, sql))?;
        Ok(())
    }

    fn dump(&self, database: &str, dest: &Path, compression_level: u8) -> Result<()> {
        let mut cmd = self.command("pg_dump");
        cmd.arg("--format=custom")
            .arg(format!("--compress={compression_level}"))
            .arg("--file")
            .arg(dest)
            .arg("--dbname")
            .arg(database);
        self.run("pg_dump", cmd)?;
        Ok(())
    }

    fn list_contents(&self, archive: &Path) -> Result<usize> {
        // No --dbname: pg_restore reads the archive and never connects.
        let mut cmd = self.command("pg_restore");
        cmd.arg("--list").arg(archive);
        let output = self.run("pg_restore", cmd)?;
        Ok(count_toc_entries(&String::from_utf8_lossy(&output.stdout)))
    }

    fn create_database(&self, name: &str) -> Result<()> {
        self.execute(
            &self.maintenance_db,
            &format!("CREATE DATABASE {}", quote_identifier(name)),
        )
    }

    fn drop_database(&self, name: &str) -> Result<()> {
        self.execute(
            &self.maintenance_db,
            &format!("DROP DATABASE IF EXISTS {}", quote_identifier(name)),
        )
    }

    fn restore(&self, archive: &Path, target: &str, jobs: u32) -> Result<()> {
        let mut cmd = self.command("pg_restore");
        cmd.arg(format!("--jobs={jobs}"))
            .arg("--no-owner")
            .arg("--exit-on-error")
            .arg("--dbname")
            .arg(target)
            .arg(archive);
        self.run("pg_restore", cmd)?;
        Ok(())
    }
}

/// Non-comment, non-blank lines of `pg_restore --list` output.
fn count_toc_entries(listing: &str) -> usize {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(';'))
        .count()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
