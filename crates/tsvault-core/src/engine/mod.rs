//! Boundary between orchestration and the PostgreSQL client tools.
//!
//! Everything the commands need from the database goes through
//! [`DatabaseEngine`]. The production implementation shells out to `psql`,
//! `pg_dump` and `pg_restore`; tests substitute an in-memory engine.

pub mod pg;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub use self::pg::PgTools;

/// Longest identifier PostgreSQL keeps without truncation (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

pub const SERVER_VERSION_SQL: &str = "SHOW server_version";
pub const TIMESCALEDB_VERSION_SQL: &str =
    "SELECT extversion FROM pg_extension WHERE extname = 'timescaledb'";
pub const DATABASE_SIZE_SQL: &str = "SELECT pg_database_size(current_database())";
pub const TABLE_COUNT_SQL: &str = "SELECT count(*) FROM information_schema.tables \
     WHERE table_type = 'BASE TABLE' \
     AND table_schema NOT IN ('pg_catalog', 'information_schema') \
     AND table_schema NOT LIKE '\\_timescaledb%' \
     AND table_schema NOT LIKE 'timescaledb\\_%'";
pub const HYPERTABLE_COUNT_SQL: &str = "SELECT count(*) FROM timescaledb_information.hypertables";
pub const CHUNK_COUNT_SQL: &str = "SELECT count(*) FROM timescaledb_information.chunks";

pub const PRE_RESTORE_SQL: &str = "SELECT timescaledb_pre_restore()";
pub const POST_RESTORE_SQL: &str = "SELECT timescaledb_post_restore()";

/// Operations the backup, restore and monitor flows need from a database
/// server. Every call blocks until the underlying tool exits.
pub trait DatabaseEngine {
    /// Run a single read-only statement against `database` and return the
    /// first column of the first row, trimmed. An empty result set yields an
    /// empty string.
    fn query_scalar(&self, database: &str, sql: &str) -> Result<String>;

    /// Run a statement for its side effect.
    fn execute(&self, database: &str, sql: &str) -> Result<()>;

    /// Dump `database` in custom format to `dest`.
    fn dump(&self, database: &str, dest: &Path, compression_level: u8) -> Result<()>;

    /// Read the table of contents of an archive without extracting data.
    /// Returns the number of TOC entries.
    fn list_contents(&self, archive: &Path) -> Result<usize>;

    fn create_database(&self, name: &str) -> Result<()>;

    /// `DROP DATABASE IF EXISTS`.
    fn drop_database(&self, name: &str) -> Result<()>;

    /// Replay an archive into an existing database.
    fn restore(&self, archive: &Path, target: &str, jobs: u32) -> Result<()>;
}

/// Descriptive statistics captured before a dump and after a restore.
/// Fields whose query failed are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub server_version: Option<String>,
    pub timescaledb_version: Option<String>,
    pub database_size_bytes: Option<u64>,
    pub table_count: Option<u64>,
    pub hypertable_count: Option<u64>,
    pub chunk_count: Option<u64>,
}

/// Issue each statistics query as its own statement. A failing query is
/// logged and left absent; it never fails the caller.
pub fn collect_stats(engine: &dyn DatabaseEngine, database: &str) -> DatabaseStats {
    DatabaseStats {
        server_version: text_stat(engine, database, "server_version", SERVER_VERSION_SQL),
        timescaledb_version: text_stat(
            engine,
            database,
            "timescaledb_version",
            TIMESCALEDB_VERSION_SQL,
        ),
        database_size_bytes: count_stat(engine, database, "database_size", DATABASE_SIZE_SQL),
        table_count: count_stat(engine, database, "table_count", TABLE_COUNT_SQL),
        hypertable_count: count_stat(engine, database, "hypertable_count", HYPERTABLE_COUNT_SQL),
        chunk_count: count_stat(engine, database, "chunk_count", CHUNK_COUNT_SQL),
    }
}

/// Table and hypertable counts only; used to check a restored database.
pub fn collect_counts(engine: &dyn DatabaseEngine, database: &str) -> (Option<u64>, Option<u64>) {
    (
        count_stat(engine, database, "table_count", TABLE_COUNT_SQL),
        count_stat(engine, database, "hypertable_count", HYPERTABLE_COUNT_SQL),
    )
}

fn text_stat(
    engine: &dyn DatabaseEngine,
    database: &str,
    field: &str,
    sql: &str,
) -> Option<String> {
    match engine.query_scalar(database, sql) {
        Ok(v) if v.is_empty() => None,
        Ok(v) => Some(v),
        Err(e) => {
            warn!(field, error = %e, "metadata query failed");
            None
        }
    }
}

fn count_stat(engine: &dyn DatabaseEngine, database: &str, field: &str, sql: &str) -> Option<u64> {
    let raw = text_stat(engine, database, field, sql)?;
    match raw.parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(field, value = %raw, "metadata query returned a non-numeric value");
            None
        }
    }
}

/// Whether `name` is a plain, unquoted PostgreSQL identifier:
/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
