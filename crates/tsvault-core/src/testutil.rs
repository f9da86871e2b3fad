use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::config::{parse_config, TsvaultConfig};
use crate::engine::{
    DatabaseEngine, CHUNK_COUNT_SQL, DATABASE_SIZE_SQL, HYPERTABLE_COUNT_SQL, SERVER_VERSION_SQL,
    TABLE_COUNT_SQL, TIMESCALEDB_VERSION_SQL,
};
use crate::error::{Result, TsvaultError};
use crate::storage::Uploader;

const DUMP_MAGIC: &str = "PGDMP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeDb {
    pub tables: u64,
    pub hypertables: u64,
}

#[derive(Default)]
struct FakeState {
    databases: HashMap<String, FakeDb>,
    failing_sql: HashSet<String>,
    fail_dump: bool,
    fail_list: bool,
    fail_restore: bool,
    fail_drop: bool,
    calls: Vec<String>,
}

/// Scripted in-memory database server. Dumps are small text files that
/// carry the source counts so a restore reproduces them.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_database(&self, name: &str, tables: u64, hypertables: u64) {
        self.state
            .lock()
            .unwrap()
            .databases
            .insert(name.to_string(), FakeDb { tables, hypertables });
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state.lock().unwrap().databases.contains_key(name)
    }

    pub fn database(&self, name: &str) -> Option<FakeDb> {
        self.state.lock().unwrap().databases.get(name).copied()
    }

    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().unwrap().databases.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn fail_query(&self, sql: &str) {
        self.state.lock().unwrap().failing_sql.insert(sql.to_string());
    }

    pub fn fail_dump(&self) {
        self.state.lock().unwrap().fail_dump = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_restore(&self) {
        self.state.lock().unwrap().fail_restore = true;
    }

    pub fn fail_drop(&self) {
        self.state.lock().unwrap().fail_drop = true;
    }

    /// Every call in order, e.g. `dump tsdb`, `execute t1: SELECT ...`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn failed(tool: &str, stderr: &str) -> TsvaultError {
    TsvaultError::CommandFailed {
        tool: tool.to_string(),
        code: "1".into(),
        stderr: stderr.to_string(),
    }
}

impl DatabaseEngine for FakeEngine {
    fn query_scalar(&self, database: &str, sql: &str) -> Result<String> {
        self.record(format!("query {database}: {sql}"));
        let state = self.state.lock().unwrap();
        if state.failing_sql.contains(sql) {
            return Err(failed("psql", "ERROR: scripted failure"));
        }
        let db = state.databases.get(database).ok_or_else(|| {
            failed("psql", &format!("FATAL: database \"{database}\" does not exist"))
        })?;
        let answer = match sql {
            SERVER_VERSION_SQL => "16.2".to_string(),
            TIMESCALEDB_VERSION_SQL => "2.14.2".to_string(),
            DATABASE_SIZE_SQL => (8192 * (db.tables + 1)).to_string(),
            TABLE_COUNT_SQL => db.tables.to_string(),
            HYPERTABLE_COUNT_SQL => db.hypertables.to_string(),
            CHUNK_COUNT_SQL => (db.hypertables * 10).to_string(),
            _ => String::new(),
        };
        Ok(answer)
    }

    fn execute(&self, database: &str, sql: &str) -> Result<()> {
        self.record(format!("execute {database}: {sql}"));
        let state = self.state.lock().unwrap();
        if state.failing_sql.contains(sql) {
            return Err(failed("psql", "ERROR: scripted failure"));
        }
        if !state.databases.contains_key(database) {
            return Err(failed(
                "psql",
                &format!("FATAL: database \"{database}\" does not exist"),
            ));
        }
        Ok(())
    }

    fn dump(&self, database: &str, dest: &Path, _compression_level: u8) -> Result<()> {
        self.record(format!("dump {database}"));
        let state = self.state.lock().unwrap();
        if state.fail_dump {
            std::fs::write(dest, DUMP_MAGIC)?;
            return Err(failed("pg_dump", "pg_dump: error: connection lost"));
        }
        let db = state.databases.get(database).ok_or_else(|| {
            failed("pg_dump", &format!("database \"{database}\" does not exist"))
        })?;
        std::fs::write(
            dest,
            format!("{DUMP_MAGIC}\n{database}\n{}\n{}\n", db.tables, db.hypertables),
        )?;
        Ok(())
    }

    fn list_contents(&self, archive: &Path) -> Result<usize> {
        self.record(format!("list {}", archive.display()));
        if self.state.lock().unwrap().fail_list {
            return Err(failed("pg_restore", "pg_restore: error: corrupt archive"));
        }
        let body = std::fs::read_to_string(archive)?;
        let (tables, hypertables) = parse_dump(&body)
            .ok_or_else(|| failed("pg_restore", "input file does not appear to be a valid archive"))?;
        Ok((tables + hypertables) as usize)
    }

    fn create_database(&self, name: &str) -> Result<()> {
        self.record(format!("create {name}"));
        let mut state = self.state.lock().unwrap();
        if state.databases.contains_key(name) {
            return Err(failed("psql", &format!("database \"{name}\" already exists")));
        }
        state.databases.insert(
            name.to_string(),
            FakeDb {
                tables: 0,
                hypertables: 0,
            },
        );
        Ok(())
    }

    fn drop_database(&self, name: &str) -> Result<()> {
        self.record(format!("drop {name}"));
        let mut state = self.state.lock().unwrap();
        if state.fail_drop {
            return Err(failed("psql", "database is being accessed by other users"));
        }
        state.databases.remove(name);
        Ok(())
    }

    fn restore(&self, archive: &Path, target: &str, jobs: u32) -> Result<()> {
        self.record(format!("restore {target} jobs={jobs}"));
        let body = std::fs::read_to_string(archive)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_restore {
            // Replay got partway before failing.
            if let Some(db) = state.databases.get_mut(target) {
                db.tables = 1;
            }
            return Err(failed("pg_restore", "pg_restore: error: could not execute query"));
        }
        let (tables, hypertables) = parse_dump(&body)
            .ok_or_else(|| failed("pg_restore", "input file does not appear to be a valid archive"))?;
        let db = state
            .databases
            .get_mut(target)
            .ok_or_else(|| failed("pg_restore", "target database does not exist"))?;
        *db = FakeDb { tables, hypertables };
        Ok(())
    }
}

fn parse_dump(body: &str) -> Option<(u64, u64)> {
    let mut lines = body.lines();
    if lines.next()? != DUMP_MAGIC {
        return None;
    }
    lines.next()?;
    let tables = lines.next()?.parse().ok()?;
    let hypertables = lines.next()?.parse().ok()?;
    Some((tables, hypertables))
}

/// Uploader that records object keys, optionally failing every call.
#[derive(Default)]
pub struct RecordingUploader {
    keys: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl Uploader for RecordingUploader {
    fn upload_file(&self, key: &str, path: &Path) -> Result<()> {
        if self.fail {
            return Err(TsvaultError::Upload(format!("S3 PUT {key}: 503 Slow Down")));
        }
        assert!(path.is_file(), "uploading missing file {}", path.display());
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".into()
    }
}

/// Minimal valid configuration rooted at `root`.
pub fn test_config(root: &Path) -> TsvaultConfig {
    let yaml = format!(
        "database:\n  name: tsdb\nstorage:\n  root: {}\n",
        root.display()
    );
    parse_config(&yaml, Path::new("test.yaml")).unwrap()
}

/// Backdate a file's modification time by `age`.
pub fn set_age(path: &Path, age: Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86_400)
}

/// Write a plausible archive plus sidecar stub and return the archive path.
pub fn write_archive(dir: &Path, file_name: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(file_name);
    std::fs::write(&path, format!("{DUMP_MAGIC}\ntsdb\n3\n1\n")).unwrap();
    std::fs::write(crate::archive::metadata_path(&path), "{}").unwrap();
    path
}

/// An archive-named file whose body is not a dump; no sidecar.
pub fn write_corrupt_archive(dir: &Path, file_name: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(file_name);
    std::fs::write(&path, "truncated").unwrap();
    path
}
