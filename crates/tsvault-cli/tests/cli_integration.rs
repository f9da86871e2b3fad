use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct CliFixture {
    _tmp: TempDir,
    work_dir: PathBuf,
    home_dir: PathBuf,
    backup_root: PathBuf,
    config_path: PathBuf,
}

impl CliFixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");
        let home_dir = tmp.path().join("home");
        let backup_root = tmp.path().join("backups");
        let config_path = tmp.path().join("tsvault.yaml");

        std::fs::create_dir_all(&work_dir).unwrap();
        std::fs::create_dir_all(&home_dir).unwrap();

        Self {
            _tmp: tmp,
            work_dir,
            home_dir,
            backup_root,
            config_path,
        }
    }

    /// Fixture with a config whose client tools do not exist, so nothing can
    /// reach a database.
    fn configured() -> Self {
        let fx = Self::new();
        let yaml = format!(
            "database:\n  name: tsdb\n  bin_dir: {}\nstorage:\n  root: {}\n",
            fx.home_dir.join("no-such-bin").display(),
            fx.backup_root.display()
        );
        std::fs::write(&fx.config_path, yaml).unwrap();
        fx
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(tsvault_binary_path());
        cmd.args(args);
        cmd.current_dir(&self.work_dir);
        cmd.env_remove("TSVAULT_CONFIG");
        cmd.env("HOME", &self.home_dir);
        cmd.env("XDG_CONFIG_HOME", self.home_dir.join(".config"));
        cmd.env("NO_COLOR", "1");
        cmd.output().unwrap()
    }

    fn run_with_config(&self, args: &[&str]) -> Output {
        let mut full = vec!["--config", self.config_path.to_str().unwrap()];
        full.extend_from_slice(args);
        self.run(&full)
    }
}

fn tsvault_binary_path() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_tsvault"))
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn unknown_tier_is_a_usage_error() {
    let fx = CliFixture::configured();
    let out = fx.run_with_config(&["backup", "hourly"]);
    assert_eq!(out.status.code(), Some(2), "stderr: {}", stderr(&out));
    assert!(!fx.backup_root.exists(), "no side effects on usage errors");
}

#[test]
fn backup_without_config_is_a_usage_error() {
    let fx = CliFixture::new();
    let out = fx.run(&["backup", "daily"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("no configuration file found"));
}

#[test]
fn explicit_config_that_does_not_exist_is_a_usage_error() {
    let fx = CliFixture::new();
    let out = fx.run_with_config(&["restore", "/tmp/whatever.dump"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("cannot read"));
}

#[test]
fn restore_of_missing_archive_is_a_usage_error() {
    let fx = CliFixture::configured();
    let missing = fx.backup_root.join("daily/tsdb_daily_20260314_020000.dump");
    let out = fx.run_with_config(&["restore", missing.to_str().unwrap(), "scratch"]);
    assert_eq!(out.status.code(), Some(2), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("archive not found"));
    assert!(stdout(&out).is_empty());
}

#[test]
fn restore_failure_is_recorded_in_the_job_log() {
    let fx = CliFixture::configured();
    let out = fx.run_with_config(&["restore", "/nonexistent/x.dump"]);
    assert_eq!(out.status.code(), Some(2));

    let logs: Vec<_> = std::fs::read_dir(fx.backup_root.join("logs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let name = logs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("restore-") && name.ends_with(".log"), "{name}");
    let body = std::fs::read_to_string(&logs[0]).unwrap();
    assert!(body.contains("[FAILURE]"), "{body}");
}

#[test]
fn monitor_without_config_reports_unconfigured() {
    let fx = CliFixture::new();
    let out = fx.run(&["monitor"]);
    assert_eq!(out.status.code(), Some(1));
    let text = stdout(&out);
    assert!(text.contains("[DEGRADED] configuration: unconfigured"), "{text}");
}

#[test]
fn monitor_logs_each_check_once() {
    let fx = CliFixture::configured();
    let out = fx.run_with_config(&["monitor"]);
    // Stale tiers are at least degraded; disk usage of the host may add more.
    assert_ne!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("[DEGRADED] freshness.daily: no backups found"));

    let logs: Vec<_> = std::fs::read_dir(fx.backup_root.join("logs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let body = std::fs::read_to_string(&logs[0]).unwrap();
    for name in ["freshness.daily:", "freshness.weekly:", "integrity:"] {
        assert_eq!(body.matches(name).count(), 1, "{name} in {body}");
    }
    assert!(body.contains("[FAILURE] status "), "{body}");
}

#[test]
fn report_without_config_exits_zero() {
    let fx = CliFixture::new();
    let out = fx.run(&["report"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("unconfigured"));
}

#[test]
fn report_on_empty_tree_lists_every_tier() {
    let fx = CliFixture::configured();
    let out = fx.run_with_config(&["report"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    for tier in ["daily", "weekly", "monthly"] {
        assert!(text.contains(tier), "{text}");
    }
    assert_eq!(text.matches("no backups found").count(), 3, "{text}");
    assert!(text.contains("no backup log found"), "{text}");
}

#[test]
fn report_shows_existing_archives() {
    let fx = CliFixture::configured();
    let daily = fx.backup_root.join("daily");
    std::fs::create_dir_all(&daily).unwrap();
    std::fs::write(daily.join("tsdb_daily_20260314_020000.dump"), b"PGDMP").unwrap();

    let out = fx.run_with_config(&["report", "--lines", "5"]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.contains("tsdb_daily_20260314_020000.dump"), "{text}");
    assert_eq!(text.matches("no backups found").count(), 2, "{text}");
}

#[test]
fn cron_prints_one_entry_per_tier_and_monitor() {
    let fx = CliFixture::configured();
    let out = fx.run_with_config(&["cron"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    let entries: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(entries.len(), 4, "{text}");
    assert!(entries[0].starts_with("0 2 * * * "));
    assert!(entries[0].ends_with(" backup daily"));
    assert!(entries[3].ends_with(" monitor"));
    assert!(entries.iter().all(|l| l.contains("--config")));
}

#[test]
fn config_generates_starter_file_once() {
    let fx = CliFixture::new();
    let out = fx.run(&["config"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let written = fx.work_dir.join("tsvault.yaml");
    let body = std::fs::read_to_string(&written).unwrap();
    assert!(body.contains("database:"));

    let again = fx.run(&["config"]);
    assert_eq!(again.status.code(), Some(1));
    assert!(stderr(&again).contains("already exists"));
}

#[test]
fn generated_config_is_found_from_the_working_directory() {
    let fx = CliFixture::new();
    let dest = fx.work_dir.join("tsvault.yaml");
    let out = fx.run(&["config", "--dest", dest.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(0));

    // The template points at a system path; cron only renders, it never
    // touches the backup tree.
    let cron = fx.run(&["cron"]);
    assert_eq!(cron.status.code(), Some(0), "stderr: {}", stderr(&cron));
    assert!(stdout(&cron).contains("backup weekly"));
}
