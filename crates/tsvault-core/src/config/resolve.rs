use std::fmt;
use std::path::{Path, PathBuf};

use super::types::TsvaultConfig;
use crate::error::{Result, TsvaultError};
use crate::platform::paths;

/// Environment variable that overrides the config search.
pub const CONFIG_ENV_VAR: &str = "TSVAULT_CONFIG";

/// Expand `${VAR}` and `${VAR:-default}` placeholders in raw config text.
fn expand_env_placeholders(input: &str, path: &Path) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0usize;

    while let Some(offset) = input[cursor..].find("${") {
        let start = cursor + offset;
        out.push_str(&input[cursor..start]);

        let token_start = start + 2;
        let Some(token_end_rel) = input[token_start..].find('}') else {
            return Err(config_expand_error(
                path,
                input,
                start,
                "unterminated environment placeholder",
            ));
        };
        let token_end = token_start + token_end_rel;
        let token = &input[token_start..token_end];
        let replacement = resolve_env_token(token, path, input, start)?;
        out.push_str(&replacement);
        cursor = token_end + 1;
    }

    out.push_str(&input[cursor..]);
    Ok(out)
}

fn resolve_env_token(token: &str, path: &Path, input: &str, start: usize) -> Result<String> {
    let (name, default) = match token.find(":-") {
        Some(split_at) => (&token[..split_at], Some(&token[split_at + 2..])),
        None => (token, None),
    };

    if !is_valid_env_var_name(name) {
        return Err(config_expand_error(
            path,
            input,
            start,
            format!("invalid environment placeholder '{token}'"),
        ));
    }

    match (std::env::var(name), default) {
        (Ok(value), Some(default)) if value.is_empty() => Ok(default.to_string()),
        (Ok(value), _) => Ok(value),
        (Err(std::env::VarError::NotPresent), Some(default)) => Ok(default.to_string()),
        (Err(std::env::VarError::NotPresent), None) => Err(config_expand_error(
            path,
            input,
            start,
            format!("environment variable '{name}' is not set"),
        )),
        (Err(std::env::VarError::NotUnicode(_)), _) => Err(config_expand_error(
            path,
            input,
            start,
            format!("environment variable '{name}' is not valid UTF-8"),
        )),
    }
}

fn is_valid_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return false;
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn config_expand_error(
    path: &Path,
    input: &str,
    start: usize,
    message: impl fmt::Display,
) -> TsvaultError {
    let (line, column) = byte_offset_to_line_col(input, start);
    TsvaultError::Config(format!(
        "invalid config '{}': {message} at line {line}, column {column}",
        path.display()
    ))
}

fn byte_offset_to_line_col(input: &str, byte_offset: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut column = 1usize;
    for ch in input[..byte_offset].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Read, expand, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<TsvaultConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TsvaultError::Config(format!("cannot read '{}': {e}", path.display()))
    })?;
    parse_config(&contents, path)
}

/// Parse config text. `path` is only used in error messages.
pub fn parse_config(contents: &str, path: &Path) -> Result<TsvaultConfig> {
    let expanded = expand_env_placeholders(contents, path)?;
    let config: TsvaultConfig = serde_yaml::from_str(&expanded).map_err(|e| {
        TsvaultError::Config(format!("invalid config '{}': {e}", path.display()))
    })?;
    config
        .validate()
        .map_err(|e| TsvaultError::Config(format!("invalid config '{}': {e}", path.display())))?;
    Ok(config)
}

// --- Config resolution ---

/// Tracks where the config file was found.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Explicitly passed via `--config`.
    CliArg(PathBuf),
    /// Set via the `TSVAULT_CONFIG` env var.
    EnvVar(PathBuf),
    /// Found by searching standard locations.
    SearchOrder { path: PathBuf, level: &'static str },
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::CliArg(p) => p,
            ConfigSource::EnvVar(p) => p,
            ConfigSource::SearchOrder { path, .. } => path,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CliArg(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} ({CONFIG_ENV_VAR})", p.display()),
            ConfigSource::SearchOrder { path, level } => {
                write!(f, "{} ({})", path.display(), level)
            }
        }
    }
}

/// Returns search locations in priority order: project, user, system.
pub fn default_config_search_paths() -> Vec<(PathBuf, &'static str)> {
    let mut paths = vec![(PathBuf::from("tsvault.yaml"), "project")];

    if let Some(base) = paths::config_dir() {
        paths.push((base.join("tsvault").join("config.yaml"), "user"));
    }

    paths.push((PathBuf::from("/etc/tsvault/config.yaml"), "system"));
    paths
}

/// Resolve which config file to use.
///
/// Priority: CLI arg > `TSVAULT_CONFIG` env var > first existing file from search paths.
/// Returns `None` if nothing is found.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<ConfigSource> {
    if let Some(path) = cli_config {
        return Some(ConfigSource::CliArg(PathBuf::from(path)));
    }

    if let Ok(val) = std::env::var(CONFIG_ENV_VAR) {
        if !val.is_empty() {
            return Some(ConfigSource::EnvVar(PathBuf::from(val)));
        }
    }

    default_config_search_paths()
        .into_iter()
        .find(|(path, _)| path.exists())
        .map(|(path, level)| ConfigSource::SearchOrder { path, level })
}

/// Returns a starter YAML config.
pub fn minimal_config_template() -> &'static str {
    r#"# tsvault configuration file

database:
  name: tsdb
  host: localhost
  port: 5432
  user: postgres
  # password: secret   (or set PGPASSWORD / use ~/.pgpass)
  # bin_dir: /usr/lib/postgresql/16/bin

storage:
  root: /var/backups/timescaledb
  # log_dir: /var/log/tsvault

retention:
  daily: 7d
  weekly: 4w
  monthly: 365d

compression_level: 6
parallel_jobs: 4
verify: true
command_timeout: 6h

# --- Optional settings (uncomment as needed) ---

# upload:
#   s3:
#     endpoint: https://s3.eu-central-1.amazonaws.com
#     bucket: db-backups
#     region: eu-central-1
#     prefix: timescaledb
#     access_key_id: AKIA...
#     secret_access_key: secret
#
# monitor:
#   freshness:
#     daily: 30h
#     weekly: 8d
#   disk_warning_percent: 80
#   disk_critical_percent: 90
#
# schedule:
#   daily: "0 2 * * *"
#   weekly: "0 3 * * 0"
#   monthly: "0 4 1 * *"
#   monitor: "0 * * * *"
#
# hooks:
#   failed: 'echo "tsvault {command} failed: {error}" | mail -s "backup alert" ops@example.com'
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::tier::Tier;

    // Tests that mutate process-global state (env vars, CWD) must be serialized.
    static GLOBAL_STATE: Mutex<()> = Mutex::new(());

    const MINIMAL: &str = "database:\n  name: tsdb\nstorage:\n  root: /var/backups/tsdb\n";

    fn parse(yaml: &str) -> Result<TsvaultConfig> {
        parse_config(yaml, Path::new("test.yaml"))
    }

    #[test]
    fn test_search_paths_order() {
        let paths = default_config_search_paths();
        assert!(paths.len() >= 2);
        assert_eq!(paths[0].1, "project");
        assert_eq!(paths.last().unwrap().1, "system");
        if paths.len() == 3 {
            assert_eq!(paths[1].1, "user");
        }
    }

    #[test]
    fn test_resolve_cli_arg_wins() {
        let source = resolve_config_path(Some("/tmp/override.yaml")).unwrap();
        assert!(matches!(source, ConfigSource::CliArg(_)));
        assert_eq!(source.path(), Path::new("/tmp/override.yaml"));
    }

    #[test]
    fn test_resolve_env_var() {
        let _lock = GLOBAL_STATE.lock().unwrap();
        let _guard = EnvGuard::set(CONFIG_ENV_VAR, "/tmp/env-config.yaml");
        let source = resolve_config_path(None).unwrap();
        assert!(matches!(source, ConfigSource::EnvVar(_)));
        assert_eq!(source.path(), Path::new("/tmp/env-config.yaml"));
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.compression_level, 6);
        assert_eq!(config.parallel_jobs, 4);
        assert!(config.verify);
        assert!(config.upload.s3.is_none());
        assert_eq!(
            config.retention.window(Tier::Daily).unwrap(),
            Duration::from_secs(7 * 86_400)
        );
        assert_eq!(
            config.storage.log_dir(),
            PathBuf::from("/var/backups/tsdb/logs")
        );
        assert_eq!(config.tier_dir(Tier::Weekly), PathBuf::from("/var/backups/tsdb/weekly"));
        assert_eq!(
            config.database.extensions,
            vec!["timescaledb", "pgcrypto", "uuid-ossp"]
        );
    }

    #[test]
    fn test_sub_hour_retention_windows_are_rejected() {
        for window in ["12m", "720s", "30M"] {
            let yaml = format!("{MINIMAL}retention:\n  monthly: {window}\n");
            let err = parse(&yaml).unwrap_err();
            assert!(matches!(err, TsvaultError::Config(_)), "{window}");
            assert!(err.to_string().contains("retention.monthly"), "{err}");
        }
    }

    #[test]
    fn test_retention_accepts_hours_days_weeks_and_bare_days() {
        let yaml = format!("{MINIMAL}retention:\n  daily: 36h\n  weekly: 5w\n  monthly: 365\n");
        let config = parse(&yaml).unwrap();
        assert_eq!(
            config.retention.window(Tier::Daily).unwrap(),
            Duration::from_secs(36 * 3600)
        );
        assert_eq!(
            config.retention.window(Tier::Monthly).unwrap(),
            Duration::from_secs(365 * 86_400)
        );
    }

    #[test]
    fn test_template_is_valid_config() {
        let config = parse(minimal_config_template());
        assert!(config.is_ok(), "template should parse: {:?}", config.err());
    }

    #[test]
    fn test_relative_root_rejected() {
        let err = parse("database:\n  name: tsdb\nstorage:\n  root: backups\n").unwrap_err();
        assert!(err.to_string().contains("absolute"), "{err}");
    }

    #[test]
    fn test_zero_retention_rejected() {
        let yaml = format!("{MINIMAL}retention:\n  daily: 0d\n");
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().contains("retention.daily"), "{err}");
    }

    #[test]
    fn test_compression_level_bounds() {
        let yaml = format!("{MINIMAL}compression_level: 10\n");
        assert!(parse(&yaml).is_err());
        let yaml = format!("{MINIMAL}compression_level: 0\n");
        assert!(parse(&yaml).is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = format!("{MINIMAL}keep_last: 3\n");
        assert!(parse(&yaml).is_err());
    }

    #[test]
    fn test_disk_thresholds_must_be_ordered() {
        let yaml = format!(
            "{MINIMAL}monitor:\n  disk_warning_percent: 95\n  disk_critical_percent: 90\n"
        );
        assert!(parse(&yaml).is_err());
    }

    #[test]
    fn test_invalid_hook_key_rejected() {
        let yaml = format!("{MINIMAL}hooks:\n  on_error: echo hi\n");
        assert!(parse(&yaml).is_err());
    }

    #[test]
    fn test_env_placeholder_expansion() {
        let _lock = GLOBAL_STATE.lock().unwrap();
        let _guard = EnvGuard::set("TSVAULT_TEST_DB", "metrics");
        let yaml = "database:\n  name: ${TSVAULT_TEST_DB}\n  user: ${TSVAULT_TEST_USER:-backup}\nstorage:\n  root: /srv/b\n";
        let config = parse(yaml).unwrap();
        assert_eq!(config.database.name, "metrics");
        assert_eq!(config.database.user, "backup");
    }

    #[test]
    fn test_missing_env_placeholder_reports_position() {
        let _lock = GLOBAL_STATE.lock().unwrap();
        let _guard = EnvGuard::unset("TSVAULT_TEST_UNSET");
        let err = parse("database:\n  name: ${TSVAULT_TEST_UNSET}\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("TSVAULT_TEST_UNSET"), "{msg}");
        assert!(msg.contains("line 2"), "{msg}");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert!(matches!(result, Err(TsvaultError::Config(_))));
    }

    #[test]
    fn test_load_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsvault.yaml");
        fs::write(&path, MINIMAL).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.database.name, "tsdb");
    }

    /// RAII guard to set an env var and restore its previous value on drop.
    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, val: &str) -> Self {
            let prev = std::env::var(key).ok();
            std::env::set_var(key, val);
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            std::env::remove_var(key);
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }
}
