use thiserror::Error;

pub type Result<T> = std::result::Result<T, TsvaultError>;

#[derive(Debug, Error)]
pub enum TsvaultError {
    #[error("{0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown tier '{0}' (expected daily, weekly or monthly)")]
    UnknownTier(String),

    #[error("archive not found: '{0}'")]
    ArchiveNotFound(String),

    #[error("archive already exists: '{0}'")]
    ArchiveExists(String),

    #[error("invalid database name '{0}': use letters, digits and '_' (max 63 bytes)")]
    InvalidDatabaseName(String),

    #[error("{tool} failed (exit code {code}): {stderr}")]
    CommandFailed {
        tool: String,
        code: String,
        stderr: String,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("integrity check failed for '{archive}': {reason}")]
    Verification { archive: String, reason: String },

    #[error("restore into '{target}' failed: {reason}")]
    Restore { target: String, reason: String },

    #[error("upload error: {0}")]
    Upload(String),

    #[error("hook error: {0}")]
    Hook(String),

    #[error("operation cancelled before {0}")]
    Cancelled(&'static str),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick exit codes and alert behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any side effect.
    Usage,
    /// Database, disk, network or timeout trouble during a run.
    Infrastructure,
    /// The dump was written but failed its table-of-contents check.
    Integrity,
    Cancelled,
}

impl TsvaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TsvaultError::Usage(_)
            | TsvaultError::Config(_)
            | TsvaultError::UnknownTier(_)
            | TsvaultError::ArchiveNotFound(_)
            | TsvaultError::ArchiveExists(_)
            | TsvaultError::InvalidDatabaseName(_) => ErrorKind::Usage,
            TsvaultError::Verification { .. } => ErrorKind::Integrity,
            TsvaultError::Cancelled(_) => ErrorKind::Cancelled,
            _ => ErrorKind::Infrastructure,
        }
    }

    /// Process exit code: 2 for usage errors, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Usage => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(TsvaultError::UnknownTier("hourly".into()).exit_code(), 2);
        assert_eq!(TsvaultError::ArchiveNotFound("/x".into()).exit_code(), 2);
        assert_eq!(TsvaultError::Config("missing".into()).exit_code(), 2);
    }

    #[test]
    fn run_failures_exit_with_one() {
        let err = TsvaultError::Verification {
            archive: "a.dump".into(),
            reason: "truncated".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            TsvaultError::Timeout {
                tool: "pg_dump".into(),
                secs: 5
            }
            .exit_code(),
            1
        );
    }
}
