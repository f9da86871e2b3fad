use std::path::Path;

use tracing::{info, warn};

use crate::engine::DatabaseEngine;
use crate::error::{Result, TsvaultError};

/// List-only integrity check: read the archive's table of contents with
/// `pg_restore --list` without extracting data. An archive with an empty
/// table of contents fails too.
pub fn verify_archive(engine: &dyn DatabaseEngine, archive: &Path) -> Result<usize> {
    let name = archive.display().to_string();
    let entries = engine.list_contents(archive).map_err(|e| {
        warn!(archive = %name, error = %e, "integrity check failed");
        TsvaultError::Verification {
            archive: name.clone(),
            reason: e.to_string(),
        }
    })?;
    if entries == 0 {
        warn!(archive = %name, "archive has an empty table of contents");
        return Err(TsvaultError::Verification {
            archive: name,
            reason: "empty table of contents".into(),
        });
    }
    info!(archive = %name, entries, "integrity check passed");
    Ok(entries)
}
