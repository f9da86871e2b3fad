//! Optional off-host copies of finished archives.

mod retry;
pub mod s3;

use std::path::Path;

use crate::archive::metadata_path;
use crate::config::UploadConfig;
use crate::error::{Result, TsvaultError};
use crate::tier::Tier;

pub use self::s3::S3Uploader;

/// Destination for archive copies. Implementations handle their own
/// transport-level retries.
pub trait Uploader {
    fn upload_file(&self, key: &str, path: &Path) -> Result<()>;

    /// Human-readable destination for log lines.
    fn describe(&self) -> String;
}

/// Build the configured uploader, if any.
pub fn uploader_from_config(cfg: &UploadConfig) -> Result<Option<Box<dyn Uploader>>> {
    match &cfg.s3 {
        Some(s3) => Ok(Some(Box::new(S3Uploader::new(s3)?))),
        None => Ok(None),
    }
}

/// Object key for a local file: `<tier>/<file name>`.
pub fn object_key(tier: Tier, path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TsvaultError::Upload(format!("unusable file name: {}", path.display())))?;
    Ok(format!("{tier}/{name}"))
}

/// Upload an archive and, when present, its sidecar.
pub fn upload_archive(uploader: &dyn Uploader, tier: Tier, archive: &Path) -> Result<()> {
    uploader.upload_file(&object_key(tier, archive)?, archive)?;
    let sidecar = metadata_path(archive);
    if sidecar.is_file() {
        uploader.upload_file(&object_key(tier, &sidecar)?, &sidecar)?;
    }
    Ok(())
}
