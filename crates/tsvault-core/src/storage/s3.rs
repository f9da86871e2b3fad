use std::fs::File;
use std::path::Path;
use std::time::Duration;

use rusty_s3::actions::S3Action;
use rusty_s3::{Bucket, Credentials, UrlStyle};

use super::retry::retry_http;
use super::Uploader;
use crate::config::{RetryConfig, S3UploadConfig};
use crate::error::{Result, TsvaultError};

/// Duration for presigned URL validity.
const PRESIGN_DURATION: Duration = Duration::from_secs(3600);

/// Off-host copy of archives to an S3-compatible bucket via presigned PUTs.
pub struct S3Uploader {
    bucket: Bucket,
    credentials: Credentials,
    agent: ureq::Agent,
    retry: RetryConfig,
    /// Prefix (root path) prepended to all keys.
    root: String,
}

impl S3Uploader {
    pub fn new(cfg: &S3UploadConfig) -> Result<Self> {
        let base_url = cfg.endpoint.parse().map_err(|e| {
            TsvaultError::Config(format!("invalid S3 endpoint URL '{}': {e}", cfg.endpoint))
        })?;

        let bucket = Bucket::new(base_url, UrlStyle::Path, cfg.bucket.clone(), cfg.region.clone())
            .map_err(|e| TsvaultError::Config(format!("failed to create S3 bucket handle: {e}")))?;

        let credentials = Credentials::new(&cfg.access_key_id, &cfg.secret_access_key);

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .timeout_write(Duration::from_secs(300))
            .build();

        Ok(Self {
            bucket,
            credentials,
            agent,
            retry: cfg.retry.clone(),
            root: cfg.prefix.as_deref().unwrap_or("").trim_matches('/').to_string(),
        })
    }

    /// Prepend the root prefix to a key.
    fn full_key(&self, key: &str) -> String {
        if self.root.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.root, key)
        }
    }
}

impl Uploader for S3Uploader {
    fn upload_file(&self, key: &str, path: &Path) -> Result<()> {
        let len = std::fs::metadata(path)?.len();
        let full_key = self.full_key(key);
        let url = self
            .bucket
            .put_object(Some(&self.credentials), &full_key)
            .sign(PRESIGN_DURATION);

        // Each attempt reopens the file so a retried PUT streams from the start.
        retry_http(&self.retry, &format!("PUT {key}"), || {
            let file = File::open(path)?;
            self.agent
                .put(url.as_str())
                .set("Content-Length", &len.to_string())
                .send(file)
        })
        .map_err(|e| TsvaultError::Upload(format!("S3 PUT {full_key}: {e}")))?;

        tracing::info!(key = %full_key, bytes = len, "uploaded");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3:{}/{}", self.bucket.name(), self.root)
    }
}
