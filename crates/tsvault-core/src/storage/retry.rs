use std::time::Duration;

use crate::config::RetryConfig;

/// Retry a closure on transient `ureq::Error`s with exponential backoff + jitter.
#[allow(clippy::result_large_err)]
pub fn retry_http<T>(
    config: &RetryConfig,
    op_name: &str,
    f: impl Fn() -> std::result::Result<T, ureq::Error>,
) -> std::result::Result<T, ureq::Error> {
    let mut delay_ms = config.retry_delay_ms;
    let mut attempt = 0;

    loop {
        match f() {
            Ok(val) => return Ok(val),
            Err(e) if is_retryable_http(&e) && attempt < config.max_retries => {
                attempt += 1;
                tracing::warn!(
                    "S3 {op_name}: transient error (attempt {attempt}/{}), retrying: {e}",
                    config.max_retries,
                );
                let jitter = rand::random::<u64>() % delay_ms.max(1);
                std::thread::sleep(Duration::from_millis(delay_ms + jitter));
                delay_ms = (delay_ms * 2).min(config.retry_max_delay_ms);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether an HTTP error is transient and worth retrying.
pub fn is_retryable_http(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Transport(_) => true,
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
    }
}
