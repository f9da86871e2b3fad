use std::fs::File;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Stderr filter for a `-v` count.
pub(crate) fn stderr_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber: stderr at the `-v` level and, when given,
/// a plain-text copy of INFO and above appended to the job log.
pub(crate) fn init(verbose: u8, job_log: Option<File>) {
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(stderr_filter(verbose)));

    let job_log = job_log.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::INFO)
    });

    tracing_subscriber::registry()
        .with(stderr)
        .with(job_log)
        .init();
}
