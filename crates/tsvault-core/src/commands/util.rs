use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{Result, TsvaultError};

/// Return `Err(TsvaultError::Cancelled)` if the shutdown flag is set.
/// `step` names what was about to start.
pub fn check_cancelled(shutdown: Option<&AtomicBool>, step: &'static str) -> Result<()> {
    if shutdown.is_some_and(|f| f.load(Ordering::Relaxed)) {
        return Err(TsvaultError::Cancelled(step));
    }
    Ok(())
}

/// Compact age for status lines: `45s`, `12m`, `5h 3m`, `2d 4h`.
pub fn humanize_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    match (days, hours, mins) {
        (0, 0, 0) => format!("{secs}s"),
        (0, 0, m) => format!("{m}m"),
        (0, h, 0) => format!("{h}h"),
        (0, h, m) => format!("{h}h {m}m"),
        (d, 0, _) => format!("{d}d"),
        (d, h, _) => format!("{d}d {h}h"),
    }
}
