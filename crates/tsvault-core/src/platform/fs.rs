use std::path::Path;
use std::time::{Duration, SystemTime};

/// Space accounting for the filesystem that holds a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    /// Bytes available to unprivileged users.
    pub available_bytes: u64,
}

impl DiskUsage {
    /// Utilization as `df` reports it: used / (used + available), rounded up.
    pub fn used_percent(&self) -> u8 {
        let denom = self.used_bytes.saturating_add(self.available_bytes);
        if denom == 0 {
            return 0;
        }
        let pct = (self.used_bytes as u128 * 100).div_ceil(denom as u128);
        pct.min(100) as u8
    }
}

#[cfg(unix)]
pub fn disk_usage(path: &Path) -> std::io::Result<DiskUsage> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::from)?;
    let frsize = stat.fragment_size() as u64;
    let blocks = stat.blocks() as u64;
    let free = stat.blocks_free() as u64;
    let avail = stat.blocks_available() as u64;
    Ok(DiskUsage {
        total_bytes: blocks.saturating_mul(frsize),
        used_bytes: blocks.saturating_sub(free).saturating_mul(frsize),
        available_bytes: avail.saturating_mul(frsize),
    })
}

#[cfg(not(unix))]
pub fn disk_usage(path: &Path) -> std::io::Result<DiskUsage> {
    let _ = path;
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "disk usage is only available on unix",
    ))
}

/// Age of a file based on its modification time. Files from the future have
/// age zero.
pub fn modified_age(path: &Path, now: SystemTime) -> std::io::Result<Duration> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
}
