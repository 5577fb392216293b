//! Rotated archive retention
//!
//! Lists the archives a log file has been rotated into and removes old ones. The
//! writer never calls this; cleanup only happens when asked for.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

use super::rotation::is_archive_of;

/// Default retention period in days
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

fn log_dir(log_path: &Path) -> &Path {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Archives of the log file at `log_path`, sorted by name (oldest first)
pub fn rotated_archives(log_path: &Path) -> Result<Vec<PathBuf>> {
    let dir = log_dir(log_path);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    for entry in fs::read_dir(dir).context("Failed to read log directory")? {
        let entry = entry?;
        let candidate = log_path.with_file_name(entry.file_name());
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && is_archive_of(log_path, &candidate)
        {
            archives.push(candidate);
        }
    }

    archives.sort();
    Ok(archives)
}

/// Seconds in one retention day
const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Delete archives of `log_path` older than the default retention period
///
/// Returns the number of files deleted.
pub fn cleanup_rotated_logs(log_path: &Path) -> Result<usize> {
    cleanup_rotated_logs_with_retention(log_path, DEFAULT_RETENTION_DAYS)
}

/// Delete archives of `log_path` not modified within `retention_days`
///
/// The active log file is never removed. Returns the number of files deleted.
pub fn cleanup_rotated_logs_with_retention(log_path: &Path, retention_days: u64) -> Result<usize> {
    let retention_duration = Duration::from_secs(retention_days.saturating_mul(SECS_PER_DAY));
    let cutoff = SystemTime::now()
        .checked_sub(retention_duration)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted_count = 0;

    for archive in rotated_archives(log_path)? {
        let modified = fs::metadata(&archive).and_then(|m| m.modified());
        if let Ok(modified) = modified {
            if modified < cutoff && fs::remove_file(&archive).is_ok() {
                tracing::debug!("Removed expired archive {}", archive.display());
                deleted_count += 1;
            }
        }
    }

    Ok(deleted_count)
}
