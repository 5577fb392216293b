//! Size-based rotation of the active log file
//!
//! When the file reaches the size threshold it is renamed to
//! `{stem}_{YYYYMMDD_HHmmss}{.ext}` next to the original. Rotation only ever renames;
//! the next append starts a fresh file at the original path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use super::error::LogError;

/// chrono format of the timestamp embedded in archive names
pub const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Character length of an archive stamp (`20260121_143045`)
const ARCHIVE_STAMP_LEN: usize = 15;

/// Upper bound on collision suffixes tried for one rotation
pub(crate) const MAX_COLLISION_SUFFIX: u32 = 1000;

/// Whether a file of `current_size` bytes should be rotated
pub fn should_rotate(current_size: u64, threshold: u64) -> bool {
    current_size >= threshold
}

/// Size of the regular file at `path`, or 0 if it is missing or not a file
pub fn current_size(path: &Path) -> u64 {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        _ => 0,
    }
}

/// Split a log file name at its final extension separator
///
/// Returns `(stem, extension)` where the extension keeps its leading dot, or is
/// empty when the name has none.
fn split_name(path: &Path) -> (OsString, OsString) {
    let stem = path
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    let ext = match path.extension() {
        Some(ext) => {
            let mut dotted = OsString::from(".");
            dotted.push(ext);
            dotted
        }
        None => OsString::new(),
    };
    (stem, ext)
}

/// Archive path for `path` rotated at `at`
pub fn rotated_path(path: &Path, at: NaiveDateTime) -> PathBuf {
    rotated_path_with_suffix(path, at, 0)
}

pub(crate) fn rotated_path_with_suffix(path: &Path, at: NaiveDateTime, suffix: u32) -> PathBuf {
    let (stem, ext) = split_name(path);
    let mut name = stem;
    name.push("_");
    name.push(at.format(ARCHIVE_STAMP_FORMAT).to_string());
    if suffix > 0 {
        name.push(format!("_{}", suffix));
    }
    name.push(ext);
    path.with_file_name(name)
}

/// Check whether `candidate` is a rotated archive of the log file at `log_path`
pub fn is_archive_of(log_path: &Path, candidate: &Path) -> bool {
    if log_path.parent() != candidate.parent() {
        return false;
    }
    let (Some(stem), Some(name)) = (
        log_path.file_stem().and_then(|s| s.to_str()),
        candidate.file_name().and_then(|n| n.to_str()),
    ) else {
        return false;
    };
    let ext = log_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let Some(middle) = name
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(ext.as_str()))
    else {
        return false;
    };

    let Some(stamp) = middle.get(..ARCHIVE_STAMP_LEN) else {
        return false;
    };
    if NaiveDateTime::parse_from_str(stamp, ARCHIVE_STAMP_FORMAT).is_err() {
        return false;
    }

    match &middle[ARCHIVE_STAMP_LEN..] {
        "" => true,
        tail => tail
            .strip_prefix('_')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Rotate the file at `path` if it has reached `threshold` bytes
///
/// Returns the archive path when a rotation happened. A missing or empty file never
/// rotates. An archive name that is already taken gets a numeric suffix; when every
/// suffix is taken the rotation fails rather than overwrite an existing archive.
pub fn rotate_if_needed(path: &Path, threshold: u64) -> Result<Option<PathBuf>, LogError> {
    rotate_at(path, threshold, Local::now().naive_local())
}

fn rotate_at(path: &Path, threshold: u64, now: NaiveDateTime) -> Result<Option<PathBuf>, LogError> {
    let size = current_size(path);
    if size == 0 || !should_rotate(size, threshold) {
        return Ok(None);
    }

    let Some(target) = (0..=MAX_COLLISION_SUFFIX)
        .map(|suffix| rotated_path_with_suffix(path, now, suffix))
        .find(|candidate| !candidate.exists())
    else {
        return Err(LogError::Rotate {
            from: path.to_path_buf(),
            to: rotated_path(path, now),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "all archive names for this second are taken",
            ),
        });
    };

    match std::fs::rename(path, &target) {
        Ok(()) => {
            tracing::debug!(
                "Rotated {} ({} bytes) to {}",
                path.display(),
                size,
                target.display()
            );
            Ok(Some(target))
        }
        Err(source) => Err(LogError::Rotate {
            from: path.to_path_buf(),
            to: target,
            source,
        }),
    }
}
