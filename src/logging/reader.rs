//! Read-back of log files
//!
//! The reader takes no lock against the writer. A file that is being appended to may
//! end in a partial line; such a line does not parse and is skipped by the filters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::level::Severity;
use super::record::LogRecord;

/// Reads and filters a log file
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    /// Create a reader for the log file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All lines of the file in order, or none if the file does not exist
    pub fn read_all(&self) -> Result<Vec<String>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read log file {}", self.path.display()));
            }
        };

        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Lines whose level is at least `min_level`, in file order
    ///
    /// Lines that are not well-formed records are left out.
    pub fn filter_by_level(&self, min_level: Severity) -> Result<Vec<String>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|line| LogRecord::parse(line).is_some_and(|r| r.level >= min_level))
            .collect())
    }

    /// All well-formed records in file order
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        Ok(self
            .read_all()?
            .iter()
            .filter_map(|line| LogRecord::parse(line))
            .collect())
    }
}

/// Read all lines of the log file at `path`
pub fn read_all(path: impl Into<PathBuf>) -> Result<Vec<String>> {
    LogReader::new(path).read_all()
}

/// Read the lines of the log file at `path` with level at least `min_level`
pub fn filter_by_level(path: impl Into<PathBuf>, min_level: Severity) -> Result<Vec<String>> {
    LogReader::new(path).filter_by_level(min_level)
}
