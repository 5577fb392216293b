//! Errors swallowed by the logger and handed to its error hook

use std::path::{Path, PathBuf};

/// A failure inside the logger's best-effort write path
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The active log file could not be renamed to its archive name
    #[error("failed to rotate {} to {}: {source}", .from.display(), .to.display())]
    Rotate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be appended to the log file
    #[error("failed to append to {}: {source}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be echoed to the console
    #[error("failed to echo log line to console: {source}")]
    Echo {
        #[source]
        source: std::io::Error,
    },
}

impl LogError {
    /// Path of the log file the failure relates to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            LogError::Rotate { from, .. } => Some(from.as_path()),
            LogError::Append { path, .. } => Some(path.as_path()),
            LogError::Echo { .. } => None,
        }
    }
}
