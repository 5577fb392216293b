//! Logging system for Steadylog
//!
//! Provides the process-wide rotating file logger, the log record format, and
//! utilities for reading back and pruning log files.

mod error;
mod level;
pub mod reader;
mod record;
pub mod retention;
pub mod rotation;
mod writer;

pub use error::LogError;
pub use level::{ParseSeverityError, Severity};
pub use reader::LogReader;
pub use record::LogRecord;
pub use retention::{cleanup_rotated_logs, rotated_archives};
pub use writer::{ConsoleSink, ErrorHook, Logger};

/// Write `message` at `level` through the global logger
pub fn log(message: &str, level: Severity) {
    Logger::global().log(message, level);
}

/// Write `message` at INFO through the global logger
pub fn info(message: &str) {
    Logger::global().info(message);
}

/// Write `message` at WARNING through the global logger
pub fn warning(message: &str) {
    Logger::global().warning(message);
}

/// Write `message` at ERROR through the global logger
pub fn error(message: &str) {
    Logger::global().error(message);
}
