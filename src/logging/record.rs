//! Log record rendering and parsing
//!
//! A record is rendered as a single line:
//! `YYYY-MM-DD HH:mm:ss.fff [LEVEL] message`

use chrono::{Local, NaiveDateTime};

use super::level::Severity;

/// chrono format of the timestamp prefix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Byte length of a rendered timestamp (`2026-01-21 14:30:45.123`)
const TIMESTAMP_LEN: usize = 23;

/// A single log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Local wall-clock time the record was created
    pub timestamp: NaiveDateTime,
    /// Severity
    pub level: Severity,
    /// Message text
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            level,
            message: message.into(),
        }
    }

    /// Render the record as one line, without a line terminator
    ///
    /// Line breaks in the message are escaped so the record stays on one line.
    pub fn render(&self) -> String {
        format!(
            "{} {} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level.tag(),
            escape_line_breaks(&self.message)
        )
    }

    /// Parse a rendered line back into a record
    ///
    /// The level is read from its fixed position right after the timestamp, so tags
    /// appearing inside the message body are ignored. Returns `None` for lines that
    /// are not well-formed records.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let stamp = line.get(..TIMESTAMP_LEN)?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

        let rest = line[TIMESTAMP_LEN..].strip_prefix(" [")?;
        let close = rest.find(']')?;
        let level = rest[..close].parse::<Severity>().ok()?;
        if &rest[..close] != level.as_str() {
            return None;
        }

        let after = &rest[close + 1..];
        let message = after.strip_prefix(' ').unwrap_or(after);

        Some(Self {
            timestamp,
            level,
            message: message.to_string(),
        })
    }
}

fn escape_line_breaks(message: &str) -> std::borrow::Cow<'_, str> {
    if message.contains(['\n', '\r']) {
        message.replace('\r', "\\r").replace('\n', "\\n").into()
    } else {
        message.into()
    }
}
