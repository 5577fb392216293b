//! Steadylog - process-wide rotating file logger
//!
//! This library provides a thread-safe singleton logger with size-based rotation,
//! persisted configuration, a level-filtering log reader, and a small key/value
//! settings store.

pub mod config;
pub mod logging;
pub mod settings;

pub use config::LoggerConfig;
pub use logging::{LogReader, Logger, Severity};
