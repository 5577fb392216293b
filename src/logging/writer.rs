//! The process-wide log writer
//!
//! A single [`Logger`] is shared by every caller in the process. Each call is filtered
//! by level, then rotation and append run under one lock so lines from concurrent
//! callers never interleave. The same lock guards configuration changes. Failures in
//! the write path are never returned to the caller; they go to the error hook.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use anyhow::Result;

use super::error::LogError;
use super::level::Severity;
use super::record::LogRecord;
use super::rotation;
use crate::config::{self, LoggerConfig, DEFAULT_CONFIG_FILE};

/// Callback receiving errors the logger swallows
pub type ErrorHook = Arc<dyn Fn(&LogError) + Send + Sync>;

/// Destination of the console echo
pub type ConsoleSink = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

static GLOBAL: OnceLock<Logger> = OnceLock::new();

fn default_error_hook() -> ErrorHook {
    Arc::new(|err: &LogError| {
        tracing::warn!("Log write failed: {}", err);
    })
}

fn default_console_sink() -> ConsoleSink {
    Arc::new(|line: &str| writeln!(std::io::stdout().lock(), "{}", line))
}

/// State guarded by the logger's lock
struct LoggerState {
    config: LoggerConfig,
    config_path: PathBuf,
    error_hook: ErrorHook,
    console: ConsoleSink,
}

/// Thread-safe log writer with size-based rotation
pub struct Logger {
    state: Mutex<LoggerState>,
    /// Mirror of `config.min_level`, written only while holding `state`
    min_level: AtomicU8,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Logger")
            .field("config", &state.config)
            .field("config_path", &state.config_path)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Get the process-wide logger
    ///
    /// The first call loads [`DEFAULT_CONFIG_FILE`] from the working directory.
    pub fn global() -> &'static Logger {
        Self::init_global(DEFAULT_CONFIG_FILE)
    }

    /// Get the process-wide logger, creating it from `config_path` if this is the
    /// first access
    ///
    /// Later calls return the existing instance regardless of `config_path`.
    pub fn init_global(config_path: impl AsRef<Path>) -> &'static Logger {
        GLOBAL.get_or_init(|| Logger::open(config_path))
    }

    /// Create a standalone logger configured from `config_path`
    ///
    /// A missing configuration file is created with the defaults.
    pub fn open(config_path: impl AsRef<Path>) -> Self {
        let config_path = config_path.as_ref().to_path_buf();
        let config = config::load(&config_path);
        Self::from_parts(config, config_path)
    }

    /// Create a standalone logger from an explicit configuration
    ///
    /// Fails if the configuration is invalid. Nothing is read or written until the
    /// first log call or configuration change.
    pub fn with_config(config: LoggerConfig, config_path: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, config_path.into()))
    }

    /// Build a logger from a configuration that has already been validated
    fn from_parts(config: LoggerConfig, config_path: PathBuf) -> Self {
        let min_level = AtomicU8::new(config.min_level.as_index());
        Self {
            state: Mutex::new(LoggerState {
                config,
                config_path,
                error_hook: default_error_hook(),
                console: default_console_sink(),
            }),
            min_level,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the configuration while holding the lock
    fn apply(&self, state: &mut LoggerState, config: LoggerConfig) {
        self.min_level
            .store(config.min_level.as_index(), Ordering::Release);
        state.config = config;
    }

    /// Current minimum level
    pub fn level(&self) -> Severity {
        Severity::from_index(self.min_level.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Whether a message at `level` would be written
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.level()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> LoggerConfig {
        self.lock().config.clone()
    }

    /// Path the configuration is loaded from and saved to
    pub fn config_path(&self) -> PathBuf {
        self.lock().config_path.clone()
    }

    /// Change the minimum level and persist the configuration
    ///
    /// The new level takes effect even if saving fails.
    pub fn set_level(&self, level: Severity) -> Result<()> {
        let mut state = self.lock();
        let config = LoggerConfig {
            min_level: level,
            ..state.config.clone()
        };
        self.apply(&mut state, config);
        config::save(&state.config_path, &state.config)
    }

    /// Replace the whole configuration and persist it
    pub fn reconfigure(&self, config: LoggerConfig) -> Result<()> {
        config.validate()?;
        let mut state = self.lock();
        self.apply(&mut state, config);
        config::save(&state.config_path, &state.config)
    }

    /// Switch to the configuration file at `path` and load it
    ///
    /// A missing file is created from the current configuration; a malformed one is
    /// ignored and the current configuration kept.
    pub fn load_config(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        let config = config::load_or(&path, &state.config);
        state.config_path = path;
        self.apply(&mut state, config);
    }

    /// Re-read the configuration from the current configuration path
    pub fn reload(&self) {
        let mut state = self.lock();
        let config = config::load_or(&state.config_path, &state.config);
        self.apply(&mut state, config);
    }

    /// Save the current configuration to the configuration path
    pub fn save_config(&self) -> Result<()> {
        let state = self.lock();
        config::save(&state.config_path, &state.config)
    }

    /// Install a callback for errors swallowed by the write path
    pub fn set_error_hook<F>(&self, hook: F)
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        self.lock().error_hook = Arc::new(hook);
    }

    /// Restore the default error hook, which reports through `tracing`
    pub fn reset_error_hook(&self) {
        self.lock().error_hook = default_error_hook();
    }

    /// Send the console echo somewhere other than stdout
    pub fn set_console_sink<F>(&self, sink: F)
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.lock().console = Arc::new(sink);
    }

    /// Restore echoing to stdout
    pub fn reset_console_sink(&self) {
        self.lock().console = default_console_sink();
    }

    /// Write `message` at `level`
    ///
    /// Never fails: rotation, append and echo errors are passed to the error hook.
    pub fn log(&self, message: &str, level: Severity) {
        if !self.enabled(level) {
            return;
        }

        let line = LogRecord::new(level, message).render();

        let (mut errors, console, hook) = {
            let state = self.lock();
            let config = &state.config;
            let mut errors = Vec::new();

            if let Err(e) =
                rotation::rotate_if_needed(&config.log_file_path, config.max_file_size_bytes)
            {
                errors.push(e);
            }
            if let Err(e) = append_line(&config.log_file_path, &line) {
                errors.push(e);
            }

            let console = config
                .log_to_console
                .then(|| Arc::clone(&state.console));
            (errors, console, Arc::clone(&state.error_hook))
        };

        if let Some(console) = console {
            if let Err(source) = console(&line) {
                errors.push(LogError::Echo { source });
            }
        }

        for err in &errors {
            hook(err);
        }
    }

    /// Write `message` at INFO
    pub fn info(&self, message: &str) {
        self.log(message, Severity::Info);
    }

    /// Write `message` at WARNING
    pub fn warning(&self, message: &str) {
        self.log(message, Severity::Warning);
    }

    /// Write `message` at ERROR
    pub fn error(&self, message: &str) {
        self.log(message, Severity::Error);
    }
}

/// Append one line to the file at `path`, creating the file if needed
fn append_line(path: &Path, line: &str) -> Result<(), LogError> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(buf.as_bytes()))
        .map_err(|source| LogError::Append {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn test_logger(dir: &TempDir, max_file_size_bytes: u64) -> Logger {
        let config = LoggerConfig {
            log_file_path: dir.path().join("app.log"),
            min_level: Severity::Info,
            log_to_console: false,
            max_file_size_bytes,
        };
        Logger::with_config(config, dir.path().join("loggerconfig.json")).unwrap()
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_log_writes_formatted_line() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 50_000);

        logger.log("Service started", Severity::Info);

        let written = lines(&dir.path().join("app.log"));
        assert_eq!(written.len(), 1);
        let record = LogRecord::parse(&written[0]).unwrap();
        assert_eq!(record.level, Severity::Info);
        assert_eq!(record.message, "Service started");
    }

    #[test]
    fn test_level_filtering() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 50_000);
        logger.set_level(Severity::Warning).unwrap();

        logger.info("dropped");
        logger.warning("kept warning");
        logger.error("kept error");

        let written = lines(&dir.path().join("app.log"));
        assert_eq!(written.len(), 2);
        assert!(written[0].contains("[WARNING] kept warning"));
        assert!(written[1].contains("[ERROR] kept error"));
        assert!(!logger.enabled(Severity::Info));
    }

    #[test]
    fn test_set_level_persists_config() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 50_000);

        logger.set_level(Severity::Error).unwrap();

        let saved = config::try_load(&dir.path().join("loggerconfig.json"))
            .unwrap()
            .unwrap();
        assert_eq!(saved.min_level, Severity::Error);
        assert_eq!(saved, logger.config());

        let reopened = Logger::open(dir.path().join("loggerconfig.json"));
        assert_eq!(reopened.level(), Severity::Error);
    }

    #[test]
    fn test_open_creates_default_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("loggerconfig.json");

        let logger = Logger::open(&config_path);

        assert_eq!(logger.config(), LoggerConfig::default());
        assert_eq!(logger.config_path(), config_path);
        assert!(config_path.exists());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        const THREADS: usize = 8;
        const MESSAGES: usize = 50;

        let dir = TempDir::new().unwrap();
        let logger = Arc::new(test_logger(&dir, u64::MAX));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = Arc::clone(&logger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..MESSAGES {
                        let level = Severity::ALL[i % 3];
                        logger.log(&format!("thread {} message {}", t, i), level);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let written = lines(&dir.path().join("app.log"));
        assert_eq!(written.len(), THREADS * MESSAGES);
        for line in &written {
            let record = LogRecord::parse(line).expect("well-formed line");
            assert!(record.message.starts_with("thread "));
        }
        for t in 0..THREADS {
            let prefix = format!("thread {} message ", t);
            let count = written.iter().filter(|l| l.contains(&prefix)).count();
            assert_eq!(count, MESSAGES);
        }
    }

    #[test]
    fn test_rotation_on_threshold() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "x".repeat(100)).unwrap();
        let logger = test_logger(&dir, 100);

        logger.info("after rotation");

        let archives: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| rotation::is_archive_of(&log_path, p))
            .collect();
        assert_eq!(archives.len(), 1);
        assert_eq!(std::fs::read_to_string(&archives[0]).unwrap().len(), 100);

        let written = lines(&log_path);
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("[INFO] after rotation"));
    }

    #[test]
    fn test_append_failure_goes_to_hook() {
        let dir = TempDir::new().unwrap();
        let config = LoggerConfig {
            log_file_path: dir.path().join("missing-dir").join("app.log"),
            log_to_console: false,
            ..LoggerConfig::default()
        };
        let logger = Logger::with_config(config, dir.path().join("loggerconfig.json")).unwrap();

        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        logger.set_error_hook(move |err| {
            sink.lock()
                .unwrap()
                .push((err.path().map(Path::to_path_buf), err.to_string()));
        });

        logger.error("cannot be written");

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, Some(logger.config().log_file_path));
        assert!(failures[0].1.contains("failed to append"));
    }

    #[test]
    fn test_hook_may_log_without_deadlock() {
        let dir = TempDir::new().unwrap();
        let config = LoggerConfig {
            log_file_path: dir.path().join("missing-dir").join("app.log"),
            log_to_console: false,
            ..LoggerConfig::default()
        };
        let logger = Arc::new(Logger::with_config(config, dir.path().join("c.json")).unwrap());

        let inner = Arc::clone(&logger);
        logger.set_error_hook(move |_| {
            // Observing the logger from the hook must not block
            let _ = inner.config();
        });
        logger.info("trigger");
        logger.reset_error_hook();
    }

    #[test]
    fn test_reload_keeps_config_on_malformed_file() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 777);
        let before = logger.config();

        std::fs::write(dir.path().join("loggerconfig.json"), "not json").unwrap();
        logger.reload();

        assert_eq!(logger.config(), before);
    }

    #[test]
    fn test_load_config_switches_path() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 777);
        let other = dir.path().join("other.toml");

        logger.load_config(&other);

        assert_eq!(logger.config_path(), other);
        assert_eq!(config::try_load(&other).unwrap(), Some(logger.config()));

        let changed = LoggerConfig {
            min_level: Severity::Error,
            ..logger.config()
        };
        config::save(&other, &changed).unwrap();
        logger.reload();
        assert_eq!(logger.level(), Severity::Error);
    }

    #[test]
    fn test_save_config_writes_current_state() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 4096);
        let config_path = dir.path().join("loggerconfig.json");
        assert!(!config_path.exists());

        logger.save_config().unwrap();

        assert_eq!(config::try_load(&config_path).unwrap(), Some(logger.config()));
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let config = LoggerConfig {
            max_file_size_bytes: 0,
            ..LoggerConfig::default()
        };

        assert!(Logger::with_config(config, dir.path().join("c.json")).is_err());
    }

    #[test]
    fn test_console_echo_uses_sink() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 50_000);
        logger
            .reconfigure(LoggerConfig {
                log_to_console: true,
                ..logger.config()
            })
            .unwrap();

        let echoed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&echoed);
        logger.set_console_sink(move |line| {
            sink.lock().unwrap().push(line.to_string());
            Ok(())
        });

        logger.warning("shown twice");

        let echoed = echoed.lock().unwrap();
        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0], lines(&dir.path().join("app.log"))[0]);
    }

    #[test]
    fn test_console_failure_goes_to_hook() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 50_000);
        logger
            .reconfigure(LoggerConfig {
                log_to_console: true,
                ..logger.config()
            })
            .unwrap();

        logger.set_console_sink(|_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdout closed",
            ))
        });
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        logger.set_error_hook(move |err| {
            sink.lock()
                .unwrap()
                .push(matches!(err, LogError::Echo { .. }));
        });

        logger.info("still written to file");
        logger.info("and again");

        assert_eq!(*failures.lock().unwrap(), vec![true, true]);
        assert_eq!(lines(&dir.path().join("app.log")).len(), 2);
    }

    #[test]
    fn test_rotation_failure_keeps_appending() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("app.log");

        // Take every archive name for the next few seconds so the rename cannot happen
        let start = chrono::Local::now().naive_local();
        for offset in 0..10 {
            let at = start + chrono::Duration::seconds(offset);
            for suffix in 0..=rotation::MAX_COLLISION_SUFFIX {
                std::fs::write(rotation::rotated_path_with_suffix(&log_path, at, suffix), "")
                    .unwrap();
            }
        }
        std::fs::write(&log_path, "x".repeat(100)).unwrap();
        let logger = test_logger(&dir, 100);

        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        logger.set_error_hook(move |err| {
            sink.lock()
                .unwrap()
                .push(matches!(err, LogError::Rotate { .. }));
        });

        logger.error("kept in the active file");

        assert_eq!(*failures.lock().unwrap(), vec![true]);
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.starts_with(&"x".repeat(100)));
        assert!(content.ends_with("[ERROR] kept in the active file\n"));
    }

    #[test]
    fn test_reconfigure_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let logger = test_logger(&dir, 777);
        let invalid = LoggerConfig {
            max_file_size_bytes: 0,
            ..logger.config()
        };

        assert!(logger.reconfigure(invalid).is_err());
        assert_eq!(logger.config().max_file_size_bytes, 777);
    }
}
