//! Steadylog CLI
//!
//! ```bash
//! # Write a line through the global logger
//! steadylog log --level warning "Disk almost full"
//!
//! # Only keep ERROR from now on (persisted to loggerconfig.json)
//! steadylog set-level error
//!
//! # Show WARNING and ERROR lines of the configured log file
//! steadylog read --min-level warning
//!
//! # Hammer the logger from several threads
//! steadylog stress --threads 5 --messages 20
//! ```

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use steadylog::config::DEFAULT_CONFIG_FILE;
use steadylog::logging::{self, LogReader, Logger, Severity};
use steadylog::settings::Settings;

#[derive(Parser)]
#[command(name = "steadylog")]
#[command(version)]
#[command(about = "Rotating file logger with persisted configuration")]
struct Cli {
    /// Logger configuration file (JSON, or TOML for *.toml)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a message to the log
    Log {
        /// Severity of the message
        #[arg(short, long, default_value = "info")]
        level: Severity,

        /// Message text
        message: String,
    },

    /// Change and persist the minimum level
    SetLevel {
        level: Severity,
    },

    /// Print log lines at or above a level
    Read {
        /// Minimum level to show
        #[arg(short, long, default_value = "info")]
        min_level: Severity,

        /// Log file to read (default: the configured log file)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,

    /// Delete rotated archives older than the retention period
    Prune {
        #[arg(short, long, default_value_t = logging::retention::DEFAULT_RETENTION_DAYS)]
        days: u64,
    },

    /// Log from several threads at once, then show the ERROR lines
    Stress {
        #[arg(short, long, default_value_t = 5)]
        threads: usize,

        #[arg(short, long, default_value_t = 20)]
        messages: usize,
    },

    /// Key/value settings
    Settings {
        /// Settings file
        #[arg(short, long, default_value = "settings.txt")]
        file: PathBuf,

        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a setting
    Get { key: String },

    /// Store a setting
    Set { key: String, value: String },
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "steadylog=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    run(cli.command, &cli.config)
}

fn run(command: Commands, config_path: &Path) -> Result<()> {
    // Settings commands never touch the logger or its config file
    let logger = || Logger::init_global(config_path);

    match command {
        Commands::Log { level, message } => {
            logger().log(&message, level);
        }
        Commands::SetLevel { level } => {
            logger().set_level(level)?;
            println!("Minimum level set to {}", level);
        }
        Commands::Read { min_level, file } => {
            let path = file.unwrap_or_else(|| logger().config().log_file_path);
            for line in LogReader::new(path).filter_by_level(min_level)? {
                println!("{}", line);
            }
        }
        Commands::Config => {
            let logger = logger();
            println!("config file: {}", logger.config_path().display());
            println!("{}", serde_json::to_string_pretty(&logger.config())?);
        }
        Commands::Prune { days } => {
            let log_path = logger().config().log_file_path;
            let count = logging::retention::cleanup_rotated_logs_with_retention(&log_path, days)?;
            println!("Removed {} archive(s)", count);
        }
        Commands::Stress { threads, messages } => {
            run_stress(logger(), threads, messages)?;
        }
        Commands::Settings { file, action } => {
            run_settings(&file, action)?;
        }
    }
    Ok(())
}

fn run_stress(logger: &'static Logger, threads: usize, messages: usize) -> Result<()> {
    let handles: Vec<_> = (1..=threads)
        .map(|thread_id| {
            thread::spawn(move || {
                for i in 1..=messages {
                    let level = if i % 7 == 0 {
                        Severity::Error
                    } else if i % 3 == 0 {
                        Severity::Warning
                    } else {
                        Severity::Info
                    };
                    logger.log(&format!("Thread {}: message {}", thread_id, i), level);
                    thread::sleep(Duration::from_millis(10));
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            anyhow::bail!("stress thread panicked");
        }
    }

    let log_path = logger.config().log_file_path;
    println!();
    println!(
        "== {} messages sent, ERROR lines in {} ==",
        threads * messages,
        log_path.display()
    );
    for line in LogReader::new(log_path).filter_by_level(Severity::Error)? {
        println!("{}", line);
    }

    Ok(())
}

fn run_settings(file: &Path, action: SettingsAction) -> Result<()> {
    let settings = Settings::global();
    settings.load_from_file(file)?;

    match action {
        SettingsAction::Get { key } => {
            println!("{}", settings.get(&key)?);
        }
        SettingsAction::Set { key, value } => {
            settings.set(&key, &value)?;
            settings.save_to_file(file)?;
        }
    }
    Ok(())
}
