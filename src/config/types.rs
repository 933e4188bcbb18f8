//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::config::constants::{
    DEFAULT_DATABASE_DIRECTORY, DEFAULT_PARALLELISM, DEFAULT_RETRY_FOR, DEFAULT_URL,
    LOCK_FILE_NAME,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by the library. It can be
/// constructed programmatically, or assembled from a config file, the
/// environment and CLI flags with [`load_config`](crate::config::load_config).
///
/// # Examples
///
/// ```no_run
/// use geoipupdate::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     account_id: 42,
///     license_key: "000000000001".to_string(),
///     edition_ids: vec!["GeoLite2-City".to_string()],
///     database_directory: PathBuf::from("/var/lib/GeoIP"),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// MaxMind account ID
    pub account_id: u32,

    /// License key paired with the account
    pub license_key: String,

    /// Editions to keep up to date, in processing order
    pub edition_ids: Vec<String>,

    /// Directory holding the `.mmdb` files
    pub database_directory: PathBuf,

    /// Lock file path; defaults to `<database_directory>/.geoipupdate.lock`
    pub lock_file: Option<PathBuf>,

    /// Base URL of the update service
    pub url: String,

    /// Proxy used for every request, already normalized
    pub proxy: Option<Url>,

    /// Set database file times to the server's `Last-Modified`
    pub preserve_file_times: bool,

    /// Number of editions processed concurrently
    pub parallelism: usize,

    /// Time budget for retrying transient failures, per edition
    pub retry_for: Duration,

    /// Debug logging
    pub verbose: bool,

    /// Print the JSON outcome summary on stdout
    pub output: bool,
}

impl Config {
    /// The lock file path, falling back to the one inside the database directory.
    pub fn lock_file(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| self.database_directory.join(LOCK_FILE_NAME))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_id: 0,
            license_key: String::new(),
            edition_ids: Vec::new(),
            database_directory: PathBuf::from(DEFAULT_DATABASE_DIRECTORY),
            lock_file: None,
            url: DEFAULT_URL.to_string(),
            proxy: None,
            preserve_file_times: false,
            parallelism: DEFAULT_PARALLELISM,
            retry_for: DEFAULT_RETRY_FOR,
            verbose: false,
            output: false,
        }
    }
}

/// Command-line options.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "geoipupdate",
    version,
    about = "Downloads and installs updated MaxMind GeoIP databases"
)]
pub struct Opt {
    /// Configuration file
    #[arg(short = 'f', long = "config-file", env = "GEOIPUPDATE_CONF_FILE")]
    pub config_file: Option<PathBuf>,

    /// Store databases in this directory (uses config if not specified)
    #[arg(short = 'd', long = "database-directory")]
    pub database_directory: Option<PathBuf>,

    /// Use verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output download/update results in JSON format
    #[arg(short, long)]
    pub output: bool,

    /// Set the number of parallel database downloads (0 uses the config value)
    #[arg(long, default_value_t = 0)]
    pub parallelism: usize,

    /// Log format: plain or json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Log level, overriding the one implied by --verbose
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

impl Opt {
    /// The effective log level: `--log-level` if given, otherwise `debug` with
    /// `--verbose` and `warn` without.
    pub fn level(&self, config: &Config) -> LogLevel {
        match self.log_level {
            Some(level) => level,
            None if config.verbose => LogLevel::Debug,
            None => LogLevel::Warn,
        }
    }
}
