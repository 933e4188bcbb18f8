//! geoipupdate library: keeps MaxMind GeoIP databases up to date
//!
//! For every configured edition the updater asks the update service for the
//! current release's MD5, compares it with the local `.mmdb` file and, when
//! they differ, downloads the `.tar.gz` release, extracts the database while
//! verifying its MD5 and atomically replaces the local copy. A file lock keeps
//! concurrent updaters out of the same directory.
//!
//! # Example
//!
//! ```no_run
//! use geoipupdate::{load_config_with, run_update, Opt};
//! use clap::Parser;
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opt = Opt::parse_from(["geoipupdate", "-d", "/var/lib/GeoIP"]);
//! let config = load_config_with(&opt, Some(Path::new("/etc/GeoIP.conf")), |_| None)?;
//!
//! let report = run_update(config).await?;
//! for outcome in &report.outcomes {
//!     println!("{}: {} -> {}", outcome.edition_id, outcome.old_hash, outcome.new_hash);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Database extraction runs on the
//! blocking pool via `spawn_blocking`.

pub mod client;
pub mod config;
pub mod database;
mod error_handling;
pub mod initialization;
mod lock;
mod models;
mod run;

// Re-export public API
pub use client::{Client, DatabaseStream, DownloadResult, Metadata, UpdateClient};
pub use config::{load_config, load_config_with, Config, LogFormat, LogLevel, Opt};
pub use database::{LocalFileWriter, Writer};
pub use error_handling::{
    ConfigError, ErrorCategory, HttpError, InitializationError, LockError, UpdateError,
};
pub use lock::FileLock;
pub use models::{Outcome, UpdateReport};
pub use run::{fetch_with_retry, run_update, JobProcessor, Updater};
