//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (endpoints, file names, retry tuning)
//! - The [`Config`] struct and CLI option types
//! - Layered loading from a `GeoIP.conf` file, `GEOIPUPDATE_*` variables and flags

mod constants;
mod duration;
mod env;
mod file;
mod load;
mod proxy;
mod types;

// Re-export all constants
pub use constants::*;
pub use duration::parse_duration;
pub use load::{load_config, load_config_with, validate};
pub use proxy::parse_proxy;
pub use types::{Config, LogFormat, LogLevel, Opt};
