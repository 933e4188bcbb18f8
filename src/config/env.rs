//! Environment variable overrides.
//!
//! Every `GEOIPUPDATE_*` variable that is set replaces the value from the
//! config file. The `_FILE` variants read the secret from a file instead,
//! trimming surrounding whitespace, and win over the plain variable.

use std::fs;
use std::path::PathBuf;

use crate::config::duration::parse_duration;
use crate::config::file::parse_flag;
use crate::config::load::{normalize_host, parse_parallelism, ConfigBuilder};
use crate::error_handling::ConfigError;

/// Applies environment overrides, looking variables up through `lookup`.
///
/// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
pub(crate) fn apply_env<F>(builder: &mut ConfigBuilder, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = &mut builder.config;

    if let Some(value) = lookup("GEOIPUPDATE_ACCOUNT_ID") {
        config.account_id = value.parse().map_err(|_| ConfigError::InvalidAccountId)?;
    }
    if let Some(path) = lookup("GEOIPUPDATE_ACCOUNT_ID_FILE").filter(|v| !v.is_empty()) {
        let value = read_secret("GEOIPUPDATE_ACCOUNT_ID_FILE", &path)?;
        config.account_id = value.parse().map_err(|_| ConfigError::InvalidAccountId)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_DB_DIR") {
        config.database_directory = PathBuf::from(value);
    }

    if let Some(value) = lookup("GEOIPUPDATE_EDITION_IDS") {
        config.edition_ids = value.split_whitespace().map(str::to_string).collect();
    }

    if let Some(value) = lookup("GEOIPUPDATE_HOST") {
        config.url = normalize_host("GEOIPUPDATE_HOST", &value)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_LICENSE_KEY") {
        config.license_key = value;
    }
    if let Some(path) = lookup("GEOIPUPDATE_LICENSE_KEY_FILE").filter(|v| !v.is_empty()) {
        config.license_key = read_secret("GEOIPUPDATE_LICENSE_KEY_FILE", &path)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_LOCK_FILE") {
        config.lock_file = Some(PathBuf::from(value));
    }

    if let Some(value) = lookup("GEOIPUPDATE_PARALLELISM") {
        config.parallelism = parse_parallelism(&value)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_PRESERVE_FILE_TIMES") {
        config.preserve_file_times = parse_flag("GEOIPUPDATE_PRESERVE_FILE_TIMES", &value)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_RETRY_FOR") {
        config.retry_for = parse_duration(&value)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_VERBOSE") {
        config.verbose = parse_flag("GEOIPUPDATE_VERBOSE", &value)?;
    }

    if let Some(value) = lookup("GEOIPUPDATE_PROXY") {
        builder.proxy = value;
    }
    if let Some(value) = lookup("GEOIPUPDATE_PROXY_USER_PASSWORD") {
        builder.proxy_user_password = value;
    }

    Ok(())
}

fn read_secret(name: &'static str, path: &str) -> Result<String, ConfigError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|err| ConfigError::SecretFile { name, err })
}
