//! `GeoIP.conf` parsing.
//!
//! The file holds one `Key value...` setting per line. Blank lines and lines
//! starting with `#` are ignored.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::duration::parse_duration;
use crate::config::load::{normalize_host, parse_parallelism, ConfigBuilder};
use crate::error_handling::ConfigError;

// Keys accepted for compatibility and otherwise ignored.
const DEPRECATED_KEYS: &[&str] = &["Protocol", "SkipHostnameVerification", "SkipPeerVerification"];

/// Reads `path` and applies its settings on top of `builder`.
pub(crate) fn apply_config_file(builder: &mut ConfigBuilder, path: &Path) -> Result<(), ConfigError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigError::OpenFile {
        path: path.to_path_buf(),
        err,
    })?;
    debug!("Using config file {}", path.display());
    apply_config_str(builder, &contents)
}

pub(crate) fn apply_config_str(builder: &mut ConfigBuilder, contents: &str) -> Result<(), ConfigError> {
    let mut keys_seen: HashSet<&str> = HashSet::new();

    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(key), Some(first)) = (fields.next(), fields.next()) else {
            return Err(ConfigError::InvalidLine(line_number));
        };
        let value = std::iter::once(first).chain(fields).collect::<Vec<_>>().join(" ");

        if !keys_seen.insert(key) {
            return Err(ConfigError::DuplicateKey(key.to_string()));
        }

        let config = &mut builder.config;
        match key {
            "AccountID" | "UserId" => {
                config.account_id = value.parse().map_err(|_| ConfigError::InvalidAccountId)?;
                keys_seen.extend(["AccountID", "UserId"]);
            }
            "DatabaseDirectory" => config.database_directory = PathBuf::from(value),
            "EditionIDs" | "ProductIds" => {
                config.edition_ids = value.split_whitespace().map(str::to_string).collect();
                keys_seen.extend(["EditionIDs", "ProductIds"]);
            }
            "Host" => config.url = normalize_host("Host", &value)?,
            "LicenseKey" => config.license_key = value,
            "LockFile" => config.lock_file = Some(PathBuf::from(value)),
            "PreserveFileTimes" => {
                config.preserve_file_times = parse_flag("PreserveFileTimes", &value)?;
            }
            "Proxy" => builder.proxy = value,
            "ProxyUserPassword" => builder.proxy_user_password = value,
            "RetryFor" => config.retry_for = parse_duration(&value)?,
            "Parallelism" => config.parallelism = parse_parallelism(&value)?,
            key if DEPRECATED_KEYS.contains(&key) => {}
            _ => return Err(ConfigError::UnknownOption(line_number)),
        }
    }

    Ok(())
}

/// Parses a `0`/`1` setting.
pub(crate) fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ConfigError::InvalidFlag(name)),
    }
}
