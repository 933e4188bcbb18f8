//! Configuration layering and validation.
//!
//! Values are applied in order: defaults, config file, environment, CLI flags.
//! Later layers override earlier ones. Validation runs once all layers are in.

use std::path::{Path, PathBuf};

use log::debug;

use crate::config::constants::DEFAULT_CONFIG_FILE;
use crate::config::env::apply_env;
use crate::config::file::apply_config_file;
use crate::config::proxy::{has_scheme, parse_proxy};
use crate::config::types::{Config, Opt};
use crate::error_handling::ConfigError;

/// A [`Config`] being assembled, plus the raw proxy settings that are only
/// combined once every layer has been applied.
#[derive(Debug, Default)]
pub(crate) struct ConfigBuilder {
    pub(crate) config: Config,
    pub(crate) proxy: String,
    pub(crate) proxy_user_password: String,
}

/// Builds the configuration for a CLI run.
///
/// Reads the config file named by `-f`/`GEOIPUPDATE_CONF_FILE`, or the default
/// `/usr/local/etc/GeoIP.conf` when it exists, then the process environment,
/// then the remaining flags.
pub fn load_config(opt: &Opt) -> Result<Config, ConfigError> {
    let default_file = Path::new(DEFAULT_CONFIG_FILE);
    let config_file = opt
        .config_file
        .clone()
        .or_else(|| default_file.exists().then(|| default_file.to_path_buf()));

    load_config_with(opt, config_file.as_deref(), |name| std::env::var(name).ok())
}

/// Builds the configuration from an explicit config file and variable lookup.
pub fn load_config_with<F>(
    opt: &Opt,
    config_file: Option<&Path>,
    lookup: F,
) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = ConfigBuilder::default();

    if let Some(path) = config_file {
        apply_config_file(&mut builder, path)?;
    }
    apply_env(&mut builder, lookup)?;
    apply_flags(&mut builder.config, opt);

    let ConfigBuilder {
        mut config,
        proxy,
        proxy_user_password,
    } = builder;

    config.proxy = parse_proxy(&proxy, &proxy_user_password)?;
    if config.lock_file.is_none() {
        config.lock_file = Some(config.database_directory.join(crate::config::LOCK_FILE_NAME));
    }

    validate(&config)?;

    debug!(
        "Using database directory {}",
        config.database_directory.display()
    );
    Ok(config)
}

fn apply_flags(config: &mut Config, opt: &Opt) {
    if let Some(dir) = opt.database_directory.as_ref().filter(|d| !d.as_os_str().is_empty()) {
        config.database_directory = PathBuf::from(dir);
    }
    if opt.parallelism > 0 {
        config.parallelism = opt.parallelism;
    }
    config.verbose |= opt.verbose;
    config.output |= opt.output;
}

/// Checks the settings every run needs.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    // The old free-download placeholder credentials no longer work.
    if (config.account_id == 0 || config.account_id == 999_999)
        && config.license_key == "000000000000"
    {
        return Err(ConfigError::LegacyCredentials);
    }
    if config.edition_ids.is_empty() {
        return Err(ConfigError::Missing("EditionIDs"));
    }
    if config.account_id == 0 {
        return Err(ConfigError::Missing("AccountID"));
    }
    if config.license_key.is_empty() {
        return Err(ConfigError::Missing("LicenseKey"));
    }
    if config.parallelism == 0 {
        return Err(ConfigError::InvalidParallelism("0".to_string()));
    }
    url::Url::parse(&config.url).map_err(|err| ConfigError::InvalidUrl { name: "Host", err })?;
    Ok(())
}

/// Prefixes `https://` to a host given without a scheme and checks it parses.
pub(crate) fn normalize_host(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let raw = if has_scheme(value) {
        value.to_string()
    } else {
        format!("https://{}", value)
    };
    let url = url::Url::parse(&raw).map_err(|err| ConfigError::InvalidUrl { name, err })?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Parses a strictly positive parallelism value.
pub(crate) fn parse_parallelism(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidParallelism(value.to_string())),
    }
}
