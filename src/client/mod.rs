//! Client for the MaxMind update service.
//!
//! This module provides:
//! - Edition metadata lookup (`/geoip/updates/metadata`)
//! - Conditional download of a release (`/geoip/databases/<edition>/download`)
//! - Streaming extraction of the `.mmdb` member from the `.tar.gz` payload

mod archive;
mod download;
mod metadata;

use std::future::Future;

use reqwest::header::USER_AGENT;
use reqwest::RequestBuilder;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{Config, DEFAULT_URL, USER_AGENT as USER_AGENT_VALUE};
use crate::error_handling::{ConfigError, UpdateError};

// Re-export public API
pub use archive::{open_database, DatabaseStream};
pub use download::DownloadResult;
pub use metadata::Metadata;

#[cfg(test)]
pub(crate) use archive::tests::create_test_tar_gz;

/// Source of edition releases.
///
/// [`Client`] talks to the update service; tests substitute their own.
pub trait UpdateClient: Send + Sync + 'static {
    /// Returns the current release of `edition` unless its fingerprint is
    /// `current_md5`.
    fn download(
        &self,
        edition: &str,
        current_md5: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DownloadResult, UpdateError>> + Send;
}

/// Authenticated client for the update service.
#[derive(Debug, Clone)]
pub struct Client {
    account_id: u32,
    license_key: String,
    endpoint: Url,
    http: reqwest::Client,
}

impl Client {
    /// Creates a client for the default endpoint.
    pub fn new(
        http: reqwest::Client,
        account_id: u32,
        license_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let license_key = license_key.into();
        if account_id == 0 {
            return Err(ConfigError::Missing("AccountID"));
        }
        if license_key.is_empty() {
            return Err(ConfigError::InvalidLicenseKey);
        }

        let endpoint = parse_endpoint(DEFAULT_URL)?;
        Ok(Self {
            account_id,
            license_key,
            endpoint,
            http,
        })
    }

    /// Creates a client with the credentials and endpoint from `config`.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self, ConfigError> {
        Self::new(http, config.account_id, config.license_key.clone())?.with_endpoint(&config.url)
    }

    /// Points the client at another server, e.g. a mirror or a test double.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ConfigError> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The endpoint with `segments` appended to its path, each percent-encoded.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, UpdateError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidUrl {
                name: "Host",
                err: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized_get(&self, url: Url) -> RequestBuilder {
        self.http
            .get(url)
            .basic_auth(self.account_id, Some(&self.license_key))
            .header(USER_AGENT, USER_AGENT_VALUE)
    }
}

impl UpdateClient for Client {
    fn download(
        &self,
        edition: &str,
        current_md5: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DownloadResult, UpdateError>> + Send {
        self.download_edition(edition, current_md5, cancel)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(endpoint).map_err(|err| ConfigError::InvalidUrl { name: "Host", err })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            name: "Host",
            err: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        });
    }
    Ok(url)
}
