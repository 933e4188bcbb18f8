//! Edition metadata lookup.

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use reqwest::Response;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::config::MAX_ERROR_BODY_BYTES;
use crate::error_handling::{HttpError, UpdateError};

/// What the update service reports about the current release of an edition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Metadata {
    pub edition_id: String,
    /// MD5 of the released database, lowercase hex.
    pub md5: String,
    /// Release day, `YYYY-MM-DD`.
    pub date: String,
}

impl Metadata {
    /// The release day as a date.
    pub fn release_day(&self) -> Result<NaiveDate, UpdateError> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| UpdateError::InvalidReleaseDate(self.date.clone()))
    }

    /// Midnight UTC at the start of the release day.
    pub fn released_at(&self) -> Result<DateTime<Utc>, UpdateError> {
        Ok(self.release_day()?.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// The release day as the `YYYYMMDD` value of the download `date` parameter.
    pub fn download_date(&self) -> String {
        self.date.replace('-', "")
    }

    /// Whether `md5` names the same content as this release.
    pub fn matches(&self, md5: &str) -> bool {
        self.md5.eq_ignore_ascii_case(md5)
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    databases: Vec<Metadata>,
}

impl Client {
    /// Asks the update service for the current release of `edition`.
    pub async fn fetch_metadata(
        &self,
        edition: &str,
        cancel: &CancellationToken,
    ) -> Result<Metadata, UpdateError> {
        let mut url = self.endpoint_url(&["geoip", "updates", "metadata"])?;
        url.query_pairs_mut().append_pair("edition_id", edition);
        debug!("Requesting metadata for {}: {}", edition, url);

        let response = cancel
            .run_until_cancelled(self.authorized_get(url).send())
            .await
            .ok_or(UpdateError::Cancelled)?
            .map_err(|err| UpdateError::Network {
                what: "metadata",
                err,
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(http_error(response, cancel).await);
        }

        let body = cancel
            .run_until_cancelled(response.bytes())
            .await
            .ok_or(UpdateError::Cancelled)?
            .map_err(|err| UpdateError::Network {
                what: "metadata",
                err,
            })?;

        let MetadataResponse { mut databases } =
            serde_json::from_slice(&body).map_err(UpdateError::MetadataDecode)?;
        match databases.pop() {
            Some(metadata) if databases.is_empty() => Ok(metadata),
            _ => Err(UpdateError::MissingEdition(edition.to_string())),
        }
    }
}

/// Turns a non-200 response into an [`HttpError`], keeping at most
/// `MAX_ERROR_BODY_BYTES` of the body.
pub(crate) async fn http_error(mut response: Response, cancel: &CancellationToken) -> UpdateError {
    let status = response.status().as_u16();
    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY_BYTES {
        match cancel.run_until_cancelled(response.chunk()).await {
            Some(Ok(Some(chunk))) => body.extend_from_slice(&chunk),
            // The status is what matters; a failed body read just shortens the excerpt.
            _ => break,
        }
    }
    UpdateError::from(HttpError::new(status, &body))
}
