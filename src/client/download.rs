//! Conditional database download.

use std::io;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use log::{debug, info};
use reqwest::header::LAST_MODIFIED;
use reqwest::Response;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;

use crate::client::archive::{open_database, DatabaseStream};
use crate::client::metadata::{http_error, Metadata};
use crate::client::Client;
use crate::error_handling::UpdateError;

/// Result of asking for an edition given the local fingerprint.
#[derive(Debug)]
pub enum DownloadResult {
    /// The local copy matches the current release. No download was made.
    UpToDate { metadata: Metadata },
    /// A newer release is available and its database is ready to be read.
    Available {
        metadata: Metadata,
        last_modified: DateTime<Utc>,
        stream: DatabaseStream,
    },
}

impl DownloadResult {
    pub fn update_available(&self) -> bool {
        matches!(self, DownloadResult::Available { .. })
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            DownloadResult::UpToDate { metadata } | DownloadResult::Available { metadata, .. } => {
                metadata
            }
        }
    }
}

impl Client {
    /// Downloads `edition` unless its current release has fingerprint `current_md5`.
    ///
    /// On success the returned stream is already positioned at the database
    /// member of the archive. The body is fetched lazily as the stream is read,
    /// so reading must happen off the async runtime (e.g. in `spawn_blocking`).
    pub async fn download_edition(
        &self,
        edition: &str,
        current_md5: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult, UpdateError> {
        let metadata = self.fetch_metadata(edition, cancel).await?;

        if metadata.matches(current_md5) {
            debug!("No new updates available for {}", edition);
            return Ok(DownloadResult::UpToDate { metadata });
        }

        let mut url = self.endpoint_url(&["geoip", "databases", &metadata.edition_id, "download"])?;
        url.query_pairs_mut()
            .append_pair("date", &metadata.download_date())
            .append_pair("suffix", "tar.gz");
        debug!("Downloading {} from {}", edition, url);

        let response = cancel
            .run_until_cancelled(self.authorized_get(url).send())
            .await
            .ok_or(UpdateError::Cancelled)?
            .map_err(|err| UpdateError::Network {
                what: "download",
                err,
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(http_error(response, cancel).await);
        }

        let last_modified = parse_last_modified(&response);
        let reader = body_reader(response, cancel);

        let scan_cancel = cancel.clone();
        let stream = tokio::task::spawn_blocking(move || {
            open_database(reader).map_err(|err| match err {
                UpdateError::Archive(_) if scan_cancel.is_cancelled() => UpdateError::Cancelled,
                err => err,
            })
        })
        .await
        .map_err(|err| UpdateError::JobPanicked(err.to_string()))??;

        let last_modified = last_modified?;
        info!("Updates available for {}", edition);

        Ok(DownloadResult::Available {
            metadata,
            last_modified,
            stream,
        })
    }
}

/// Bridges the response body into a blocking reader.
///
/// The body ends early once `cancel` fires, which surfaces to the reader as a
/// truncated archive. Must be called from within the runtime.
fn body_reader(response: Response, cancel: &CancellationToken) -> impl io::Read + Send + 'static {
    let body = response
        .bytes_stream()
        .map_err(io::Error::other)
        .take_until(cancel.clone().cancelled_owned())
        .boxed();
    SyncIoBridge::new(StreamReader::new(body))
}

fn parse_last_modified(response: &Response) -> Result<DateTime<Utc>, UpdateError> {
    let value = response
        .headers()
        .get(LAST_MODIFIED)
        .ok_or_else(|| UpdateError::LastModified("header missing".to_string()))?
        .to_str()
        .map_err(|err| UpdateError::LastModified(err.to_string()))?;

    parse_http_date(value)
        .map_err(|err| UpdateError::LastModified(format!("parsing time '{}': {}", value, err)))
}

/// Parses an RFC 1123 date. Servers send `GMT`, but `UTC` is accepted too.
fn parse_http_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc2822(value)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|err| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S UTC")
                .map(|t| t.and_utc())
                .map_err(|_| err)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::archive::tests::create_test_tar_gz;
    use std::io::Read;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MD5: &str = "cfa36ddc8279b5483a5aa25e9a6151f4";
    const LAST_MODIFIED_VALUE: &str = "Fri, 23 Feb 2024 00:00:00 GMT";

    async fn mount_metadata(server: &MockServer, edition: &str) {
        Mock::given(method("GET"))
            .and(path("/geoip/updates/metadata"))
            .and(query_param("edition_id", edition))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "databases": [{"edition_id": edition, "md5": MD5, "date": "2024-02-23"}]
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> Client {
        Client::new(reqwest::Client::new(), 42, "secret")
            .unwrap()
            .with_endpoint(&server.uri())
            .unwrap()
    }

    async fn read_stream(mut stream: DatabaseStream) -> Vec<u8> {
        tokio::task::spawn_blocking(move || {
            let mut content = Vec::new();
            stream.read_to_end(&mut content).map(|_| content)
        })
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_up_to_date_skips_download() {
        let server = MockServer::start().await;
        mount_metadata(&server, "GeoIP2-City").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/GeoIP2-City/download"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client(&server)
            .download_edition("GeoIP2-City", &MD5.to_uppercase(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.update_available());
        assert_eq!(result.metadata().md5, MD5);
    }

    #[tokio::test]
    async fn test_download_available() {
        let server = MockServer::start().await;
        mount_metadata(&server, "GeoIP2-City").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/GeoIP2-City/download"))
            .and(query_param("date", "20240223"))
            .and(query_param("suffix", "tar.gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", LAST_MODIFIED_VALUE)
                    .set_body_bytes(create_test_tar_gz(&[(
                        "GeoIP2-City_20240223/GeoIP2-City.mmdb",
                        &b"database content"[..],
                    )])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .download_edition("GeoIP2-City", crate::config::ZERO_MD5, &CancellationToken::new())
            .await
            .unwrap();

        let DownloadResult::Available {
            metadata,
            last_modified,
            stream,
        } = result
        else {
            panic!("expected an update");
        };
        assert_eq!(metadata.md5, MD5);
        assert_eq!(last_modified.timestamp(), 1_708_646_400);
        assert_eq!(stream.member_name(), "GeoIP2-City_20240223/GeoIP2-City.mmdb");
        assert_eq!(read_stream(stream).await, b"database content");
    }

    #[tokio::test]
    async fn test_edition_is_path_escaped() {
        let server = MockServer::start().await;
        mount_metadata(&server, "odd name").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/odd%20name/download"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such edition"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .download_edition("odd name", crate::config::ZERO_MD5, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.http_error().map(|e| e.status), Some(404));
    }

    #[test]
    fn test_parse_http_date_zones() {
        for value in [
            "Fri, 23 Feb 2024 00:00:00 GMT",
            "Fri, 23 Feb 2024 00:00:00 UTC",
            "Fri, 23 Feb 2024 00:00:00 +0000",
        ] {
            let parsed = parse_http_date(value).unwrap();
            assert_eq!(parsed.timestamp(), 1_708_646_400, "{}", value);
        }
        assert!(parse_http_date("Fri, 23 Feb 2024 00:00:00 CET").is_err());
        assert!(parse_http_date("2024-02-23").is_err());
    }

    #[tokio::test]
    async fn test_utc_last_modified() {
        let server = MockServer::start().await;
        mount_metadata(&server, "GeoIP2-City").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/GeoIP2-City/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Fri, 23 Feb 2024 00:00:00 UTC")
                    .set_body_bytes(create_test_tar_gz(&[("GeoIP2-City.mmdb", &b"x"[..])])),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .download_edition("GeoIP2-City", crate::config::ZERO_MD5, &CancellationToken::new())
            .await
            .unwrap();
        let DownloadResult::Available { last_modified, .. } = result else {
            panic!("expected an update");
        };
        assert_eq!(last_modified.timestamp(), 1_708_646_400);
    }

    #[tokio::test]
    async fn test_missing_last_modified() {
        let server = MockServer::start().await;
        mount_metadata(&server, "GeoIP2-City").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/GeoIP2-City/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(create_test_tar_gz(&[("GeoIP2-City.mmdb", &b"x"[..])])),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .download_edition("GeoIP2-City", crate::config::ZERO_MD5, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::LastModified(_)), "got {:?}", err);
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_archive_without_database() {
        let server = MockServer::start().await;
        mount_metadata(&server, "GeoIP2-City").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/GeoIP2-City/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", LAST_MODIFIED_VALUE)
                    .set_body_bytes(create_test_tar_gz(&[("README.txt", &b"x"[..])])),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .download_edition("GeoIP2-City", crate::config::ZERO_MD5, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::NoDatabaseInArchive));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        mount_metadata(&server, "GeoIP2-City").await;
        Mock::given(method("GET"))
            .and(path("/geoip/databases/GeoIP2-City/download"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server)
            .download_edition("GeoIP2-City", crate::config::ZERO_MD5, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.http_error().map(|e| e.status), Some(503));
        assert!(!err.is_permanent());
    }
}
