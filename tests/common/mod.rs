// Shared helpers for the end-to-end update tests.

use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use geoipupdate::Config;

pub const LAST_MODIFIED: &str = "Fri, 23 Feb 2024 00:00:00 GMT";
pub const LAST_MODIFIED_TS: i64 = 1_708_646_400;

/// Builds a `.tar.gz` archive holding `files`.
pub fn create_test_tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(LAST_MODIFIED_TS as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *content)
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("finish archive")
}

pub fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Config pointing at `server` and storing into `dir`.
#[allow(dead_code)] // Not every test file uses it
pub fn test_config(server: &MockServer, dir: &TempDir, editions: &[&str]) -> Config {
    Config {
        account_id: 42,
        license_key: "secret".into(),
        edition_ids: editions.iter().map(|e| e.to_string()).collect(),
        database_directory: dir.path().to_path_buf(),
        url: server.uri(),
        retry_for: Duration::ZERO,
        ..Default::default()
    }
}

/// Serves metadata announcing `md5` for `edition`.
pub async fn mount_metadata(server: &MockServer, edition: &str, md5: &str) {
    Mock::given(method("GET"))
        .and(path("/geoip/updates/metadata"))
        .and(query_param("edition_id", edition))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "databases": [{"edition_id": edition, "md5": md5, "date": "2024-02-23"}]
        })))
        .mount(server)
        .await;
}

/// Serves `archive` as the download of `edition`.
pub async fn mount_download(server: &MockServer, edition: &str, archive: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/geoip/databases/{}/download", edition)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", LAST_MODIFIED)
                .set_body_bytes(archive),
        )
        .mount(server)
        .await;
}

/// Number of requests the server saw for `request_path`.
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
