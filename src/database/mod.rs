//! Local storage of edition databases.
//!
//! A database is published by writing it to `<edition>.mmdb.temporary`,
//! verifying its MD5 and renaming it over `<edition>.mmdb`. Readers of the
//! final path therefore only ever see complete, verified files.

mod local_file;
mod staging;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::client::DatabaseStream;
use crate::config::{DATABASE_EXTENSION, TEMP_EXTENSION};
use crate::error_handling::UpdateError;

// Re-export public API
pub use local_file::LocalFileWriter;

/// Destination for downloaded editions.
///
/// Methods block; async callers run them through `spawn_blocking`.
pub trait Writer: Send + Sync + 'static {
    /// Lowercase hex MD5 of the stored edition, or [`ZERO_MD5`](crate::config::ZERO_MD5)
    /// when there is none.
    fn hash(&self, edition: &str) -> Result<String, UpdateError>;

    /// Stores `stream` as the new copy of `edition` if its MD5 is `expected_md5`.
    ///
    /// The stream is consumed and dropped before the file is published.
    fn write(
        &self,
        edition: &str,
        stream: DatabaseStream,
        expected_md5: &str,
        last_modified: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), UpdateError>;
}

/// `<dir>/<edition>.mmdb`
pub fn database_path(dir: &Path, edition: &str) -> PathBuf {
    dir.join(format!("{}{}", edition, DATABASE_EXTENSION))
}

/// `<dir>/<edition>.mmdb.temporary`
pub fn temporary_path(dir: &Path, edition: &str) -> PathBuf {
    dir.join(format!("{}{}{}", edition, DATABASE_EXTENSION, TEMP_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let dir = Path::new("/var/lib/GeoIP");
        assert_eq!(
            database_path(dir, "GeoIP2-City"),
            PathBuf::from("/var/lib/GeoIP/GeoIP2-City.mmdb")
        );
        assert_eq!(
            temporary_path(dir, "GeoIP2-City"),
            PathBuf::from("/var/lib/GeoIP/GeoIP2-City.mmdb.temporary")
        );
    }
}
