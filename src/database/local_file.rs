//! Writer that keeps editions as `.mmdb` files in a local directory.

use std::fs::{DirBuilder, File, FileTimes};
use std::io::{self, Read, Write};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::{debug, info};
use md5::{Digest, Md5};
use tokio_util::sync::CancellationToken;

use crate::client::DatabaseStream;
use crate::config::{COPY_BUFFER_SIZE, ZERO_MD5};
use crate::database::staging::StagingFile;
use crate::database::{database_path, temporary_path, Writer};
use crate::error_handling::UpdateError;

/// Stores editions under a database directory.
#[derive(Debug, Clone)]
pub struct LocalFileWriter {
    dir: PathBuf,
    preserve_file_times: bool,
}

impl LocalFileWriter {
    /// Creates a writer for `dir`.
    ///
    /// The parent of `dir` is created (mode 0750) if missing; `dir` itself must
    /// exist by the time the first edition is written.
    pub fn new(dir: impl Into<PathBuf>, preserve_file_times: bool) -> Result<Self, UpdateError> {
        let dir = dir.into();
        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            DirBuilder::new()
                .recursive(true)
                .mode(0o750)
                .create(parent)
                .map_err(|e| UpdateError::local_io("creating database directory", e))?;
        }
        Ok(Self {
            dir,
            preserve_file_times,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `stream` into `staging`, checking for cancellation between chunks.
    fn copy(
        stream: &mut DatabaseStream,
        staging: &mut StagingFile,
        cancel: &CancellationToken,
    ) -> Result<u64, UpdateError> {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(UpdateError::Cancelled);
            }
            let n = match stream.read(&mut buf) {
                Ok(0) => return Ok(written),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) if cancel.is_cancelled() => return Err(UpdateError::Cancelled),
                Err(e) => return Err(UpdateError::Archive(e)),
            };
            staging.write_all(&buf[..n]).map_err(|e| {
                UpdateError::local_io(
                    format!("writing to temporary file {}", staging.path().display()),
                    e,
                )
            })?;
            written += n as u64;
        }
    }
}

impl Writer for LocalFileWriter {
    fn hash(&self, edition: &str) -> Result<String, UpdateError> {
        let path = database_path(&self.dir, edition);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Database {} does not exist, using zeroed hash", path.display());
                return Ok(ZERO_MD5.to_string());
            }
            Err(e) => return Err(UpdateError::local_io("opening database", e)),
        };

        let mut hasher = Md5::new();
        io::copy(&mut file, &mut hasher)
            .map_err(|e| UpdateError::local_io("calculating database hash", e))?;
        let md5 = hex::encode(hasher.finalize());
        debug!("Calculated MD5 sum for {}: {}", path.display(), md5);
        Ok(md5)
    }

    fn write(
        &self,
        edition: &str,
        mut stream: DatabaseStream,
        expected_md5: &str,
        last_modified: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), UpdateError> {
        let path = database_path(&self.dir, edition);
        let temp_path = temporary_path(&self.dir, edition);

        let mut staging = StagingFile::create(&temp_path).map_err(|e| {
            UpdateError::local_io(
                format!("creating temporary file at {}", temp_path.display()),
                e,
            )
        })?;

        let written = Self::copy(&mut stream, &mut staging, cancel)?;
        // Closes the body, gzip decoder and tar reader.
        drop(stream);

        let actual = staging.md5();
        if !actual.eq_ignore_ascii_case(expected_md5) {
            return Err(UpdateError::HashMismatch {
                expected: expected_md5.to_string(),
                actual,
            });
        }

        staging
            .persist(&path)
            .map_err(|e| UpdateError::local_io("moving database into place", e))?;

        sync_dir(&self.dir);

        if self.preserve_file_times {
            set_modified_time(&path, last_modified)?;
        }

        info!(
            "Database {} successfully updated: {} ({} bytes)",
            edition, actual, written
        );
        Ok(())
    }
}

/// Flushes directory metadata so the rename survives a crash. Not every
/// platform or filesystem supports this, so failures are only logged.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Syncing database directory {}: {}", dir.display(), e);
    }
}

fn set_modified_time(path: &Path, modified: DateTime<Utc>) -> Result<(), UpdateError> {
    let time = SystemTime::from(modified);
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_times(FileTimes::new().set_accessed(time).set_modified(time)))
        .map_err(|e| {
            UpdateError::local_io(
                format!("setting times on database {}", path.display()),
                e,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    const CONTENT: &[u8] = b"database content";
    const CONTENT_MD5: &str = "cfa36ddc8279b5483a5aa25e9a6151f4";

    fn stream(content: &[u8]) -> DatabaseStream {
        DatabaseStream::new("test.mmdb", Cursor::new(content.to_vec()))
    }

    fn last_modified() -> DateTime<Utc> {
        DateTime::from_timestamp(1_708_646_400, 0).unwrap()
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"))
        }
    }

    #[test]
    fn test_hash_of_missing_file_is_zero() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path(), false).unwrap();
        assert_eq!(writer.hash("GeoIP2-City").unwrap(), ZERO_MD5);
    }

    #[test]
    fn test_write_then_hash() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path(), false).unwrap();

        writer
            .write(
                "GeoIP2-City",
                stream(CONTENT),
                &CONTENT_MD5.to_uppercase(),
                last_modified(),
                &CancellationToken::new(),
            )
            .unwrap();

        let path = temp_dir.path().join("GeoIP2-City.mmdb");
        assert_eq!(fs::read(&path).unwrap(), CONTENT);
        assert!(!temp_dir.path().join("GeoIP2-City.mmdb.temporary").exists());
        assert_eq!(writer.hash("GeoIP2-City").unwrap(), CONTENT_MD5);
    }

    #[test]
    fn test_hash_mismatch_keeps_old_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path(), false).unwrap();
        let path = temp_dir.path().join("GeoIP2-City.mmdb");
        fs::write(&path, b"old").unwrap();

        let err = writer
            .write(
                "GeoIP2-City",
                stream(b"corrupted"),
                CONTENT_MD5,
                last_modified(),
                &CancellationToken::new(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            UpdateError::HashMismatch { ref actual, .. } if actual == "88ed91fad91b8b69b62ce17ae542ff45"
        ));
        assert!(!err.is_permanent());
        assert_eq!(fs::read(&path).unwrap(), b"old");
        assert!(!temp_dir.path().join("GeoIP2-City.mmdb.temporary").exists());
    }

    #[test]
    fn test_stream_error_is_transient_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path(), false).unwrap();

        let err = writer
            .write(
                "GeoIP2-City",
                DatabaseStream::new("x.mmdb", FailingReader),
                CONTENT_MD5,
                last_modified(),
                &CancellationToken::new(),
            )
            .unwrap_err();

        assert!(matches!(err, UpdateError::Archive(_)));
        assert!(!err.is_permanent());
        assert!(!temp_dir.path().join("GeoIP2-City.mmdb.temporary").exists());
    }

    #[test]
    fn test_cancelled_write() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path(), false).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = writer
            .write("GeoIP2-City", stream(CONTENT), CONTENT_MD5, last_modified(), &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!temp_dir.path().join("GeoIP2-City.mmdb").exists());
        assert!(!temp_dir.path().join("GeoIP2-City.mmdb.temporary").exists());
    }

    #[test]
    fn test_missing_directory_is_local_io() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path().join("absent"), false).unwrap();

        let err = writer
            .write(
                "GeoIP2-City",
                stream(CONTENT),
                CONTENT_MD5,
                last_modified(),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, UpdateError::LocalIo { .. }));
        assert!(err.is_permanent());
    }

    #[test]
    fn test_preserve_file_times() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LocalFileWriter::new(temp_dir.path(), true).unwrap();

        writer
            .write(
                "GeoIP2-City",
                stream(CONTENT),
                CONTENT_MD5,
                last_modified(),
                &CancellationToken::new(),
            )
            .unwrap();

        let modified = fs::metadata(temp_dir.path().join("GeoIP2-City.mmdb"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(DateTime::<Utc>::from(modified), last_modified());
    }

    #[test]
    fn test_new_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("parent").join("GeoIP");
        let writer = LocalFileWriter::new(&dir, false).unwrap();
        assert!(dir.parent().unwrap().is_dir());
        assert!(!dir.exists());
        assert_eq!(writer.dir(), dir.as_path());
    }
}
