//! Temporary file a new database is written to before it is published.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::warn;
use md5::{Digest, Md5};

/// A staging file that hashes everything written to it.
///
/// Unless [`persist`](StagingFile::persist) succeeds, the file is removed when
/// the value is dropped.
pub(crate) struct StagingFile {
    path: PathBuf,
    file: Option<File>,
    hasher: Md5,
}

impl StagingFile {
    /// Creates (or truncates) the file at `path` with mode 0644.
    pub(crate) fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(&path)?;

        Ok(Self {
            path,
            file: Some(file),
            hasher: Md5::new(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase hex MD5 of the bytes written so far.
    pub(crate) fn md5(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    /// Flushes the file to disk, closes it and renames it to `dest`.
    pub(crate) fn persist(mut self, dest: &Path) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        fs::rename(&self.path, dest)?;
        // Renamed away; nothing left to clean up.
        self.path = PathBuf::new();
        Ok(())
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("staging file already closed"))
    }
}

impl Write for StagingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file()?.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.path.as_os_str().is_empty() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Removing temporary file {}: {}", self.path.display(), e),
        }
    }
}
