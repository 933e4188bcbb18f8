//! Streaming extraction of the database member from a `.tar.gz` download.
//!
//! The archive is never buffered: the gzip decoder pulls from the HTTP body
//! and [`tar::Archive`] walks the headers until the first `.mmdb` member.
//! What remains is a reader over that member's bytes.

use std::fmt;
use std::io::{self, Read};

use flate2::read::GzDecoder;
use log::debug;
use tar::Archive;

use crate::config::DATABASE_EXTENSION;
use crate::error_handling::UpdateError;

/// Reader over the database bytes of a downloaded edition.
///
/// The stream owns the gzip decoder and the HTTP body below it. Dropping it
/// releases both.
pub struct DatabaseStream {
    member_name: String,
    reader: Box<dyn Read + Send>,
}

impl DatabaseStream {
    pub fn new(member_name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            member_name: member_name.into(),
            reader: Box::new(reader),
        }
    }

    /// Name of the archive member being read.
    pub fn member_name(&self) -> &str {
        &self.member_name
    }
}

impl Read for DatabaseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for DatabaseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseStream")
            .field("member_name", &self.member_name)
            .finish_non_exhaustive()
    }
}

/// Decompresses `body` and positions it at the first `.mmdb` member.
///
/// Headers are read eagerly, so a malformed archive or one without a database
/// fails here rather than on the first read.
pub fn open_database<R>(body: R) -> Result<DatabaseStream, UpdateError>
where
    R: Read + Send + 'static,
{
    let mut archive = Archive::new(GzDecoder::new(body));
    let (name, size) = find_database(&mut archive)?;
    debug!("Found {} ({} bytes) in archive", name, size);

    // Entries stop right after the member's header; its data comes next.
    let data = archive.into_inner().take(size);
    Ok(DatabaseStream::new(name, data))
}

/// Walks the archive up to the first regular file named `*.mmdb` and returns
/// its name and size.
fn find_database<R: Read>(archive: &mut Archive<R>) -> Result<(String, u64), UpdateError> {
    for entry in archive.entries().map_err(UpdateError::Archive)? {
        let entry = entry.map_err(UpdateError::Archive)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(UpdateError::Archive)?;
        let name = path.to_string_lossy();
        if name.ends_with(DATABASE_EXTENSION) {
            return Ok((name.into_owned(), entry.size()));
        }
    }
    Err(UpdateError::NoDatabaseInArchive)
}
