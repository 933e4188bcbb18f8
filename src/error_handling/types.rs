//! Error type definitions.
//!
//! This module defines every error the updater can produce, plus the
//! [`ErrorCategory`] used to decide whether a failure is worth retrying.

use std::io;
use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;

use crate::config::MAX_ERROR_BODY_BYTES;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Broad classes of failure, used for retry decisions and log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorCategory {
    /// Invalid configuration or an unmet precondition.
    Configuration,
    /// Another process holds the lock.
    Contention,
    /// Network failures, 5xx, corrupt or truncated payloads.
    TransportTransient,
    /// 4xx responses.
    TransportPermanent,
    /// Local filesystem failures.
    LocalIo,
    /// The run was cancelled, usually by a failing sibling job.
    Cancellation,
}

/// A non-200 response from the update service.
///
/// `body` holds at most [`MAX_ERROR_BODY_BYTES`] of the response for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("received HTTP status code: {status}: {body}")]
pub struct HttpError {
    pub status: u16,
    pub body: String,
}

impl HttpError {
    /// Builds an error from a status and the (possibly longer) body bytes.
    pub fn new(status: u16, body: &[u8]) -> Self {
        let excerpt = &body[..body.len().min(MAX_ERROR_BODY_BYTES)];
        Self {
            status,
            body: String::from_utf8_lossy(excerpt).into_owned(),
        }
    }

    /// 4xx responses will not change on retry.
    pub fn is_permanent(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Errors from the process-wide file lock.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("creating lock file directory {}: {err}", path.display())]
    CreateDir { path: PathBuf, err: io::Error },

    #[error("opening lock file {}: {err}", path.display())]
    Open { path: PathBuf, err: io::Error },

    #[error("lock {} already acquired by another process", .0.display())]
    Busy(PathBuf),

    #[error("acquiring file lock at {}: {err}", path.display())]
    Acquire { path: PathBuf, err: nix::errno::Errno },

    #[error("releasing file lock at {}: {err}", path.display())]
    Release { path: PathBuf, err: nix::errno::Errno },
}

/// Errors raised while assembling a [`Config`](crate::Config).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error opening file {}: {err}", path.display())]
    OpenFile { path: PathBuf, err: io::Error },

    #[error("invalid format on line {0}")]
    InvalidLine(usize),

    #[error("`{0}' is in the config multiple times")]
    DuplicateKey(String),

    #[error("unknown option on line {0}")]
    UnknownOption(usize),

    #[error("invalid account ID format")]
    InvalidAccountId,

    #[error("failed to open {name}: {err}")]
    SecretFile { name: &'static str, err: io::Error },

    #[error("`{0}' must be 0 or 1")]
    InvalidFlag(&'static str),

    #[error("'{0}' is not a valid duration")]
    InvalidDuration(String),

    #[error("parallelism should be greater than 0, got '{0}'")]
    InvalidParallelism(String),

    #[error("failed to parse {name}: {err}")]
    InvalidUrl {
        name: &'static str,
        err: url::ParseError,
    },

    #[error("unsupported proxy type: {0}")]
    UnsupportedProxy(String),

    #[error("proxy user/password is malformed")]
    MalformedProxyCredentials,

    #[error("geoipupdate requires a valid AccountID and LicenseKey combination")]
    LegacyCredentials,

    #[error("the `{0}' option is required")]
    Missing(&'static str),

    #[error("invalid license key")]
    InvalidLicenseKey,
}

/// Errors produced while updating editions.
///
/// Wrapping variants embed the inner message in their own text so log lines
/// read as a single chain, e.g. `GeoIP2-City: unexpected HTTP status code: ...`.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("unexpected HTTP status code: {0}")]
    Http(HttpError),

    #[error("performing {what} request: {err}")]
    Network { what: &'static str, err: ReqwestError },

    #[error("parsing metadata body: {0}")]
    MetadataDecode(serde_json::Error),

    #[error("response does not contain edition {0}")]
    MissingEdition(String),

    #[error("invalid release date '{0}' in metadata")]
    InvalidReleaseDate(String),

    #[error("reading download archive: {0}")]
    Archive(io::Error),

    #[error("tar archive does not contain an mmdb file")]
    NoDatabaseInArchive,

    #[error("reading Last-Modified header: {0}")]
    LastModified(String),

    #[error("md5 of new database ({actual}) does not match expected md5 ({expected})")]
    HashMismatch { expected: String, actual: String },

    #[error("{context}: {err}")]
    LocalIo { context: String, err: io::Error },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error("processing canceled")]
    Cancelled,

    #[error("job terminated abnormally: {0}")]
    JobPanicked(String),

    #[error("{edition}: {err}")]
    Edition {
        edition: String,
        err: Box<UpdateError>,
    },
}

impl From<HttpError> for UpdateError {
    fn from(err: HttpError) -> Self {
        UpdateError::Http(err)
    }
}

impl UpdateError {
    /// Wraps a local filesystem error with a description of the failed step.
    pub fn local_io(context: impl Into<String>, err: io::Error) -> Self {
        UpdateError::LocalIo {
            context: context.into(),
            err,
        }
    }

    /// Tags the error with the edition it belongs to.
    pub fn for_edition(self, edition: &str) -> Self {
        match self {
            // Already tagged, or not edition specific.
            UpdateError::Edition { .. } | UpdateError::Cancelled => self,
            err => UpdateError::Edition {
                edition: edition.to_string(),
                err: Box::new(err),
            },
        }
    }

    /// Returns the error with any edition tag removed.
    pub fn root(&self) -> &UpdateError {
        match self {
            UpdateError::Edition { err, .. } => err.root(),
            err => err,
        }
    }

    /// The HTTP error carried by this error, if any.
    pub fn http_error(&self) -> Option<&HttpError> {
        match self.root() {
            UpdateError::Http(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), UpdateError::Cancelled)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            UpdateError::Http(err) if err.is_permanent() => ErrorCategory::TransportPermanent,
            UpdateError::Http(_)
            | UpdateError::Network { .. }
            | UpdateError::MetadataDecode(_)
            | UpdateError::MissingEdition(_)
            | UpdateError::InvalidReleaseDate(_)
            | UpdateError::Archive(_)
            | UpdateError::NoDatabaseInArchive
            | UpdateError::LastModified(_)
            | UpdateError::HashMismatch { .. } => ErrorCategory::TransportTransient,
            UpdateError::LocalIo { .. } | UpdateError::JobPanicked(_) => ErrorCategory::LocalIo,
            UpdateError::Lock(LockError::Busy(_)) => ErrorCategory::Contention,
            UpdateError::Lock(_) | UpdateError::Config(_) | UpdateError::Initialization(_) => {
                ErrorCategory::Configuration
            }
            UpdateError::Cancelled => ErrorCategory::Cancellation,
            UpdateError::Edition { err, .. } => err.category(),
        }
    }

    /// Whether retrying the failed operation is pointless.
    ///
    /// Only transient transport failures are retried; everything else,
    /// cancellation included, ends the retry loop.
    pub fn is_permanent(&self) -> bool {
        self.category() != ErrorCategory::TransportTransient
    }
}
