//! Configuration constants.
//!
//! This module defines the defaults and fixed parameters used throughout the
//! updater: endpoints, on-disk naming, retry tuning and size limits.

use std::time::Duration;

/// Default update server.
pub const DEFAULT_URL: &str = "https://updates.maxmind.com";

/// Default configuration file, read only when it exists.
pub const DEFAULT_CONFIG_FILE: &str = "/usr/local/etc/GeoIP.conf";

/// Default directory holding the `.mmdb` files.
pub const DEFAULT_DATABASE_DIRECTORY: &str = "/usr/local/share/GeoIP";

/// Lock file name, created inside the database directory unless `LockFile` is set.
pub const LOCK_FILE_NAME: &str = ".geoipupdate.lock";

/// How long transient failures are retried per edition.
pub const DEFAULT_RETRY_FOR: Duration = Duration::from_secs(5 * 60);

/// Number of editions processed concurrently by default.
pub const DEFAULT_PARALLELISM: usize = 1;

/// Port appended to proxy hosts that do not name one (historical cURL default).
pub const DEFAULT_PROXY_PORT: u16 = 1080;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("geoipupdate/", env!("CARGO_PKG_VERSION"));

// On-disk layout
pub const DATABASE_EXTENSION: &str = ".mmdb";
pub const TEMP_EXTENSION: &str = ".temporary";

/// Fingerprint reported for an edition that has no local file.
pub const ZERO_MD5: &str = "00000000000000000000000000000000";

// Response and body size limits
/// Maximum number of response body bytes kept in an HTTP error for diagnostics.
pub const MAX_ERROR_BODY_BYTES: usize = 256;

/// Buffer size used when streaming a database into its staging file.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

// Network operation timeouts
/// TCP connection timeout in seconds.
/// Downloads themselves are not bounded; large editions can take minutes.
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 30;

// Retry strategy
/// Initial delay in milliseconds before the first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: f64 = 2.0;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 60;
/// Lower bound of the jitter multiplier applied to each delay.
/// Kept above `1 / RETRY_FACTOR` so jittered delays never shrink before the cap.
pub const RETRY_JITTER_MIN: f64 = 0.75;
