//! Configuration constants.
//!
//! This module defines the operational parameters of the service: defaults
//! for the CLI, batch sizes, download limits and timeouts.

use std::time::Duration;

/// Default SQLite database path.
pub const DB_PATH: &str = "./geoip.db";

/// Default HTTP listen address.
pub const LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Placeholder replaced by the licence key in the download URL template.
pub const LICENSE_KEY_PLACEHOLDER: char = '@';

/// Environment variable holding the MaxMind licence key.
pub const MAXMIND_LICENSE_KEY_ENV: &str = "MAXMIND_LICENSE_KEY";

/// Default download URL template for the GeoLite2 City CSV archive.
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://download.maxmind.com/app/geoip_download?edition_id=GeoLite2-City-CSV&license_key=@&suffix=zip";

// Storage
/// Rows per multi-row INSERT statement
pub const INSERT_BATCH_SIZE: usize = 1024;
/// Maximum ancestor chain length returned by an address lookup
/// Real data has at most six levels; the limit guards against parent cycles
pub const MAX_ANCESTOR_DEPTH: i64 = 16;
/// Blocks starting at or below an address that a lookup checks for containment
/// Bounds the cost of a miss; nested ranges deeper than this are not seen
pub const LOOKUP_CANDIDATES: i64 = 8;

// Archive download
/// Timeout for the whole archive download
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
/// Connection timeout for the download request
pub const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Download attempts before giving up
pub const DOWNLOAD_MAX_ATTEMPTS: u32 = 3;
/// Base delay for exponential backoff between download attempts (2s, 4s, ...)
pub const DOWNLOAD_BACKOFF_BASE_SECS: u64 = 2;
/// Maximum accepted archive size (1 GiB)
/// The GeoLite2 City CSV archive is around 50MB compressed
pub const MAX_ARCHIVE_SIZE: u64 = 1024 * 1024 * 1024;

// Temporary archive file
/// Name prefix of the temporary archive file
pub const ARCHIVE_TEMP_PREFIX: &str = "maxmind";
/// Name suffix of the temporary archive file
pub const ARCHIVE_TEMP_SUFFIX: &str = ".zip";

/// User agent sent with download requests
pub const USER_AGENT: &str = concat!("geoip_service/", env!("CARGO_PKG_VERSION"));
