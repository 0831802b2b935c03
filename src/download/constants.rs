//! Constants for the download module (timeouts, renaming, staging).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Numeric suffixes tried before falling back to a timestamp suffix.
pub const MAX_RENAME_ATTEMPTS: usize = 1000;

/// Extension of in-progress files for deferred destinations.
pub const STAGING_SUFFIX: &str = ".part";

/// Placeholder substituted with the locator's file name.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Template field holding the locator's file name.
pub const FILE_FIELD: &str = "file";

/// Name used when a locator has no usable last segment.
pub const FALLBACK_FILENAME: &str = "download.bin";
