//! Constants for the download module (timeouts).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout for one asset download (5 minutes for large files).
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
