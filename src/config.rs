//! Client configuration.
//!
//! Everything the library needs to know about its environment arrives through
//! [`ClientConfig`]; nothing is read from process-wide state.

use std::path::{Path, PathBuf};

use crate::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Time format used when records are displayed.
pub const DEFAULT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Settings threaded into [`GenericClient`](crate::GenericClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory used when `fetch` is given no path.
    pub download_dir: PathBuf,
    /// strftime format for displaying record times.
    pub time_format: String,
    /// Upper bound on concurrent downloads; `None` runs all at once.
    pub max_concurrency: Option<usize>,
    /// Where deferred downloads are staged; defaults to `download_dir`.
    pub staging_dir: Option<PathBuf>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_concurrency: None,
            staging_dir: None,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Default configuration with a different download directory.
    #[must_use]
    pub fn with_download_dir(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Self::default()
        }
    }

    /// Directory for staging files of deferred downloads.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        self.staging_dir.as_deref().unwrap_or(&self.download_dir)
    }
}

/// `$HOME/dataretriever/data`, or `./data` when no home directory is known.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from("data"),
        |home| home.join("dataretriever").join("data"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.time_format, DEFAULT_TIME_FORMAT);
        assert_eq!(config.max_concurrency, None);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, 300);
        assert!(config.download_dir.ends_with("data"));
    }

    #[test]
    fn test_staging_dir_falls_back_to_download_dir() {
        let mut config = ClientConfig::with_download_dir("/tmp/dl");
        assert_eq!(config.staging_dir(), Path::new("/tmp/dl"));
        config.staging_dir = Some(PathBuf::from("/tmp/stage"));
        assert_eq!(config.staging_dir(), Path::new("/tmp/stage"));
    }
}
