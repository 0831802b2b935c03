//! Error types for the download module.
//!
//! Three layers fail differently:
//! - [`PathError`] - destination computation; raised before any download starts
//! - [`FetchError`] - batch submission; raised synchronously by `fetch`
//! - [`DownloadError`] - one transfer; recorded per task, never returned from `fetch`

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while transferring one locator.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, rename, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The locator is not a valid absolute URL.
    #[error("invalid URL: {url}\n  Suggestion: locators must be absolute URLs such as https://host/file.fits")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// A non-HTTP transport reported a failure.
    #[error("transfer of {url} failed: {reason}")]
    Transport {
        /// The URL being transferred.
        url: String,
        /// Transport-specific description.
        reason: String,
    },

    /// The task ended before reporting an outcome (panic or cancellation).
    #[error("download task for {url} aborted: {reason}")]
    Aborted {
        /// The URL of the aborted task.
        url: String,
        /// Why the task ended.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a transport error for custom [`Transport`](super::Transport) implementations.
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an aborted-task error.
    pub fn aborted(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Aborted {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while computing destination paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// The template names a field the record does not carry.
    #[error(
        "path template '{template}' references unknown field '{field}'\n  Suggestion: use {{file}} or a field present on every record (source, provider, instrument, physobs, time, ...)"
    )]
    MissingTemplateField {
        /// The unknown field.
        field: String,
        /// The template being rendered.
        template: String,
    },

    /// The template is malformed.
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate {
        /// The template being rendered.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `~` path was given but no home directory is known.
    #[error("cannot expand '{path}': home directory is unknown\n  Suggestion: use an absolute path")]
    HomeDirectoryUnavailable {
        /// The path that needed expansion.
        path: String,
    },

    /// The filename list does not line up with the records.
    #[error("got {filenames} filename(s) for {records} record(s)")]
    FilenameCountMismatch {
        /// Number of records.
        records: usize,
        /// Number of filenames.
        filenames: usize,
    },
}

impl PathError {
    /// Creates a `MissingTemplateField` error.
    #[must_use]
    pub fn missing_field(field: &str, template: &str) -> Self {
        Self::MissingTemplateField {
            field: field.to_string(),
            template: template.to_string(),
        }
    }

    /// Creates an `InvalidTemplate` error.
    #[must_use]
    pub fn invalid_template(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised when a batch cannot be submitted at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// `fetch` was called outside a Tokio runtime.
    #[error(
        "no async runtime available to run downloads\n  Suggestion: call fetch from within a Tokio runtime (e.g. #[tokio::main])"
    )]
    RuntimeUnavailable,

    /// Caller-built destinations do not line up with the records.
    #[error("got {destinations} destination(s) for {records} record(s)")]
    DestinationCountMismatch {
        /// Number of records.
        records: usize,
        /// Number of destinations.
        destinations: usize,
    },
}
