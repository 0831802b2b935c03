//! Transfer of a single locator to a local file.
//!
//! The orchestrator only knows [`Transport`]; [`HttpTransport`] is the stock
//! implementation for `http`/`https` locators.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::path::sanitize_filename;

/// Default User-Agent sent with every request.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// What a finished transfer reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes written to the destination.
    pub bytes: u64,
    /// `Content-Type` of the response, if any.
    pub content_type: Option<String>,
    /// File name from `Content-Disposition`, if any.
    pub suggested_filename: Option<String>,
}

/// Moves the bytes behind one locator into a local file.
///
/// Implementations write exactly to `destination` (creating parent
/// directories as needed) and leave no partial file behind on error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Downloads `url` into `destination`.
    async fn download(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<TransferReport, DownloadError>;
}

/// HTTP transport with streaming downloads.
///
/// Created once and shared across tasks to reuse pooled connections.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with the default timeouts (30 s connect, 5 min read).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeouts in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self { client })
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self), fields(url = %url, destination = %destination.display()))]
    async fn download(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<TransferReport, DownloadError> {
        debug!("starting download");

        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let response = self.send_request(url).await?;
        let content_type = header_text(&response, CONTENT_TYPE);
        let suggested_filename = header_text(&response, CONTENT_DISPOSITION)
            .as_deref()
            .and_then(parse_content_disposition)
            .map(|name| sanitize_filename(&name));

        let mut file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        let stream_result = stream_to_file(&mut file, response, url, destination).await;
        if stream_result.is_err() {
            debug!(path = %destination.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(destination).await;
        }
        let bytes = stream_result?;

        info!(path = %destination.display(), bytes, "download complete");
        Ok(TransferReport {
            bytes,
            content_type,
            suggested_filename,
        })
    }
}

fn header_text(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

/// Extracts the file name from a `Content-Disposition` header.
///
/// Handles `filename="x"`, `filename=x` and RFC 5987 `filename*=UTF-8''x`;
/// the encoded form wins when both are present.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        return stripped.find('"').map(|end| stripped[..end].to_string());
    }
    let end = value.find(';').unwrap_or(value.len());
    let filename = value[..end].trim();
    (!filename.is_empty()).then(|| filename.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_content_disposition_variants() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"img.fits\""),
            Some("img.fits".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=img.fits; size=3"),
            Some("img.fits".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''my%20img.fits"),
            Some("my img.fits".to_string())
        );
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[tokio::test]
    async fn test_http_transport_streams_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/a.fits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"SIMPLE  =".to_vec())
                    .insert_header("content-type", "application/fits")
                    .insert_header("content-disposition", "attachment; filename=\"real.fits\""),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("nested").join("a.fits");
        let transport = HttpTransport::new().unwrap();
        let report = transport
            .download(&format!("{}/data/a.fits", server.uri()), &destination)
            .await
            .unwrap();

        assert_eq!(report.bytes, 9);
        assert_eq!(report.content_type.as_deref(), Some("application/fits"));
        assert_eq!(report.suggested_filename.as_deref(), Some("real.fits"));
        assert_eq!(std::fs::read(&destination).unwrap(), b"SIMPLE  =");
    }

    #[tokio::test]
    async fn test_http_transport_maps_status_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("missing.fits");
        let transport = HttpTransport::new().unwrap();
        let err = transport
            .download(&format!("{}/missing.fits", server.uri()), &destination)
            .await
            .unwrap_err();

        assert!(
            matches!(err, DownloadError::HttpStatus { status: 404, .. }),
            "unexpected error: {err}"
        );
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_http_transport_rejects_invalid_url() {
        let dir = TempDir::new().unwrap();
        let transport = HttpTransport::new().unwrap();
        let err = transport
            .download("not a url", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));

        let err = transport
            .download("file:///etc/hosts", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }
}
