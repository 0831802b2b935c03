//! Destination path computation for fetched records.
//!
//! [`PathResolver`] turns a base path or template plus one file name per record
//! into one [`DestinationPath`] per record. Paths that already exist are
//! renamed with a numeric suffix. The existence check is not atomic with the
//! later download: another process writing into the same directory between
//! resolution and transfer can still collide.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use super::constants::{FALLBACK_FILENAME, FILE_FIELD, FILE_PLACEHOLDER, MAX_RENAME_ATTEMPTS};
use super::error::PathError;
use super::template::{TemplateValue, references_field, render_template};
use crate::query::{DescriptorValue, ScalarValue};
use crate::response::{ResultRecord, ResultSet};

/// What a deferred destination sees once its download has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadContext {
    /// The locator that was downloaded.
    pub url: String,
    /// Where the bytes currently are.
    pub staged_path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
    /// `Content-Type` reported by the server, if any.
    pub content_type: Option<String>,
    /// File name from `Content-Disposition`, if any.
    pub suggested_filename: Option<String>,
}

/// Computes a final path from a finished download.
///
/// A panic inside the function fails that download: the staged file is
/// removed and the task records an aborted error.
pub type DeferredPathFn = Arc<dyn Fn(&DownloadContext) -> PathBuf + Send + Sync>;

/// Where a download should land.
#[derive(Clone)]
pub enum DestinationPath {
    /// Known before the download starts.
    Immediate(PathBuf),
    /// Computed after the download completes.
    Deferred(DeferredPathFn),
}

impl DestinationPath {
    /// Wraps a closure as a deferred destination.
    pub fn deferred<F>(resolve: F) -> Self
    where
        F: Fn(&DownloadContext) -> PathBuf + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(resolve))
    }

    /// The path, when known up front.
    #[must_use]
    pub fn as_immediate(&self) -> Option<&Path> {
        match self {
            Self::Immediate(path) => Some(path),
            Self::Deferred(_) => None,
        }
    }
}

impl From<PathBuf> for DestinationPath {
    fn from(path: PathBuf) -> Self {
        Self::Immediate(path)
    }
}

impl fmt::Debug for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(path) => f.debug_tuple("Immediate").field(path).finish(),
            Self::Deferred(_) => f.write_str("Deferred(<fn>)"),
        }
    }
}

/// Resolves destination paths for records.
#[derive(Debug, Clone)]
pub struct PathResolver {
    default_dir: PathBuf,
}

impl PathResolver {
    /// Creates a resolver that falls back to `default_dir`.
    #[must_use]
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }

    /// The directory used when no base path is given.
    #[must_use]
    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    /// Turns an optional base path into a template containing `{file}`.
    ///
    /// - `None` → `<default_dir>/{file}`
    /// - a path with an unescaped `{file}` placeholder → unchanged
    /// - any other path → treated as a directory, `<path>/{file}`
    #[must_use]
    pub fn format_template(&self, base_path: Option<&str>) -> String {
        match base_path {
            None => {
                let dir = escape_braces(&self.default_dir.to_string_lossy());
                join_placeholder(&dir)
            }
            Some(path) if references_field(path, FILE_FIELD) => path.to_string(),
            Some(path) => join_placeholder(path),
        }
    }

    /// Resolves one destination per record, in record order.
    ///
    /// # Errors
    ///
    /// - [`PathError::FilenameCountMismatch`] if `filenames` and `records` differ in length.
    /// - [`PathError::MissingTemplateField`] / [`PathError::InvalidTemplate`] from rendering.
    /// - [`PathError::HomeDirectoryUnavailable`] if `~` cannot be expanded.
    ///
    /// The first failing record aborts resolution; no partial result is returned.
    #[instrument(skip(self, records, filenames), fields(records = records.len()))]
    pub fn resolve(
        &self,
        records: &ResultSet,
        filenames: &[String],
        base_path: Option<&str>,
    ) -> Result<Vec<DestinationPath>, PathError> {
        if records.len() != filenames.len() {
            return Err(PathError::FilenameCountMismatch {
                records: records.len(),
                filenames: filenames.len(),
            });
        }

        let template = self.format_template(base_path);
        debug!(template = %template, "resolving destination paths");

        records
            .iter()
            .zip(filenames)
            .map(|(record, file)| {
                let rendered =
                    render_template(&template, |name| record_value(record, file, name))?;
                let path = expand_user(&rendered)?;
                Ok::<_, PathError>(DestinationPath::Immediate(replacement_filename(&path)))
            })
            .collect()
    }
}

fn join_placeholder(dir: &str) -> String {
    if dir.is_empty() {
        FILE_PLACEHOLDER.to_string()
    } else if dir.ends_with(std::path::MAIN_SEPARATOR) || dir.ends_with('/') {
        format!("{dir}{FILE_PLACEHOLDER}")
    } else {
        format!("{dir}{}{FILE_PLACEHOLDER}", std::path::MAIN_SEPARATOR)
    }
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Resolves a template field against one record.
///
/// Record-level properties come first, then the record's descriptor entries.
fn record_value<'a>(
    record: &'a ResultRecord,
    file: &'a str,
    name: &str,
) -> Option<TemplateValue<'a>> {
    let text = |value: &'a str| Some(TemplateValue::Text(Cow::Borrowed(value)));
    match name {
        "file" => text(file),
        "source" => text(&record.source),
        "provider" => text(&record.provider),
        "physobs" => text(&record.physobs),
        "instrument" => text(&record.instrument),
        "url" => text(&record.url),
        "time" => Some(TemplateValue::Interval(record.time)),
        _ => record.fields.get(name).map(|value| match value {
            DescriptorValue::Scalar(ScalarValue::Instant(at)) => TemplateValue::Instant(*at),
            DescriptorValue::Scalar(scalar) => {
                TemplateValue::Text(Cow::Owned(scalar.to_string()))
            }
            DescriptorValue::Range(range) => TemplateValue::Range(range),
            DescriptorValue::Time(range) => TemplateValue::Interval(*range),
        }),
    }
}

/// Expands a leading `~` to the home directory.
///
/// # Errors
///
/// Returns [`PathError::HomeDirectoryUnavailable`] if the path starts with
/// `~` and no home directory can be determined.
pub fn expand_user(path: &str) -> Result<PathBuf, PathError> {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return Ok(PathBuf::from(path));
    };

    let home = dirs::home_dir().ok_or_else(|| PathError::HomeDirectoryUnavailable {
        path: path.to_string(),
    })?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

/// Returns `path`, or the first free `stem_N.ext` sibling if `path` exists.
///
/// Candidates run `_1` to `_999`; after that a timestamp suffix is used,
/// itself followed by `_N` until a free name turns up.
#[must_use]
pub fn replacement_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let filename = path.file_name().map_or_else(
        || FALLBACK_FILENAME.to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    // A leading dot is part of the stem, not an extension separator.
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    let numbered = (1..MAX_RENAME_ATTEMPTS).map(|i| format!("{stem}_{i}{ext}"));
    let timestamp = chrono::Utc::now().timestamp();
    let stamped = std::iter::once(format!("{stem}_{timestamp}{ext}"))
        .chain((1..).map(|i| format!("{stem}_{timestamp}_{i}{ext}")));

    numbered
        .chain(stamped)
        .map(|name| dir.join(name))
        .find(|candidate| !candidate.exists())
        .map_or_else(
            || path.to_path_buf(),
            |candidate| {
                debug!(
                    original = %path.display(),
                    renamed = %candidate.display(),
                    "destination exists, renamed"
                );
                candidate
            },
        )
}

/// Derives a file name from a locator's last path segment.
///
/// The segment is percent-decoded and sanitized. Locators that are not URLs
/// fall back to the text after the last `/`.
#[must_use]
pub fn filename_from_url(locator: &str) -> String {
    let segment = match Url::parse(locator) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => locator.rsplit('/').next().unwrap_or_default().to_string(),
    };
    if segment.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    let decoded = urlencoding::decode(&segment).unwrap_or_else(|e| {
        debug!(segment = %segment, error = %e, "URL decoding failed, using raw segment");
        Cow::Borrowed(segment.as_str())
    });
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Replaces characters that are invalid on common filesystems.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match sanitized.as_str() {
        "" => "_".to_string(),
        "." | ".." => sanitized.replace('.', "_"),
        _ => sanitized,
    }
}
