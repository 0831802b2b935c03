//! Fetching result records to local files.
//!
//! # Features
//!
//! - Destination templates with record fields (`/data/{instrument}/{file}`)
//! - Collision avoidance by numeric suffix (`a.fits` → `a_1.fits`)
//! - Deferred destinations computed after the bytes arrive
//! - Concurrent, best-effort downloads with per-task outcomes
//! - Pluggable [`Transport`], with streaming [`HttpTransport`] as the default
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dataretriever::download::{
//!     DestinationPath, DownloadOrchestrator, DownloadTask, HttpTransport,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new()?);
//! let orchestrator = DownloadOrchestrator::new(transport, Some(4), "./data");
//! let task = DownloadTask::new(
//!     "https://example.com/img.fits",
//!     DestinationPath::Immediate("./data/img.fits".into()),
//! );
//! let results = orchestrator.submit(vec![task], None)?.wait().await;
//! println!("Downloaded: {:?}", results.paths());
//! # Ok(())
//! # }
//! ```

mod constants;
mod error;
mod orchestrator;
mod path;
mod template;
mod transport;

pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::{DownloadError, FetchError, PathError};
pub use orchestrator::{
    CompletedDownload, DownloadOrchestrator, DownloadTask, ErrorCallback, FailedDownload,
    FetchHandle, FetchResults, TaskState,
};
pub use path::{
    DeferredPathFn, DestinationPath, DownloadContext, PathResolver, expand_user,
    filename_from_url, replacement_filename,
};
pub use template::{TemplateValue, render_template};
pub use transport::{HttpTransport, TransferReport, Transport};
