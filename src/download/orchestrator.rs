//! Concurrent, best-effort bulk download.
//!
//! [`DownloadOrchestrator::submit`] spawns one Tokio task per locator and
//! returns a [`FetchHandle`] straight away. Each task walks
//! `Pending → InFlight → {Completed | Failed}` independently; a failure never
//! cancels its siblings and there is no retry.
//!
//! # Concurrency Model
//!
//! - A semaphore permit is acquired inside each task, so submission never waits
//! - With no explicit bound there is one permit per task
//! - Outcomes land in a mutex-guarded ledger shared by all tasks
//! - Cancellation is not supported: in-flight tasks always run to completion

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::constants::STAGING_SUFFIX;
use super::error::{DownloadError, FetchError};
use super::path::{DestinationPath, DownloadContext, filename_from_url};
use super::transport::Transport;

/// Called with the error and the locator of each failed download.
///
/// The handler must not panic. If it does, only its own task ends; the
/// failure it was told about is already recorded.
pub type ErrorCallback = Arc<dyn Fn(&DownloadError, &str) + Send + Sync>;

/// Distinguishes staging files of concurrent batches in one process.
static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// One locator and where it should go.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Remote locator.
    pub url: String,
    /// Destination, known now or computed after the download.
    pub destination: DestinationPath,
}

impl DownloadTask {
    /// Creates a task.
    pub fn new(url: impl Into<String>, destination: DestinationPath) -> Self {
        Self {
            url: url.into(),
            destination,
        }
    }
}

/// Lifecycle state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, waiting for a permit.
    Pending,
    /// Transfer in progress.
    InFlight,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// A successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    /// Submission index (matches the record index).
    pub index: usize,
    /// Remote locator.
    pub url: String,
    /// Final local path.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// A failed download.
#[derive(Debug, Clone)]
pub struct FailedDownload {
    /// Submission index (matches the record index).
    pub index: usize,
    /// Remote locator.
    pub url: String,
    /// What went wrong.
    pub error: Arc<DownloadError>,
}

/// Outcomes of a batch, each list sorted by submission index.
#[derive(Debug, Clone, Default)]
pub struct FetchResults {
    /// Successful downloads.
    pub succeeded: Vec<CompletedDownload>,
    /// Failed downloads.
    pub failed: Vec<FailedDownload>,
}

impl FetchResults {
    /// Local paths of successful downloads, by submission index.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.succeeded.iter().map(|d| d.path.as_path()).collect()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
struct Ledger {
    states: Vec<TaskState>,
    succeeded: Vec<CompletedDownload>,
    failed: Vec<FailedDownload>,
}

impl Ledger {
    fn new(task_count: usize) -> Self {
        Self {
            states: vec![TaskState::Pending; task_count],
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn snapshot(&self) -> FetchResults {
        let mut results = FetchResults {
            succeeded: self.succeeded.clone(),
            failed: self.failed.clone(),
        };
        results.succeeded.sort_by_key(|d| d.index);
        results.failed.sort_by_key(|d| d.index);
        results
    }
}

type SharedLedger = Arc<Mutex<Ledger>>;

fn lock(ledger: &SharedLedger) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to an in-flight batch.
#[derive(Debug)]
pub struct FetchHandle {
    ledger: SharedLedger,
    tasks: Vec<(usize, String, JoinHandle<()>)>,
}

impl FetchHandle {
    /// Number of tasks in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the batch has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns true once every task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|(_, _, handle)| handle.is_finished())
    }

    /// Downloads completed so far.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        lock(&self.ledger).succeeded.len()
    }

    /// Downloads failed so far.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        lock(&self.ledger).failed.len()
    }

    /// Current state of the task at `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<TaskState> {
        lock(&self.ledger).states.get(index).copied()
    }

    /// Outcomes recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> FetchResults {
        lock(&self.ledger).snapshot()
    }

    /// Waits for every task and returns the final outcomes.
    ///
    /// A task that died before recording an outcome is reported as
    /// [`DownloadError::Aborted`].
    pub async fn wait(self) -> FetchResults {
        for (index, url, handle) in self.tasks {
            if let Err(join_error) = handle.await {
                warn!(index, url = %url, error = %join_error, "download task ended abnormally");
                let mut ledger = lock(&self.ledger);
                if matches!(
                    ledger.states.get(index),
                    Some(TaskState::Pending | TaskState::InFlight)
                ) {
                    ledger.states[index] = TaskState::Failed;
                    ledger.failed.push(FailedDownload {
                        index,
                        error: Arc::new(DownloadError::aborted(&url, join_error.to_string())),
                        url,
                    });
                }
            }
        }
        let results = lock(&self.ledger).snapshot();
        info!(
            completed = results.succeeded.len(),
            failed = results.failed.len(),
            "batch finished"
        );
        results
    }
}

/// Drives concurrent downloads through a [`Transport`].
#[derive(Clone)]
pub struct DownloadOrchestrator {
    transport: Arc<dyn Transport>,
    max_concurrency: Option<usize>,
    staging_dir: PathBuf,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("max_concurrency", &self.max_concurrency)
            .field("staging_dir", &self.staging_dir)
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    /// Creates an orchestrator.
    ///
    /// `max_concurrency` of `None` runs every task at once; `Some(n)` keeps at
    /// most `n` transfers in flight. Deferred destinations are staged in
    /// `staging_dir`.
    pub fn new(
        transport: Arc<dyn Transport>,
        max_concurrency: Option<usize>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            max_concurrency,
            staging_dir: staging_dir.into(),
        }
    }

    /// Configured concurrency bound.
    #[must_use]
    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }

    /// Starts every task and returns without waiting for them.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RuntimeUnavailable`] when called outside a Tokio
    /// runtime; no task is started in that case.
    #[instrument(skip_all, fields(tasks = tasks.len(), max_concurrency = ?self.max_concurrency))]
    pub fn submit(
        &self,
        tasks: Vec<DownloadTask>,
        error_callback: Option<ErrorCallback>,
    ) -> Result<FetchHandle, FetchError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| FetchError::RuntimeUnavailable)?;

        let permits = self.max_concurrency.unwrap_or(tasks.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let ledger: SharedLedger = Arc::new(Mutex::new(Ledger::new(tasks.len())));
        let batch = STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed);

        info!(permits, "submitting downloads");

        let handles = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| {
                let url = task.url.clone();
                let worker = Worker {
                    index,
                    task,
                    transport: Arc::clone(&self.transport),
                    ledger: Arc::clone(&ledger),
                    staging_dir: self.staging_dir.clone(),
                    batch,
                    error_callback: error_callback.clone(),
                };
                let semaphore = Arc::clone(&semaphore);
                let handle = runtime.spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        worker.fail(DownloadError::aborted(&worker.task.url, "semaphore closed"));
                        return;
                    };
                    worker.run().await;
                });
                (index, url, handle)
            })
            .collect();

        Ok(FetchHandle {
            ledger,
            tasks: handles,
        })
    }
}

/// Everything one spawned task owns.
struct Worker {
    index: usize,
    task: DownloadTask,
    transport: Arc<dyn Transport>,
    ledger: SharedLedger,
    staging_dir: PathBuf,
    batch: u64,
    error_callback: Option<ErrorCallback>,
}

impl Worker {
    async fn run(self) {
        self.set_state(TaskState::InFlight);
        debug!(index = self.index, url = %self.task.url, "download started");

        match self.transfer().await {
            Ok((path, bytes)) => {
                info!(index = self.index, path = %path.display(), bytes, "download completed");
                let mut ledger = lock(&self.ledger);
                ledger.states[self.index] = TaskState::Completed;
                ledger.succeeded.push(CompletedDownload {
                    index: self.index,
                    url: self.task.url.clone(),
                    path,
                    bytes,
                });
            }
            Err(error) => self.fail(error),
        }
    }

    /// Records the failure, then tells the caller's handler.
    fn fail(&self, error: DownloadError) {
        warn!(index = self.index, url = %self.task.url, error = %error, "download failed");
        let error = Arc::new(error);
        {
            let mut ledger = lock(&self.ledger);
            ledger.states[self.index] = TaskState::Failed;
            ledger.failed.push(FailedDownload {
                index: self.index,
                url: self.task.url.clone(),
                error: Arc::clone(&error),
            });
        }
        if let Some(callback) = &self.error_callback {
            callback(&error, &self.task.url);
        }
    }

    fn set_state(&self, state: TaskState) {
        lock(&self.ledger).states[self.index] = state;
    }

    async fn transfer(&self) -> Result<(PathBuf, u64), DownloadError> {
        let url = self.task.url.as_str();
        match &self.task.destination {
            DestinationPath::Immediate(path) => {
                let report = self.transport.download(url, path).await?;
                Ok((path.clone(), report.bytes))
            }
            DestinationPath::Deferred(resolve) => {
                let staged = self.staging_path();
                let report = self.transport.download(url, &staged).await?;
                let context = DownloadContext {
                    url: url.to_string(),
                    staged_path: staged.clone(),
                    bytes: report.bytes,
                    content_type: report.content_type,
                    suggested_filename: report.suggested_filename,
                };
                let resolved = std::panic::catch_unwind(AssertUnwindSafe(|| resolve(&context)));
                let Ok(final_path) = resolved else {
                    let _ = tokio::fs::remove_file(&staged).await;
                    return Err(DownloadError::aborted(url, "deferred path function panicked"));
                };
                debug!(
                    staged = %staged.display(),
                    path = %final_path.display(),
                    "deferred path resolved"
                );

                if let Err(error) = move_into_place(&staged, &final_path).await {
                    let _ = tokio::fs::remove_file(&staged).await;
                    return Err(error);
                }
                Ok((final_path, context.bytes))
            }
        }
    }

    fn staging_path(&self) -> PathBuf {
        let filename = filename_from_url(&self.task.url);
        self.staging_dir.join(format!(
            ".{}-{}-{}-{filename}{STAGING_SUFFIX}",
            std::process::id(),
            self.batch,
            self.index
        ))
    }
}

/// Renames `from` to `to`, copying when they sit on different filesystems.
async fn move_into_place(from: &Path, to: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = to.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| DownloadError::io(to, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| DownloadError::io(from, e))
}
