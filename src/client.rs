//! Search-and-fetch façade over one resolution strategy.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dataretriever::attrs::{Attr, Instrument, Time};
//! use dataretriever::strategy::PatternStrategy;
//! use dataretriever::query::DescriptorValue;
//! use dataretriever::{ClientConfig, GenericClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let strategy = PatternStrategy::new("https://archive.example.com/%Y/%m/%d/eve_%Y%m%d.fits")?
//!     .with_field("instrument", DescriptorValue::text("EVE"));
//! let client = GenericClient::new(Arc::new(strategy), ClientConfig::default())?;
//!
//! let query: Vec<Box<dyn Attr>> = vec![
//!     Box::new(Time::parse("2020-01-01", "2020-01-03")?),
//!     Box::new(Instrument::new("EVE")),
//! ];
//! let records = client.search(&query).await?;
//! let results = client.fetch(&records, None, None)?.wait().await;
//! println!("{} downloaded, {} failed", results.succeeded.len(), results.failed.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::attrs::Attr;
use crate::config::ClientConfig;
use crate::download::{
    DestinationPath, DownloadError, DownloadOrchestrator, DownloadTask, ErrorCallback, FetchError,
    FetchHandle, HttpTransport, PathError, PathResolver, Transport, filename_from_url,
};
use crate::query::{AttributeMapper, QueryError, RequestDescriptor};
use crate::response::{ResultSet, ResultSetError};
use crate::strategy::{ResolutionStrategy, StrategyError};

/// Errors surfaced synchronously by [`GenericClient`].
///
/// Per-download failures are not here; they are reported through the
/// [`FetchHandle`] and the error callback.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The query could not be turned into a descriptor.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// The strategy failed to resolve the descriptor.
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    /// The result set could not be built.
    #[error("result error: {0}")]
    ResultSet(#[from] ResultSetError),

    /// A destination path could not be computed.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// The download batch could not be submitted.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The download transport could not be created.
    #[error("transport error: {0}")]
    Transport(#[from] DownloadError),
}

/// A client bound to one [`ResolutionStrategy`].
#[derive(Clone)]
pub struct GenericClient {
    strategy: Arc<dyn ResolutionStrategy>,
    config: ClientConfig,
    paths: PathResolver,
    orchestrator: DownloadOrchestrator,
}

impl std::fmt::Debug for GenericClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericClient")
            .field("strategy", &self.strategy.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenericClient {
    /// Creates a client downloading over HTTP with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        strategy: Arc<dyn ResolutionStrategy>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let transport =
            HttpTransport::with_timeouts(config.connect_timeout_secs, config.read_timeout_secs)?;
        Ok(Self::with_transport(strategy, config, Arc::new(transport)))
    }

    /// Creates a client with a caller-supplied transport.
    #[must_use]
    pub fn with_transport(
        strategy: Arc<dyn ResolutionStrategy>,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let paths = PathResolver::new(config.download_dir.clone());
        let orchestrator =
            DownloadOrchestrator::new(transport, config.max_concurrency, config.staging_dir());
        Self {
            strategy,
            config,
            paths,
            orchestrator,
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The strategy this client resolves through.
    #[must_use]
    pub fn strategy(&self) -> &dyn ResolutionStrategy {
        self.strategy.as_ref()
    }

    /// Maps `attrs` and merges the strategy's a-priori fields over them.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Query`] for unsupported constraints.
    pub fn build_descriptor(
        &self,
        attrs: &[Box<dyn Attr>],
    ) -> Result<RequestDescriptor, ClientError> {
        let mut descriptor = AttributeMapper::build(attrs)?;
        for (key, value) in self.strategy.static_fields() {
            descriptor.insert(key, value);
        }
        Ok(descriptor)
    }

    /// Resolves a query into records, one per locator, in resolution order.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Query`] for unsupported constraints
    /// - [`ClientError::Strategy`] if resolution fails
    /// - [`ClientError::ResultSet`] if records cannot be built (no time
    ///   interval, or per-locator times that do not line up)
    #[instrument(
        skip(self, attrs),
        fields(strategy = self.strategy.name(), attr_count = attrs.len())
    )]
    pub async fn search(&self, attrs: &[Box<dyn Attr>]) -> Result<ResultSet, ClientError> {
        let descriptor = self.build_descriptor(attrs)?;
        let time = descriptor.time_range();
        let locators = self.strategy.resolve(time.as_ref(), &descriptor).await?;
        debug!(locators = locators.len(), "strategy resolved locators");

        let times = if locators.is_empty() {
            None
        } else {
            self.strategy
                .time_for_locators(&locators)
                .filter(|times| !times.is_empty())
        };

        let records = ResultSet::create(&descriptor, locators, times)?;
        info!(records = records.len(), "search complete");
        Ok(records)
    }

    /// Starts downloading every record and returns immediately.
    ///
    /// `path` is a directory or a template such as `/data/{instrument}/{file}`;
    /// `None` uses the configured download directory. All destinations are
    /// resolved before any download starts.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Path`] if any destination cannot be computed
    /// - [`ClientError::Fetch`] if called outside a Tokio runtime
    #[instrument(skip(self, records, error_callback), fields(records = records.len()))]
    pub fn fetch(
        &self,
        records: &ResultSet,
        path: Option<&str>,
        error_callback: Option<ErrorCallback>,
    ) -> Result<FetchHandle, ClientError> {
        let filenames: Vec<String> = records
            .iter()
            .map(|record| filename_from_url(&record.url))
            .collect();
        let destinations = self.paths.resolve(records, &filenames, path)?;
        self.fetch_to(records, destinations, error_callback)
    }

    /// Starts downloading every record to caller-built destinations.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Fetch`] with [`FetchError::DestinationCountMismatch`]
    ///   if `destinations` does not have one entry per record
    /// - [`ClientError::Fetch`] if called outside a Tokio runtime
    pub fn fetch_to(
        &self,
        records: &ResultSet,
        destinations: Vec<DestinationPath>,
        error_callback: Option<ErrorCallback>,
    ) -> Result<FetchHandle, ClientError> {
        if destinations.len() != records.len() {
            return Err(FetchError::DestinationCountMismatch {
                records: records.len(),
                destinations: destinations.len(),
            }
            .into());
        }

        let tasks = records
            .iter()
            .zip(destinations)
            .map(|(record, destination)| DownloadTask::new(record.url.clone(), destination))
            .collect();
        Ok(self.orchestrator.submit(tasks, error_callback)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attrs::{Extent, Instrument, Time};
    use crate::query::DescriptorValue;
    use crate::strategy::{DirectStrategy, PatternStrategy};
    use crate::time::TimeRange;

    fn query() -> Vec<Box<dyn Attr>> {
        vec![
            Box::new(Time::parse("2020-01-01", "2020-01-02").unwrap()),
            Box::new(Instrument::new("X")),
        ]
    }

    fn client(strategy: impl ResolutionStrategy + 'static) -> GenericClient {
        GenericClient::new(
            Arc::new(strategy),
            ClientConfig::with_download_dir("/tmp/unused"),
        )
        .unwrap()
    }

    #[test]
    fn test_build_descriptor_merges_static_fields() {
        let strategy = DirectStrategy::default()
            .with_field("source", DescriptorValue::text("SDO"))
            .with_field("instrument", DescriptorValue::text("AIA"));
        let descriptor = client(strategy).build_descriptor(&query()).unwrap();

        assert_eq!(descriptor.get("source"), Some(&DescriptorValue::text("SDO")));
        assert_eq!(descriptor.get("instrument"), Some(&DescriptorValue::text("AIA")));
        assert!(descriptor.time_range().is_some());
    }

    #[tokio::test]
    async fn test_search_builds_one_record_per_locator() {
        let strategy =
            DirectStrategy::new(["https://h/1.fits", "https://h/2.fits", "https://h/3.fits"]);
        let records = client(strategy).search(&query()).await.unwrap();

        let interval = TimeRange::parse("2020-01-01", "2020-01-02").unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.instrument == "X" && r.time == interval));
        assert_eq!(
            records.urls(),
            vec!["https://h/1.fits", "https://h/2.fits", "https://h/3.fits"]
        );
    }

    #[tokio::test]
    async fn test_search_uses_per_locator_times() {
        let strategy = PatternStrategy::new("https://h/%Y%m%d.fits").unwrap();
        let query: Vec<Box<dyn Attr>> =
            vec![Box::new(Time::parse("2020-01-01 12:00", "2020-01-02 06:00").unwrap())];
        let records = client(strategy).search(&query).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records.get(1).unwrap().time,
            TimeRange::parse("2020-01-02", "2020-01-03").unwrap()
        );
        assert_eq!(
            records.time_range().unwrap(),
            TimeRange::parse("2020-01-01", "2020-01-03").unwrap()
        );
    }

    #[tokio::test]
    async fn test_search_rejects_unsupported_constraint() {
        let query: Vec<Box<dyn Attr>> = vec![Box::new(Extent {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            length: 1.0,
        })];
        let err = client(DirectStrategy::default()).search(&query).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Query(QueryError::UnsupportedConstraintKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_empty_result_is_not_an_error() {
        let records = client(DirectStrategy::default()).search(&query()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_to_rejects_destination_count_mismatch() {
        let strategy = DirectStrategy::new(["https://h/1.fits"]);
        let client = client(strategy);
        let records = client.search(&query()).await.unwrap();
        let err = client.fetch_to(&records, Vec::new(), None).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Fetch(FetchError::DestinationCountMismatch {
                records: 1,
                destinations: 0
            })
        ));
    }

    #[test]
    fn test_fetch_outside_runtime_fails() {
        let client = client(DirectStrategy::default());
        let err = client.fetch(&ResultSet::default(), None, None).unwrap_err();
        assert!(matches!(err, ClientError::Fetch(FetchError::RuntimeUnavailable)));
    }
}
