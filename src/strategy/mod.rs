//! Pluggable resolution of request descriptors into remote locators.
//!
//! Each data source implements [`ResolutionStrategy`]. The client only ever
//! holds `Arc<dyn ResolutionStrategy>`, so new sources plug in without touching
//! search or fetch.
//!
//! # Architecture
//!
//! - [`ResolutionStrategy`] - Async trait that individual data sources implement
//! - [`StrategyRegistry`] - Registration-ordered dispatch of a query to a strategy
//! - [`DirectStrategy`] - Reference implementation (fixed locator list)
//! - [`PatternStrategy`] - Time-stepped locators from a strftime URL pattern

mod direct;
mod error;
mod pattern;
mod registry;

pub use direct::DirectStrategy;
pub use error::StrategyError;
pub use pattern::{DEFAULT_STEP, PatternStrategy};
pub use registry::StrategyRegistry;

use async_trait::async_trait;

use crate::attrs::Attr;
use crate::query::{DescriptorValue, RequestDescriptor};
use crate::time::TimeRange;

/// Trait that every data source implements.
///
/// # Object Safety
///
/// This trait uses `async_trait` so strategies can be held as
/// `Arc<dyn ResolutionStrategy>`.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Returns the strategy's name (e.g., "direct", "pattern").
    fn name(&self) -> &str;

    /// Metadata known a priori for every result of this source, merged into
    /// the request descriptor after the query constraints.
    fn static_fields(&self) -> Vec<(String, DescriptorValue)>;

    /// Resolves the descriptor into locators, in the order results should keep.
    ///
    /// An empty list means "no data found" and is not an error.
    async fn resolve(
        &self,
        time: Option<&TimeRange>,
        descriptor: &RequestDescriptor,
    ) -> Result<Vec<String>, StrategyError>;

    /// Per-locator time coverage, when the source knows it.
    ///
    /// `None` (the default) means unsupported; every record then takes the
    /// query's interval.
    fn time_for_locators(&self, _locators: &[String]) -> Option<Vec<TimeRange>> {
        None
    }

    /// Returns whether this strategy can serve a query.
    ///
    /// The default reports the capability as missing, which aborts registry
    /// dispatch.
    fn can_handle_query(&self, _attrs: &[Box<dyn Attr>]) -> Result<bool, StrategyError> {
        Err(StrategyError::not_implemented(self.name(), "can_handle_query"))
    }
}

impl std::fmt::Debug for dyn ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionStrategy")
            .field("name", &self.name())
            .finish()
    }
}
