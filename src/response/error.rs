//! Error types for result set construction and aggregation.

use thiserror::Error;

/// Errors raised by [`ResultSet`](super::ResultSet) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResultSetError {
    /// An aggregate was requested over zero records.
    #[error("result set is empty: {operation} needs at least one record")]
    Empty {
        /// The aggregate that was requested.
        operation: &'static str,
    },

    /// Neither the strategy nor the descriptor supplied a time interval.
    #[error(
        "no time interval for {locator}\n  Suggestion: add a time constraint to the query"
    )]
    MissingTimeRange {
        /// The locator whose record could not be built.
        locator: String,
    },

    /// The strategy returned per-locator times that do not line up with the locators.
    #[error("strategy returned {times} time interval(s) for {locators} locator(s)")]
    TimeCountMismatch {
        /// Number of locators resolved.
        locators: usize,
        /// Number of time intervals reported.
        times: usize,
    },
}

impl ResultSetError {
    /// Creates an `Empty` error for the named aggregate.
    #[must_use]
    pub fn empty(operation: &'static str) -> Self {
        Self::Empty { operation }
    }

    /// Creates a `MissingTimeRange` error.
    #[must_use]
    pub fn missing_time_range(locator: &str) -> Self {
        Self::MissingTimeRange {
            locator: locator.to_string(),
        }
    }
}
