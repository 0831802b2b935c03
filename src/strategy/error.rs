//! Error types for resolution strategies.
//!
//! Messages follow the What/Why/Fix layout used across the crate.

use thiserror::Error;

/// Errors raised by resolution strategies and strategy dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyError {
    /// A strategy does not provide a capability the caller relies on.
    #[error(
        "strategy '{strategy}' does not implement '{capability}'\n  Suggestion: implement {capability} for this strategy or dispatch to it directly"
    )]
    NotImplemented {
        /// Name of the strategy.
        strategy: String,
        /// Name of the missing capability.
        capability: &'static str,
    },

    /// No registered strategy accepted the query.
    #[error(
        "no strategy can handle this query: tried {tried_count} strategy(ies)\n  Suggestion: check the query attributes or register a matching strategy"
    )]
    NoStrategy {
        /// Number of strategies consulted.
        tried_count: usize,
    },

    /// The strategy could not produce locators.
    #[error("strategy '{strategy}' failed: {reason}\n  Suggestion: {suggestion}")]
    ResolutionFailed {
        /// Name of the strategy.
        strategy: String,
        /// Why resolution failed.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },
}

impl StrategyError {
    /// Creates a `NotImplemented` error.
    #[must_use]
    pub fn not_implemented(strategy: &str, capability: &'static str) -> Self {
        Self::NotImplemented {
            strategy: strategy.to_string(),
            capability,
        }
    }

    /// Creates a `ResolutionFailed` error.
    #[must_use]
    pub fn resolution_failed(strategy: &str, reason: &str) -> Self {
        Self::ResolutionFailed {
            strategy: strategy.to_string(),
            reason: reason.to_string(),
            suggestion: "Check the query and try again".to_string(),
        }
    }
}
