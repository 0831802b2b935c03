//! Strategy registry: dispatches a query to the first strategy that accepts it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::attrs::Attr;

use super::{ResolutionStrategy, StrategyError};

/// A registration-ordered collection of strategies.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn ResolutionStrategy>>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy. Earlier registrations are consulted first.
    #[tracing::instrument(skip(self, strategy), fields(strategy_name = strategy.name()))]
    pub fn register(&mut self, strategy: Arc<dyn ResolutionStrategy>) {
        debug!("Registering strategy");
        self.strategies.push(strategy);
    }

    /// Returns the number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if no strategies are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Finds the first strategy that can handle `attrs`.
    ///
    /// # Errors
    ///
    /// - [`StrategyError::NotImplemented`] as soon as a consulted strategy lacks
    ///   `can_handle_query`; dispatch stops there.
    /// - [`StrategyError::NoStrategy`] if every strategy declines.
    #[tracing::instrument(skip(self, attrs), fields(attr_count = attrs.len()))]
    pub fn find(
        &self,
        attrs: &[Box<dyn Attr>],
    ) -> Result<Arc<dyn ResolutionStrategy>, StrategyError> {
        for strategy in &self.strategies {
            if strategy.can_handle_query(attrs)? {
                info!(strategy = strategy.name(), "Strategy selected");
                return Ok(Arc::clone(strategy));
            }
            debug!(strategy = strategy.name(), "Strategy declined query");
        }
        Err(StrategyError::NoStrategy {
            tried_count: self.strategies.len(),
        })
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("StrategyRegistry")
            .field("strategy_count", &self.strategies.len())
            .field("strategies", &names)
            .finish()
    }
}
