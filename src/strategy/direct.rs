//! Direct strategy - a fixed list of locators.
//!
//! The [`DirectStrategy`] is the simplest strategy implementation. It returns
//! the locators it was built with, whatever the query, and serves as the
//! reference for strategy authors.

use async_trait::async_trait;

use crate::query::{DescriptorValue, RequestDescriptor};
use crate::time::TimeRange;

use super::{ResolutionStrategy, StrategyError};

/// A strategy that passes a known locator list through unchanged.
#[derive(Debug, Clone, Default)]
pub struct DirectStrategy {
    locators: Vec<String>,
    fields: Vec<(String, DescriptorValue)>,
}

impl DirectStrategy {
    /// Creates a strategy returning `locators` in order.
    #[must_use]
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locators: locators.into_iter().map(Into::into).collect(),
            fields: Vec::new(),
        }
    }

    /// Adds an a-priori descriptor field, e.g. `("source", "SDO")`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: DescriptorValue) -> Self {
        self.fields.push((key.into(), value));
        self
    }
}

#[async_trait]
impl ResolutionStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn static_fields(&self) -> Vec<(String, DescriptorValue)> {
        self.fields.clone()
    }

    #[tracing::instrument(skip(self, _time, _descriptor), fields(strategy = "direct"))]
    async fn resolve(
        &self,
        _time: Option<&TimeRange>,
        _descriptor: &RequestDescriptor,
    ) -> Result<Vec<String>, StrategyError> {
        Ok(self.locators.clone())
    }
}
