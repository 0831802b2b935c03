//! Search results: one [`ResultRecord`] per resolved locator.
//!
//! A [`ResultSet`] keeps resolution order. That order is what ties each record
//! to its download and its destination path, so nothing here ever reorders.

mod error;

pub use error::ResultSetError;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::query::{DescriptorValue, RequestDescriptor, ScalarValue};
use crate::time::TimeRange;

/// Placeholder for descriptive fields the query did not supply.
pub const NOT_AVAILABLE: &str = "Data not Available";

/// Property names every record exposes regardless of its descriptor.
const COMMON_PROPERTIES: [&str; 7] = [
    "source",
    "provider",
    "physobs",
    "instrument",
    "url",
    "time",
    "wave",
];

/// Spectral coverage of a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measure {
    /// A single value.
    Scalar(f64),
    /// A closed range.
    Range {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

impl Measure {
    fn from_descriptor(value: &DescriptorValue) -> Option<Self> {
        match value {
            DescriptorValue::Scalar(ScalarValue::Number(n)) => Some(Self::Scalar(*n)),
            DescriptorValue::Range(range) => Some(Self::Range {
                min: range.min,
                max: range.max,
            }),
            _ => None,
        }
    }
}

/// One resolved locator with its descriptive metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    /// Observatory or mission.
    pub source: String,
    /// Data provider.
    pub provider: String,
    /// Observed physical quantity.
    pub physobs: String,
    /// Instrument name.
    pub instrument: String,
    /// Remote locator (URL).
    pub url: String,
    /// Time coverage of this record.
    pub time: TimeRange,
    /// Spectral coverage, when the query constrained it.
    pub wave: Option<Measure>,
    /// Full descriptor the record was built from; used for path templating.
    pub fields: RequestDescriptor,
}

impl ResultRecord {
    /// Builds a record for `url` from the query descriptor.
    ///
    /// `time` overrides the descriptor's interval when the strategy knows the
    /// locator's own coverage.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::MissingTimeRange`] if `time` is `None` and the
    /// descriptor has no interval either.
    pub fn new(
        descriptor: &RequestDescriptor,
        url: impl Into<String>,
        time: Option<TimeRange>,
    ) -> Result<Self, ResultSetError> {
        let url = url.into();
        let time = time
            .or_else(|| descriptor.time_range())
            .ok_or_else(|| ResultSetError::missing_time_range(&url))?;

        Ok(Self {
            source: text_or_not_available(descriptor, "source"),
            provider: text_or_not_available(descriptor, "provider"),
            physobs: text_or_not_available(descriptor, "physobs"),
            instrument: text_or_not_available(descriptor, "instrument"),
            url,
            time,
            wave: descriptor
                .get("wavelength")
                .and_then(Measure::from_descriptor),
            fields: descriptor.clone(),
        })
    }

    /// Names of every property this record exposes.
    #[must_use]
    pub fn property_names(&self) -> BTreeSet<String> {
        COMMON_PROPERTIES
            .iter()
            .map(|name| (*name).to_string())
            .chain(self.fields.keys().map(str::to_string))
            .collect()
    }
}

fn text_or_not_available(descriptor: &RequestDescriptor, key: &str) -> String {
    descriptor
        .get(key)
        .map_or_else(|| NOT_AVAILABLE.to_string(), ToString::to_string)
}

/// Ordered collection of records produced by one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ResultRecord>,
}

impl ResultSet {
    /// Wraps already-built records, keeping their order.
    #[must_use]
    pub fn new(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }

    /// Builds a result set by pairing locators with time intervals.
    ///
    /// When `times` is `None` every record takes the descriptor's interval.
    ///
    /// # Errors
    ///
    /// - [`ResultSetError::TimeCountMismatch`] if `times` does not have one
    ///   entry per locator.
    /// - [`ResultSetError::MissingTimeRange`] if a record has no interval.
    pub fn create(
        descriptor: &RequestDescriptor,
        locators: Vec<String>,
        times: Option<Vec<TimeRange>>,
    ) -> Result<Self, ResultSetError> {
        let times: Vec<Option<TimeRange>> = match times {
            Some(times) if times.len() != locators.len() => {
                return Err(ResultSetError::TimeCountMismatch {
                    locators: locators.len(),
                    times: times.len(),
                });
            }
            Some(times) => times.into_iter().map(Some).collect(),
            None => vec![None; locators.len()],
        };

        let records = locators
            .into_iter()
            .zip(times)
            .map(|(url, time)| ResultRecord::new(descriptor, url, time))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(records = records.len(), "built result set");
        Ok(Self { records })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the search found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ResultRecord> {
        self.records.get(index)
    }

    /// Iterates records in resolution order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResultRecord> {
        self.records.iter()
    }

    /// Records as a slice.
    #[must_use]
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Locators in resolution order.
    #[must_use]
    pub fn urls(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.url.as_str()).collect()
    }

    /// Overall time span: earliest start to latest end.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::Empty`] when there are no records.
    pub fn time_range(&self) -> Result<TimeRange, ResultSetError> {
        let mut records = self.records.iter();
        let first = records
            .next()
            .ok_or_else(|| ResultSetError::empty("time_range"))?;
        Ok(records.fold(first.time, |span, record| span.union(&record.time)))
    }

    /// Property names exposed by every record in the set.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::Empty`] when there are no records.
    pub fn common_properties(&self) -> Result<BTreeSet<String>, ResultSetError> {
        let mut records = self.records.iter();
        let first = records
            .next()
            .ok_or_else(|| ResultSetError::empty("common_properties"))?;
        Ok(records.fold(first.property_names(), |common, record| {
            let names = record.property_names();
            common.intersection(&names).cloned().collect()
        }))
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRecord;
    type IntoIter = std::slice::Iter<'a, ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRecord;
    type IntoIter = std::vec::IntoIter<ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
