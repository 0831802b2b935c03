//! Canonical request descriptors and the mapper that builds them.
//!
//! A [`RequestDescriptor`] is the string-keyed form of a query handed to a
//! [`ResolutionStrategy`](crate::strategy::ResolutionStrategy). Keys are the
//! lower-cased type names of the constraints, except for the reserved time keys
//! [`TIME_RANGE_KEY`], [`TIME_START_KEY`] and [`TIME_END_KEY`].

mod error;

pub use error::QueryError;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::attrs::{Attr, AttrShape, AttrValue};
use crate::time::TimeRange;

/// Reserved key holding the governing time interval.
pub const TIME_RANGE_KEY: &str = "TimeRange";
/// Reserved key holding the start of the governing time interval.
pub const TIME_START_KEY: &str = "Time_start";
/// Reserved key holding the end of the governing time interval.
pub const TIME_END_KEY: &str = "Time_end";

/// Type name whose ranges use the `wave` field prefix.
const WAVELENGTH_TYPE: &str = "Wavelength";
const WAVELENGTH_PREFIX: &str = "wave";

/// A single scalar descriptor value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Point in time.
    Instant(DateTime<Utc>),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
            Self::Instant(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<AttrValue> for ScalarValue {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Text(text) => Self::Text(text),
            AttrValue::Number(n) => Self::Number(n),
        }
    }
}

/// A two-field range record, e.g. `{wavemin, wavemax}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeValue {
    /// Name of the lower-bound field (`"{prefix}min"`).
    pub min_field: String,
    /// Name of the upper-bound field (`"{prefix}max"`).
    pub max_field: String,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl RangeValue {
    /// Creates a range record whose field names carry `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str, min: f64, max: f64) -> Self {
        Self {
            min_field: format!("{prefix}min"),
            max_field: format!("{prefix}max"),
            min,
            max,
        }
    }

    /// Looks up a bound by its field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<f64> {
        if name == self.min_field {
            Some(self.min)
        } else if name == self.max_field {
            Some(self.max)
        } else {
            None
        }
    }
}

/// A value stored in a request descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DescriptorValue {
    /// A single value.
    Scalar(ScalarValue),
    /// A closed numeric range with named bounds.
    Range(RangeValue),
    /// A time interval.
    Time(TimeRange),
}

impl DescriptorValue {
    /// Shorthand for a text scalar.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(ScalarValue::Text(value.into()))
    }

    /// Shorthand for a numeric scalar.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Scalar(ScalarValue::Number(value))
    }

    /// Returns the text of a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(ScalarValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for DescriptorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => fmt::Display::fmt(scalar, f),
            Self::Range(range) => write!(f, "{}-{}", range.min, range.max),
            Self::Time(range) => fmt::Display::fmt(range, f),
        }
    }
}

/// Canonical string-keyed representation of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestDescriptor {
    entries: BTreeMap<String, DescriptorValue>,
}

impl RequestDescriptor {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: DescriptorValue) {
        self.entries.insert(key.into(), value);
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DescriptorValue> {
        self.entries.get(key)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DescriptorValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records the governing time interval under all three reserved keys.
    pub fn set_time_range(&mut self, range: TimeRange) {
        self.insert(TIME_RANGE_KEY, DescriptorValue::Time(range));
        self.insert(
            TIME_START_KEY,
            DescriptorValue::Scalar(ScalarValue::Instant(range.start())),
        );
        self.insert(
            TIME_END_KEY,
            DescriptorValue::Scalar(ScalarValue::Instant(range.end())),
        );
    }

    /// The governing time interval, if the query has one.
    ///
    /// Prefers the `TimeRange` entry and falls back to `Time_start`/`Time_end`.
    #[must_use]
    pub fn time_range(&self) -> Option<TimeRange> {
        if let Some(DescriptorValue::Time(range)) = self.get(TIME_RANGE_KEY) {
            return Some(*range);
        }
        match (self.get(TIME_START_KEY), self.get(TIME_END_KEY)) {
            (
                Some(DescriptorValue::Scalar(ScalarValue::Instant(start))),
                Some(DescriptorValue::Scalar(ScalarValue::Instant(end))),
            ) => Some(TimeRange::new(*start, *end)),
            _ => None,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, DescriptorValue)> for RequestDescriptor {
    fn from_iter<I: IntoIterator<Item = (K, DescriptorValue)>>(iter: I) -> Self {
        let mut descriptor = Self::new();
        for (key, value) in iter {
            descriptor.insert(key, value);
        }
        descriptor
    }
}

/// Folds typed constraints into a [`RequestDescriptor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeMapper;

impl AttributeMapper {
    /// Builds a descriptor from a sequence of constraints.
    ///
    /// - Time constraints set `TimeRange`, `Time_start` and `Time_end`; the last
    ///   one wins.
    /// - Ranges with `min == max` collapse to a scalar under the lower-cased
    ///   type name. Other ranges store `{prefix}min`/`{prefix}max`, where the
    ///   prefix is `wave` for wavelengths and empty otherwise.
    /// - Values are stored as scalars under the lower-cased type name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedConstraintKind`] for any constraint
    /// whose shape is [`AttrShape::Unsupported`].
    #[instrument(level = "debug", skip(attrs), fields(attr_count = attrs.len()))]
    pub fn build(attrs: &[Box<dyn Attr>]) -> Result<RequestDescriptor, QueryError> {
        let mut descriptor = RequestDescriptor::new();

        for attr in attrs {
            let type_name = attr.type_name();
            let key = type_name.to_lowercase();

            match attr.shape() {
                AttrShape::Time(range) => descriptor.set_time_range(range),
                #[allow(clippy::float_cmp)]
                AttrShape::Range { min, max } if min == max => {
                    descriptor.insert(key, DescriptorValue::number(min));
                }
                AttrShape::Range { min, max } => {
                    let prefix = if type_name == WAVELENGTH_TYPE {
                        WAVELENGTH_PREFIX
                    } else {
                        ""
                    };
                    descriptor.insert(
                        key,
                        DescriptorValue::Range(RangeValue::with_prefix(prefix, min, max)),
                    );
                }
                AttrShape::Value(value) => {
                    descriptor.insert(key, DescriptorValue::Scalar(value.into()));
                }
                AttrShape::Unsupported => {
                    return Err(QueryError::unsupported(type_name));
                }
            }
        }

        debug!(keys = descriptor.len(), "built request descriptor");
        Ok(descriptor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attrs::{Extent, Instrument, NamedRange, Sample, Time, Wavelength};

    fn boxed<A: Attr + 'static>(attr: A) -> Box<dyn Attr> {
        Box::new(attr)
    }

    #[test]
    fn test_time_constraint_sets_reserved_keys() {
        let time = Time::parse("2020-01-01", "2020-01-02").unwrap();
        let descriptor = AttributeMapper::build(&[boxed(time)]).unwrap();

        assert_eq!(descriptor.len(), 3);
        assert_eq!(descriptor.time_range(), Some(time.range()));
        assert_eq!(
            descriptor.get(TIME_START_KEY),
            Some(&DescriptorValue::Scalar(ScalarValue::Instant(
                time.range().start()
            )))
        );
        assert_eq!(
            descriptor.get(TIME_END_KEY),
            Some(&DescriptorValue::Scalar(ScalarValue::Instant(
                time.range().end()
            )))
        );
    }

    #[test]
    fn test_last_time_constraint_wins() {
        let first = Time::parse("2020-01-01", "2020-01-02").unwrap();
        let second = Time::parse("2021-06-01", "2021-06-03").unwrap();
        let descriptor = AttributeMapper::build(&[boxed(first), boxed(second)]).unwrap();
        assert_eq!(descriptor.time_range(), Some(second.range()));
    }

    #[test]
    fn test_equal_range_collapses_to_scalar() {
        let descriptor = AttributeMapper::build(&[boxed(Wavelength::new(171.0, 171.0))]).unwrap();
        assert_eq!(
            descriptor.get("wavelength"),
            Some(&DescriptorValue::number(171.0))
        );
    }

    #[test]
    fn test_wavelength_range_uses_wave_prefix() {
        let descriptor = AttributeMapper::build(&[boxed(Wavelength::new(171.0, 304.0))]).unwrap();
        let Some(DescriptorValue::Range(range)) = descriptor.get("wavelength") else {
            panic!("expected range entry");
        };
        assert_eq!(range.min_field, "wavemin");
        assert_eq!(range.max_field, "wavemax");
        assert_eq!(range.field("wavemin"), Some(171.0));
        assert_eq!(range.field("wavemax"), Some(304.0));
    }

    #[test]
    fn test_other_ranges_have_no_prefix() {
        let descriptor =
            AttributeMapper::build(&[boxed(NamedRange::new("Energy", 10.0, 20.0))]).unwrap();
        let Some(DescriptorValue::Range(range)) = descriptor.get("energy") else {
            panic!("expected range entry");
        };
        assert_eq!(range.min_field, "min");
        assert_eq!(range.max_field, "max");
    }

    #[test]
    fn test_values_use_lowercased_type_name() {
        let descriptor =
            AttributeMapper::build(&[boxed(Instrument::new("EVE")), boxed(Sample::new(60.0))])
                .unwrap();
        assert_eq!(
            descriptor.get("instrument"),
            Some(&DescriptorValue::text("EVE"))
        );
        assert_eq!(descriptor.get("sample"), Some(&DescriptorValue::number(60.0)));
        assert!(descriptor.time_range().is_none());
    }

    #[test]
    fn test_unsupported_shape_is_hard_error() {
        let extent = Extent {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            length: 1.0,
        };
        let result = AttributeMapper::build(&[boxed(Instrument::new("EVE")), boxed(extent)]);
        assert_eq!(result, Err(QueryError::unsupported("Extent")));
    }

    #[test]
    fn test_time_range_falls_back_to_start_end_keys() {
        let range = TimeRange::parse("2020-01-01", "2020-01-03").unwrap();
        let mut descriptor = RequestDescriptor::new();
        descriptor.insert(
            TIME_START_KEY,
            DescriptorValue::Scalar(ScalarValue::Instant(range.start())),
        );
        descriptor.insert(
            TIME_END_KEY,
            DescriptorValue::Scalar(ScalarValue::Instant(range.end())),
        );
        assert_eq!(descriptor.time_range(), Some(range));
    }

    #[test]
    fn test_descriptor_value_display() {
        assert_eq!(DescriptorValue::text("AIA").to_string(), "AIA");
        assert_eq!(
            DescriptorValue::Range(RangeValue::with_prefix("wave", 171.0, 304.0)).to_string(),
            "171-304"
        );
    }
}
