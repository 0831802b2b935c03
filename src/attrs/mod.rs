//! Typed query constraints ("attributes") accepted by client searches.
//!
//! Every constraint declares a type name and exposes one of three shapes the
//! [`AttributeMapper`](crate::query::AttributeMapper) understands: a time
//! interval, a closed numeric range, or a scalar value. Attributes that fit none
//! of those report [`AttrShape::Unsupported`] and are rejected by the mapper.
//!
//! # Example
//!
//! ```
//! use dataretriever::attrs::{Attr, Instrument, Time, Wavelength};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query: Vec<Box<dyn Attr>> = vec![
//!     Box::new(Time::parse("2020-01-01", "2020-01-02")?),
//!     Box::new(Instrument::new("AIA")),
//!     Box::new(Wavelength::new(171.0, 171.0)),
//! ];
//! assert_eq!(query[1].type_name(), "Instrument");
//! # Ok(())
//! # }
//! ```

use std::fmt;

use crate::time::{TimeParseError, TimeRange};

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Free text, e.g. an instrument name.
    Text(String),
    /// A plain number in the attribute's native unit.
    Number(f64),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// The structural shape of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrShape {
    /// A time interval; governs the query's time coverage.
    Time(TimeRange),
    /// A closed numeric range.
    Range {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// A single value.
    Value(AttrValue),
    /// Anything the mapper cannot express in a request descriptor.
    Unsupported,
}

/// A typed query constraint.
pub trait Attr: fmt::Debug + Send + Sync {
    /// Declared type name, e.g. `"Instrument"`. Descriptor keys derive from it.
    fn type_name(&self) -> &str;

    /// Structural shape used when building the request descriptor.
    fn shape(&self) -> AttrShape;
}

/// Time interval constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    range: TimeRange,
}

impl Time {
    /// Creates a time constraint from an existing range.
    #[must_use]
    pub fn new(range: TimeRange) -> Self {
        Self { range }
    }

    /// Parses a time constraint from two time strings.
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] if either endpoint is not a recognized time.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Ok(Self::new(TimeRange::parse(start, end)?))
    }

    /// The constrained interval.
    #[must_use]
    pub fn range(&self) -> TimeRange {
        self.range
    }
}

impl Attr for Time {
    fn type_name(&self) -> &'static str {
        "Time"
    }

    fn shape(&self) -> AttrShape {
        AttrShape::Time(self.range)
    }
}

/// Wavelength range constraint, in angstrom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wavelength {
    min: f64,
    max: f64,
}

impl Wavelength {
    /// Creates a wavelength range; the bounds may be given in either order.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

impl Attr for Wavelength {
    fn type_name(&self) -> &'static str {
        "Wavelength"
    }

    fn shape(&self) -> AttrShape {
        AttrShape::Range {
            min: self.min,
            max: self.max,
        }
    }
}

/// A numeric range constraint with a caller-chosen type name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    name: String,
    min: f64,
    max: f64,
}

impl NamedRange {
    /// Creates a named range; the bounds may be given in either order.
    #[must_use]
    pub fn new(name: impl Into<String>, a: f64, b: f64) -> Self {
        Self {
            name: name.into(),
            min: a.min(b),
            max: a.max(b),
        }
    }
}

impl Attr for NamedRange {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> AttrShape {
        AttrShape::Range {
            min: self.min,
            max: self.max,
        }
    }
}

macro_rules! text_attr {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            value: String,
        }

        impl $name {
            /// Creates the constraint.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self { value: value.into() }
            }

            /// The constrained value.
            #[must_use]
            pub fn value(&self) -> &str {
                &self.value
            }
        }

        impl Attr for $name {
            fn type_name(&self) -> &'static str {
                stringify!($name)
            }

            fn shape(&self) -> AttrShape {
                AttrShape::Value(AttrValue::Text(self.value.clone()))
            }
        }
    };
}

text_attr!(
    /// Instrument name constraint.
    Instrument
);
text_attr!(
    /// Data source (observatory/mission) constraint.
    Source
);
text_attr!(
    /// Data provider constraint.
    Provider
);
text_attr!(
    /// Observed physical quantity constraint.
    Physobs
);
text_attr!(
    /// Detector name constraint.
    Detector
);
text_attr!(
    /// Processing level constraint.
    Level
);

/// Sampling cadence constraint, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    seconds: f64,
}

impl Sample {
    /// Creates a cadence constraint.
    #[must_use]
    pub fn new(seconds: f64) -> Self {
        Self { seconds }
    }
}

impl Attr for Sample {
    fn type_name(&self) -> &'static str {
        "Sample"
    }

    fn shape(&self) -> AttrShape {
        AttrShape::Value(AttrValue::Number(self.seconds))
    }
}

/// Spatial extent constraint.
///
/// Has no request-descriptor representation; searches containing it fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Lower-left x.
    pub x: f64,
    /// Lower-left y.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub length: f64,
}

impl Attr for Extent {
    fn type_name(&self) -> &'static str {
        "Extent"
    }

    fn shape(&self) -> AttrShape {
        AttrShape::Unsupported
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_attr_type_names() {
        assert_eq!(Instrument::new("AIA").type_name(), "Instrument");
        assert_eq!(Source::new("SDO").type_name(), "Source");
        assert_eq!(Physobs::new("intensity").type_name(), "Physobs");
        assert_eq!(Level::new("1").value(), "1");
    }

    #[test]
    fn test_wavelength_orders_bounds() {
        let wave = Wavelength::new(304.0, 171.0);
        assert_eq!(
            wave.shape(),
            AttrShape::Range {
                min: 171.0,
                max: 304.0
            }
        );
    }

    #[test]
    fn test_time_shape_carries_range() {
        let time = Time::parse("2020-01-01", "2020-01-02").unwrap();
        assert_eq!(time.shape(), AttrShape::Time(time.range()));
    }

    #[test]
    fn test_extent_is_unsupported() {
        let extent = Extent {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            length: 10.0,
        };
        assert_eq!(extent.shape(), AttrShape::Unsupported);
    }

    #[test]
    fn test_attr_value_display() {
        assert_eq!(AttrValue::Text("AIA".into()).to_string(), "AIA");
        assert_eq!(AttrValue::Number(12.5).to_string(), "12.5");
    }
}
