//! Pattern strategy - one locator per time step from a strftime URL pattern.
//!
//! Archives that lay files out by date (`/2020/01/01/img_20200101.fits`) need
//! no remote listing: the locators follow from the query interval. The pattern
//! uses chrono strftime tokens, e.g.
//! `https://archive.example.com/%Y/%m/%d/img_%Y%m%d.fits`.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::format::{Item, Parsed, StrftimeItems};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{debug, instrument};

use crate::attrs::{Attr, AttrShape};
use crate::query::{DescriptorValue, RequestDescriptor};
use crate::time::TimeRange;

use super::{ResolutionStrategy, StrategyError};

/// Default step between generated locators (one day), in seconds.
pub const DEFAULT_STEP: i64 = 86_400;

/// Upper bound on grid steps walked when measuring a locator's coverage.
const MAX_COVERAGE_STEPS: u32 = 100_000;

/// A strategy that expands a time interval into date-stamped locators.
#[derive(Debug, Clone)]
pub struct PatternStrategy {
    pattern: String,
    step: Duration,
    fields: Vec<(String, DescriptorValue)>,
}

impl PatternStrategy {
    /// Creates a strategy for `pattern` with a one-day step.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::ResolutionFailed`] if the pattern contains an
    /// invalid strftime specifier.
    pub fn new(pattern: impl Into<String>) -> Result<Self, StrategyError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(StrategyError::ResolutionFailed {
                strategy: "pattern".to_string(),
                reason: format!("invalid strftime specifier in '{pattern}'"),
                suggestion: "Use chrono strftime tokens such as %Y, %m, %d, %H".to_string(),
            });
        }
        Ok(Self {
            pattern,
            step: Duration::seconds(DEFAULT_STEP),
            fields: Vec::new(),
        })
    }

    /// Sets the step between generated locators.
    #[must_use]
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Adds an a-priori descriptor field, e.g. `("instrument", "EVE")`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: DescriptorValue) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// The URL pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn render(&self, at: DateTime<Utc>) -> Result<String, StrategyError> {
        let mut url = String::new();
        write!(url, "{}", at.format(&self.pattern)).map_err(|_| {
            StrategyError::resolution_failed(self.name(), "URL pattern could not be rendered")
        })?;
        Ok(url)
    }

    /// Recovers the step start encoded in a locator.
    fn parse_locator(&self, locator: &str) -> Option<DateTime<Utc>> {
        let mut parsed = Parsed::new();
        chrono::format::parse(&mut parsed, locator, StrftimeItems::new(&self.pattern)).ok()?;
        let date = match parsed.to_naive_date() {
            Ok(date) => date,
            Err(_) => {
                // Coarse patterns (%Y, %Y%m) start on the first day of the period.
                // Fields the locator already set keep their value.
                parsed.set_month(1).ok();
                parsed.set_day(1).ok();
                parsed.to_naive_date().ok()?
            }
        };
        let time = parsed.to_naive_time().unwrap_or(NaiveTime::MIN);
        Some(date.and_time(time).and_utc())
    }

    /// Start of the first grid step after `start` that renders a different
    /// locator. Consecutive steps rendering `locator` were merged by
    /// `resolve`, so they all belong to this locator's coverage.
    fn coverage_end(&self, start: DateTime<Utc>, locator: &str) -> DateTime<Utc> {
        let step_secs = self.step.num_seconds();
        if step_secs <= 0 {
            return start + self.step;
        }
        let offset = start.timestamp().rem_euclid(step_secs);
        let mut cursor = start - Duration::seconds(offset);
        if cursor <= start {
            cursor += self.step;
        }
        for _ in 0..MAX_COVERAGE_STEPS {
            match self.render(cursor) {
                Ok(url) if url == locator => cursor += self.step,
                _ => return cursor,
            }
        }
        cursor
    }
}

#[async_trait]
impl ResolutionStrategy for PatternStrategy {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn static_fields(&self) -> Vec<(String, DescriptorValue)> {
        self.fields.clone()
    }

    #[instrument(skip(self, descriptor), fields(strategy = "pattern", pattern = %self.pattern))]
    async fn resolve(
        &self,
        time: Option<&TimeRange>,
        descriptor: &RequestDescriptor,
    ) -> Result<Vec<String>, StrategyError> {
        let Some(range) = time else {
            return Err(StrategyError::resolution_failed(
                self.name(),
                "query has no time range",
            ));
        };
        let step_secs = self.step.num_seconds();
        if step_secs <= 0 {
            return Err(StrategyError::resolution_failed(
                self.name(),
                "step must be at least one second",
            ));
        }

        // Align to the step grid so the first locator covers the query start.
        let offset = range.start().timestamp().rem_euclid(step_secs);
        let mut cursor = range.start() - Duration::seconds(offset);
        let mut locators: Vec<String> = Vec::new();

        while cursor <= range.end() {
            let url = self.render(cursor)?;
            if locators.last() != Some(&url) {
                locators.push(url);
            }
            cursor += self.step;
        }

        debug!(
            count = locators.len(),
            descriptor_keys = descriptor.len(),
            "generated locators"
        );
        Ok(locators)
    }

    fn time_for_locators(&self, locators: &[String]) -> Option<Vec<TimeRange>> {
        locators
            .iter()
            .map(|locator| {
                self.parse_locator(locator)
                    .map(|start| TimeRange::new(start, self.coverage_end(start, locator)))
            })
            .collect()
    }

    fn can_handle_query(&self, attrs: &[Box<dyn Attr>]) -> Result<bool, StrategyError> {
        let mut has_time = false;
        for attr in attrs {
            match attr.shape() {
                AttrShape::Time(_) => has_time = true,
                AttrShape::Value(value) => {
                    let key = attr.type_name().to_lowercase();
                    let matches_field = self.fields.iter().any(|(field, known)| {
                        *field == key && known.to_string().eq_ignore_ascii_case(&value.to_string())
                    });
                    if !matches_field {
                        return Ok(false);
                    }
                }
                AttrShape::Range { .. } | AttrShape::Unsupported => return Ok(false),
            }
        }
        Ok(has_time)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attrs::{Instrument, Time, Wavelength};

    const PATTERN: &str = "https://archive.example.com/%Y/%m/%d/img_%Y%m%d.fits";

    fn strategy() -> PatternStrategy {
        PatternStrategy::new(PATTERN)
            .unwrap()
            .with_field("instrument", DescriptorValue::text("EVE"))
    }

    #[test]
    fn test_new_rejects_invalid_specifier() {
        let result = PatternStrategy::new("https://example.com/%Q.fits");
        assert!(matches!(
            result,
            Err(StrategyError::ResolutionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_generates_one_locator_per_day() {
        let range = TimeRange::parse("2020-01-01 06:00", "2020-01-03").unwrap();
        let locators = strategy()
            .resolve(Some(&range), &RequestDescriptor::new())
            .await
            .unwrap();
        assert_eq!(
            locators,
            vec![
                "https://archive.example.com/2020/01/01/img_20200101.fits",
                "https://archive.example.com/2020/01/02/img_20200102.fits",
                "https://archive.example.com/2020/01/03/img_20200103.fits",
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_collapses_duplicate_locators() {
        let monthly = PatternStrategy::new("https://example.com/%Y%m.csv")
            .unwrap()
            .with_step(Duration::hours(6));
        let range = TimeRange::parse("2020-01-01", "2020-01-02").unwrap();
        let locators = monthly
            .resolve(Some(&range), &RequestDescriptor::new())
            .await
            .unwrap();
        assert_eq!(locators, vec!["https://example.com/202001.csv"]);
    }

    #[tokio::test]
    async fn test_resolve_without_time_fails() {
        let result = strategy().resolve(None, &RequestDescriptor::new()).await;
        assert!(matches!(
            result,
            Err(StrategyError::ResolutionFailed { .. })
        ));
    }

    #[test]
    fn test_time_for_locators_parses_back_step_interval() {
        let locators =
            vec!["https://archive.example.com/2020/01/02/img_20200102.fits".to_string()];
        let times = strategy().time_for_locators(&locators).unwrap();
        assert_eq!(
            times,
            vec![TimeRange::parse("2020-01-02", "2020-01-03").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_time_for_locators_covers_merged_sub_steps() {
        let daily = PatternStrategy::new("https://h/%Y%m%d.fits")
            .unwrap()
            .with_step(Duration::hours(6));
        let range = TimeRange::parse("2020-01-01 00:00", "2020-01-01 18:00").unwrap();
        let locators = daily
            .resolve(Some(&range), &RequestDescriptor::new())
            .await
            .unwrap();
        assert_eq!(locators, vec!["https://h/20200101.fits"]);

        let times = daily.time_for_locators(&locators).unwrap();
        assert_eq!(
            times,
            vec![TimeRange::parse("2020-01-01", "2020-01-02").unwrap()]
        );
    }

    #[test]
    fn test_time_for_locators_monthly_pattern_spans_month() {
        let monthly = PatternStrategy::new("https://example.com/%Y%m.csv")
            .unwrap()
            .with_step(Duration::hours(6));
        let locators = vec!["https://example.com/202002.csv".to_string()];
        let times = monthly.time_for_locators(&locators).unwrap();
        assert_eq!(
            times,
            vec![TimeRange::parse("2020-02-01", "2020-03-01").unwrap()]
        );
    }

    #[test]
    fn test_time_for_locators_unparseable_is_unsupported() {
        let locators = vec!["https://elsewhere.example.com/file.fits".to_string()];
        assert!(strategy().time_for_locators(&locators).is_none());
    }

    #[test]
    fn test_can_handle_query_matching_fields() {
        let query: Vec<Box<dyn Attr>> = vec![
            Box::new(Time::parse("2020-01-01", "2020-01-02").unwrap()),
            Box::new(Instrument::new("eve")),
        ];
        assert_eq!(strategy().can_handle_query(&query), Ok(true));
    }

    #[test]
    fn test_can_handle_query_rejects_other_instrument_and_ranges() {
        let other: Vec<Box<dyn Attr>> = vec![
            Box::new(Time::parse("2020-01-01", "2020-01-02").unwrap()),
            Box::new(Instrument::new("AIA")),
        ];
        assert_eq!(strategy().can_handle_query(&other), Ok(false));

        let ranged: Vec<Box<dyn Attr>> = vec![
            Box::new(Time::parse("2020-01-01", "2020-01-02").unwrap()),
            Box::new(Wavelength::new(171.0, 304.0)),
        ];
        assert_eq!(strategy().can_handle_query(&ranged), Ok(false));
    }

    #[test]
    fn test_can_handle_query_requires_time() {
        let query: Vec<Box<dyn Attr>> = vec![Box::new(Instrument::new("EVE"))];
        assert_eq!(strategy().can_handle_query(&query), Ok(false));
    }
}
