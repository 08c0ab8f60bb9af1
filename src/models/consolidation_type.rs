//! Consolidation granularity and time bucket arithmetic
//!
//! Every diagram record carries exactly one `ConsolidationType`. Coarser
//! types are built from the next finer one; buckets are half-open intervals
//! in UTC.

use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of a stored time-series point, ordered finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum ConsolidationType {
    None,
    Minute,
    Hour,
    Day,
    Month,
}

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeBucket {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl ConsolidationType {
    pub const ALL: [ConsolidationType; 5] = [
        ConsolidationType::None,
        ConsolidationType::Minute,
        ConsolidationType::Hour,
        ConsolidationType::Day,
        ConsolidationType::Month,
    ];

    /// Storage and wire code
    pub fn as_i16(&self) -> i16 {
        match self {
            ConsolidationType::None => 0,
            ConsolidationType::Minute => 1,
            ConsolidationType::Hour => 2,
            ConsolidationType::Day => 3,
            ConsolidationType::Month => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationType::None => "none",
            ConsolidationType::Minute => "minute",
            ConsolidationType::Hour => "hour",
            ConsolidationType::Day => "day",
            ConsolidationType::Month => "month",
        }
    }

    /// Floor `instant` to the start of its bucket. `None` is the identity.
    pub fn closest_rounded_time(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let naive = instant.naive_utc();
        let date = naive.date();

        let rounded = match self {
            ConsolidationType::None => return instant,
            ConsolidationType::Minute => date.and_hms_opt(naive.hour(), naive.minute(), 0),
            ConsolidationType::Hour => date.and_hms_opt(naive.hour(), 0, 0),
            ConsolidationType::Day => date.and_hms_opt(0, 0, 0),
            ConsolidationType::Month => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };

        rounded.map(|t| t.and_utc()).unwrap_or(instant)
    }

    /// The bucket containing `instant`.
    ///
    /// A raw (`None`) sample occupies a one nanosecond bucket at its own
    /// instant. Month buckets end on the first of the following month, so
    /// their length follows the calendar.
    pub fn interval_bounds(&self, instant: DateTime<Utc>) -> TimeBucket {
        let start = self.closest_rounded_time(instant);
        let end = match self {
            ConsolidationType::None => start + TimeDelta::nanoseconds(1),
            ConsolidationType::Minute => start + TimeDelta::minutes(1),
            ConsolidationType::Hour => start + TimeDelta::hours(1),
            ConsolidationType::Day => start + TimeDelta::days(1),
            ConsolidationType::Month => start
                .checked_add_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        TimeBucket { start, end }
    }

    /// Start of the bucket following the one containing `instant`
    pub fn next_bucket_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.interval_bounds(instant).end
    }

    /// Granularity read when building this one: always exactly one level finer
    pub fn source_consolidation_type(&self) -> Option<ConsolidationType> {
        match self {
            ConsolidationType::None => None,
            ConsolidationType::Minute => Some(ConsolidationType::None),
            ConsolidationType::Hour => Some(ConsolidationType::Minute),
            ConsolidationType::Day => Some(ConsolidationType::Hour),
            ConsolidationType::Month => Some(ConsolidationType::Day),
        }
    }

    /// Every bucketed granularity from `Minute` up to and including `self`
    pub fn cascade(self) -> impl Iterator<Item = ConsolidationType> {
        Self::ALL
            .into_iter()
            .filter(move |t| *t != ConsolidationType::None && *t <= self)
    }
}

impl TryFrom<i16> for ConsolidationType {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ConsolidationType::None),
            1 => Ok(ConsolidationType::Minute),
            2 => Ok(ConsolidationType::Hour),
            3 => Ok(ConsolidationType::Day),
            4 => Ok(ConsolidationType::Month),
            other => Err(format!("Invalid consolidation type: {}", other)),
        }
    }
}

impl From<ConsolidationType> for i16 {
    fn from(value: ConsolidationType) -> Self {
        value.as_i16()
    }
}

impl FromStr for ConsolidationType {
    type Err = String;

    /// Accepts either the integer code or the lowercase name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i16>() {
            return ConsolidationType::try_from(code);
        }

        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid consolidation type: '{}'", s))
    }
}

impl fmt::Display for ConsolidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_rounding_per_type() {
        let t = at(2024, 3, 17, 10, 42, 37) + TimeDelta::milliseconds(250);

        assert_eq!(ConsolidationType::None.closest_rounded_time(t), t);
        assert_eq!(ConsolidationType::Minute.closest_rounded_time(t), at(2024, 3, 17, 10, 42, 0));
        assert_eq!(ConsolidationType::Hour.closest_rounded_time(t), at(2024, 3, 17, 10, 0, 0));
        assert_eq!(ConsolidationType::Day.closest_rounded_time(t), at(2024, 3, 17, 0, 0, 0));
        assert_eq!(ConsolidationType::Month.closest_rounded_time(t), at(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn test_bounds_start_equals_rounded_and_contains_instant() {
        let samples = [
            at(2023, 12, 31, 23, 59, 59),
            at(2024, 2, 29, 12, 0, 0),
            at(2024, 1, 1, 0, 0, 0),
            at(1999, 7, 15, 6, 30, 1) + TimeDelta::nanoseconds(999),
        ];

        for t in samples {
            for kind in ConsolidationType::ALL {
                let bucket = kind.interval_bounds(t);
                assert_eq!(bucket.start, kind.closest_rounded_time(t));
                assert!(bucket.start <= t, "{kind} start after instant");
                assert!(bucket.contains(t), "{kind} bucket misses {t}");
            }
        }
    }

    #[test]
    fn test_month_length_follows_calendar() {
        let cases = [
            (2024, 1, 31),
            (2024, 2, 29),
            (2023, 2, 28),
            (2024, 4, 30),
            (2024, 12, 31),
        ];

        for (year, month, days) in cases {
            let t = at(year, month, 14, 8, 0, 0);
            let bucket = ConsolidationType::Month.interval_bounds(t);
            assert_eq!((bucket.end - bucket.start).num_days(), days, "{year}-{month}");
        }
    }

    #[test]
    fn test_month_end_rolls_over_year() {
        let bucket = ConsolidationType::Month.interval_bounds(at(2024, 12, 5, 0, 0, 0));
        assert_eq!(bucket.end, at(2025, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_day_bucket_is_utc_midnight() {
        let bucket = ConsolidationType::Day.interval_bounds(at(2024, 6, 1, 23, 30, 0));
        let midnight = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(bucket.start.naive_utc(), midnight);
        assert_eq!(bucket.end, at(2024, 6, 2, 0, 0, 0));
    }

    #[test]
    fn test_source_type_steps_one_level() {
        assert_eq!(ConsolidationType::None.source_consolidation_type(), None);
        assert_eq!(ConsolidationType::Minute.source_consolidation_type(), Some(ConsolidationType::None));
        assert_eq!(ConsolidationType::Hour.source_consolidation_type(), Some(ConsolidationType::Minute));
        assert_eq!(ConsolidationType::Day.source_consolidation_type(), Some(ConsolidationType::Hour));
        assert_eq!(ConsolidationType::Month.source_consolidation_type(), Some(ConsolidationType::Day));
    }

    #[test]
    fn test_cascade_order() {
        let steps: Vec<_> = ConsolidationType::Day.cascade().collect();
        assert_eq!(
            steps,
            vec![ConsolidationType::Minute, ConsolidationType::Hour, ConsolidationType::Day]
        );
        assert_eq!(ConsolidationType::None.cascade().count(), 0);
    }

    #[test]
    fn test_parse_codes_and_names() {
        assert_eq!("2".parse::<ConsolidationType>().unwrap(), ConsolidationType::Hour);
        assert_eq!("Month".parse::<ConsolidationType>().unwrap(), ConsolidationType::Month);
        assert!("7".parse::<ConsolidationType>().is_err());
        assert!("fortnight".parse::<ConsolidationType>().is_err());
        assert!(ConsolidationType::try_from(-1).is_err());
    }

    #[test]
    fn test_serde_uses_integer_code() {
        let json = serde_json::to_string(&ConsolidationType::Day).unwrap();
        assert_eq!(json, "3");
        let back: ConsolidationType = serde_json::from_str("1").unwrap();
        assert_eq!(back, ConsolidationType::Minute);
        assert!(serde_json::from_str::<ConsolidationType>("9").is_err());
    }
}
