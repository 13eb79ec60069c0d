//! Symbolic period / explicit range → inclusive, day-aligned window.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Longest explicit window accepted, in days (inclusive of both ends).
pub const MAX_RANGE_DAYS: i64 = 3660;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Today,
    Yesterday,
    Last3Days,
    Last7Days,
    #[default]
    Last30Days,
    Last90Days,
    ThisMonth,
}

impl Period {
    /// Unknown or absent tokens fall back to the 30-day window.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("today") => Self::Today,
            Some("yesterday") => Self::Yesterday,
            Some("3d") => Self::Last3Days,
            Some("7d") => Self::Last7Days,
            Some("90d") => Self::Last90Days,
            Some("this_month") => Self::ThisMonth,
            _ => Self::Last30Days,
        }
    }

    /// First and last calendar day covered, relative to `today`.
    fn days(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let trailing = |n: i64| (today - Duration::days(n - 1), today);
        match self {
            Self::Today => (today, today),
            Self::Yesterday => {
                let y = today - Duration::days(1);
                (y, y)
            }
            Self::Last3Days => trailing(3),
            Self::Last7Days => trailing(7),
            Self::Last30Days => trailing(30),
            Self::Last90Days => trailing(90),
            Self::ThisMonth => (today.with_day(1).unwrap_or(today), today),
        }
    }
}

/// Query-string shape shared by every dashboard read route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateFilter {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Inclusive window: `start` is 00:00:00 of the first day, `end` is the
/// last microsecond of the last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn from_days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(end_of_day()),
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    /// Every calendar day in the window, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.end_date();
        self.start_date()
            .iter_days()
            .take_while(move |d| *d <= last)
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

fn parse_day(field: &'static str, raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| CoreError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

/// Resolve `filter` against `today`. An explicit start/end pair always wins
/// over `period`; a lone start or end date is ignored.
pub fn resolve_date_range(filter: &DateFilter, today: NaiveDate) -> Result<DateRange, CoreError> {
    let explicit = (
        filter.start_date.as_deref().filter(|s| !s.trim().is_empty()),
        filter.end_date.as_deref().filter(|s| !s.trim().is_empty()),
    );
    if let (Some(start), Some(end)) = explicit {
        let first = parse_day("start_date", start)?;
        let last = parse_day("end_date", end)?;
        if last < first {
            return Err(CoreError::InvertedRange);
        }
        if (last - first).num_days() + 1 > MAX_RANGE_DAYS {
            return Err(CoreError::RangeTooLarge(MAX_RANGE_DAYS));
        }
        return Ok(DateRange::from_days(first, last));
    }

    let (first, last) = Period::parse(filter.period.as_deref()).days(today);
    Ok(DateRange::from_days(first, last))
}
