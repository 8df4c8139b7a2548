//! Granularity-tagged calendar dates and month arithmetic.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Segment granularity: one file per calendar month or one per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Daily,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Daily => "daily",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("monthly unit must start on day 1, got {0}")]
    MisalignedMonth(NaiveDate),

    #[error("date {0} has no successor month in the supported calendar")]
    OutOfRange(NaiveDate),
}

/// A calendar date tagged with the granularity it stands for.
///
/// A monthly unit always sits on the first of the month and covers the whole
/// month; a daily unit covers exactly its own day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateUnit {
    date: NaiveDate,
    granularity: Granularity,
}

impl DateUnit {
    pub fn monthly(date: NaiveDate) -> Result<Self, CalendarError> {
        if date.day() != 1 {
            return Err(CalendarError::MisalignedMonth(date));
        }
        Ok(Self {
            date,
            granularity: Granularity::Monthly,
        })
    }

    pub fn daily(date: NaiveDate) -> Self {
        Self {
            date,
            granularity: Granularity::Daily,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// First date after the unit's coverage (exclusive end).
    pub fn end(&self) -> Result<NaiveDate, CalendarError> {
        match self.granularity {
            Granularity::Monthly => next_month_start(self.date),
            Granularity::Daily => self
                .date
                .checked_add_signed(Duration::days(1))
                .ok_or(CalendarError::OutOfRange(self.date)),
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        match self.granularity {
            Granularity::Monthly => {
                date.year() == self.date.year() && date.month() == self.date.month()
            }
            Granularity::Daily => date == self.date,
        }
    }
}

impl fmt::Display for DateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Monthly => write!(f, "{}", self.date.format("%Y-%m")),
            Granularity::Daily => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // day 1 exists for every month chrono can represent
    date.with_day(1).unwrap_or(date)
}

/// First day of the calendar month following the one containing `date`.
///
/// December rolls over into January of the next year via integer carry.
pub fn next_month_start(date: NaiveDate) -> Result<NaiveDate, CalendarError> {
    let month = date.month();
    let year = date.year() + (month / 12) as i32;
    let next = month % 12 + 1;
    NaiveDate::from_ymd_opt(year, next, 1).ok_or(CalendarError::OutOfRange(date))
}

/// `(year, month)` membership key used when reconciling months against days.
pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn december_rolls_into_next_year() {
        assert_eq!(next_month_start(d(2023, 12, 1)).unwrap(), d(2024, 1, 1));
        assert_eq!(next_month_start(d(2023, 12, 31)).unwrap(), d(2024, 1, 1));
    }

    #[test]
    fn november_stays_in_year() {
        assert_eq!(next_month_start(d(2023, 11, 15)).unwrap(), d(2023, 12, 1));
    }

    #[test]
    fn monthly_unit_rejects_mid_month() {
        assert_eq!(
            DateUnit::monthly(d(2024, 2, 2)),
            Err(CalendarError::MisalignedMonth(d(2024, 2, 2)))
        );
    }

    #[test]
    fn monthly_unit_covers_whole_month() {
        let unit = DateUnit::monthly(d(2024, 2, 1)).unwrap();
        assert!(unit.covers(d(2024, 2, 29)));
        assert!(!unit.covers(d(2024, 3, 1)));
        assert_eq!(unit.end().unwrap(), d(2024, 3, 1));
        assert_eq!(unit.to_string(), "2024-02");
    }

    #[test]
    fn daily_unit_end_is_next_day() {
        let unit = DateUnit::daily(d(2024, 2, 29));
        assert_eq!(unit.end().unwrap(), d(2024, 3, 1));
        assert_eq!(unit.to_string(), "2024-02-29");
    }
}
