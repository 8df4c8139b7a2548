//! Split a half-open date range into full-month units and leftover days.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::unit::{month_start, next_month_start, CalendarError, DateUnit};

/// Monthly and daily units that together tile a `[start, end)` range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatePartition {
    pub monthly: Vec<DateUnit>,
    pub daily: Vec<DateUnit>,
}

impl DatePartition {
    pub fn monthly_dates(&self) -> Vec<NaiveDate> {
        self.monthly.iter().map(DateUnit::date).collect()
    }

    pub fn daily_dates(&self) -> Vec<NaiveDate> {
        self.daily.iter().map(DateUnit::date).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.monthly.is_empty() && self.daily.is_empty()
    }

    /// Every calendar day covered by the partition, ascending.
    pub fn covered_days(&self) -> Result<Vec<NaiveDate>, CalendarError> {
        let mut days = Vec::new();
        for unit in self.monthly.iter().chain(self.daily.iter()) {
            let end = unit.end()?;
            let mut day = unit.date();
            while day < end {
                days.push(day);
                day += Duration::days(1);
            }
        }
        Ok(days)
    }
}

/// Partition `[start, end)` into full calendar months and the remaining days.
///
/// Months are emitted from the month containing `start` up to (excluding) the
/// month containing `end`, so an unaligned `start` is widened back to its month
/// start whenever at least one month is emitted. When no month is emitted the
/// daily walk starts at `start` itself and a partial month is never reported
/// as monthly.
pub fn partition(start: NaiveDate, end: NaiveDate) -> Result<DatePartition, CalendarError> {
    if start > end {
        return Err(CalendarError::InvalidRange { start, end });
    }

    let mut monthly = Vec::new();
    let last_anchor = month_start(end);
    let mut anchor = month_start(start);
    while anchor < last_anchor {
        monthly.push(DateUnit::monthly(anchor)?);
        anchor = next_month_start(anchor)?;
    }

    // `anchor` now sits on the successor of the last emitted month
    let mut cursor = if monthly.is_empty() { start } else { anchor };

    let mut daily = Vec::new();
    while cursor < end {
        daily.push(DateUnit::daily(cursor));
        cursor += Duration::days(1);
    }

    Ok(DatePartition { monthly, daily })
}
