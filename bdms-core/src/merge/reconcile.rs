//! Monthly/daily overlap removal and adjacency check.
//!
//! A monthly segment stands for its whole calendar month, so months and days
//! are reconciled by month membership rather than by exact day ranges.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::calendar::{next_month_start, year_month, CalendarError};
use crate::domain::Segment;

/// Anything carrying the calendar date of the segment it stands for.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for NaiveDate {
    fn date(&self) -> NaiveDate {
        *self
    }
}

impl Dated for Segment {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Monthly and daily items after overlap removal, both ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledSet<T> {
    pub monthly: Vec<T>,
    pub daily: Vec<T>,
    /// Daily dates already covered by a monthly segment.
    pub dropped_overlap: Vec<NaiveDate>,
    /// Daily dates earlier than the first monthly date.
    pub dropped_early: Vec<NaiveDate>,
}

impl<T> ReconciledSet<T> {
    pub fn is_empty(&self) -> bool {
        self.monthly.is_empty() && self.daily.is_empty()
    }

    pub fn len(&self) -> usize {
        self.monthly.len() + self.daily.len()
    }
}

/// Daily data does not pick up where monthly data ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error("daily segments start at {found} but must start at {expected}; re-acquire segments from {expected}")]
pub struct AdjacencyFailure {
    pub expected: NaiveDate,
    pub found: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Adjacency(#[from] AdjacencyFailure),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Remove double-counted days and check that daily data begins exactly on
/// the month after the last monthly anchor.
pub fn reconcile<T: Dated>(mut monthly: Vec<T>, mut daily: Vec<T>) -> Result<ReconciledSet<T>, ReconcileError> {
    monthly.sort_by_key(Dated::date);
    daily.sort_by_key(Dated::date);

    let covered: HashSet<(i32, u32)> = monthly.iter().map(|m| year_month(m.date())).collect();
    let first_month = monthly.first().map(Dated::date);

    let mut dropped_overlap = Vec::new();
    let mut dropped_early = Vec::new();
    daily.retain(|d| {
        let date = d.date();
        if covered.contains(&year_month(date)) {
            dropped_overlap.push(date);
            false
        } else if first_month.is_some_and(|first| date < first) {
            dropped_early.push(date);
            false
        } else {
            true
        }
    });

    if let (Some(first), Some(last)) = (dropped_early.first(), dropped_early.last()) {
        warn!(
            count = dropped_early.len(),
            %first,
            %last,
            "daily segments predate the monthly window and are discarded"
        );
    }

    if let (Some(last_month), Some(first_day)) = (monthly.last(), daily.first()) {
        let expected = next_month_start(last_month.date())?;
        if first_day.date() != expected {
            return Err(AdjacencyFailure {
                expected,
                found: first_day.date(),
            }
            .into());
        }
    }

    Ok(ReconciledSet {
        monthly,
        daily,
        dropped_overlap,
        dropped_early,
    })
}
