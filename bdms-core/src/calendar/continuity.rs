//! Gap detection over ordered date sequences.
//!
//! A report is a value: callers decide whether a violation skips a key, is
//! only logged, or aborts the request.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

use super::unit::Granularity;

/// Shortest and longest distance between consecutive month anchors.
pub const MIN_MONTH_GAP_DAYS: i64 = 28;
pub const MAX_MONTH_GAP_DAYS: i64 = 31;

/// Why a consecutive pair of dates breaks continuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A monthly date that is not the first of its month.
    MisalignedAnchor,
    /// Monthly dates further apart than one month.
    GapTooLarge { days: i64 },
    /// Monthly dates closer than one month (including duplicates and reversals).
    GapTooSmall { days: i64 },
    /// Daily dates that are not exactly one day apart.
    NonUnitStep { days: i64 },
}

/// The first offending pair found by a left-to-right scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub previous: NaiveDate,
    pub next: NaiveDate,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::MisalignedAnchor => write!(
                f,
                "invalid date {} or {}: monthly dates must be the first of the month",
                self.next, self.previous
            ),
            ViolationKind::GapTooLarge { days } => write!(
                f,
                "{} is {days} days after {} (more than {MAX_MONTH_GAP_DAYS})",
                self.next, self.previous
            ),
            ViolationKind::GapTooSmall { days } => write!(
                f,
                "{} is {days} days after {} (less than {MIN_MONTH_GAP_DAYS})",
                self.next, self.previous
            ),
            ViolationKind::NonUnitStep { days } => write!(
                f,
                "{} is not the day after {} ({days} days apart)",
                self.next, self.previous
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContinuityReport {
    Valid,
    Violated(Violation),
}

impl ContinuityReport {
    pub fn is_valid(&self) -> bool {
        matches!(self, ContinuityReport::Valid)
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            ContinuityReport::Valid => None,
            ContinuityReport::Violated(v) => Some(v),
        }
    }
}

/// Check that `dates` has no gaps and no misaligned anchors at `granularity`.
///
/// Sequences with zero or one element are trivially valid.
pub fn validate(dates: &[NaiveDate], granularity: Granularity) -> ContinuityReport {
    for pair in dates.windows(2) {
        let (previous, next) = (pair[0], pair[1]);
        if let Some(kind) = check_pair(previous, next, granularity) {
            return ContinuityReport::Violated(Violation {
                previous,
                next,
                kind,
            });
        }
    }
    ContinuityReport::Valid
}

fn check_pair(previous: NaiveDate, next: NaiveDate, granularity: Granularity) -> Option<ViolationKind> {
    let days = (next - previous).num_days();
    match granularity {
        Granularity::Monthly => {
            if previous.day() != 1 || next.day() != 1 {
                Some(ViolationKind::MisalignedAnchor)
            } else if days > MAX_MONTH_GAP_DAYS {
                Some(ViolationKind::GapTooLarge { days })
            } else if days < MIN_MONTH_GAP_DAYS {
                Some(ViolationKind::GapTooSmall { days })
            } else {
                None
            }
        }
        Granularity::Daily => (days != 1).then_some(ViolationKind::NonUnitStep { days }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn short_sequences_are_valid() {
        assert!(validate(&[], Granularity::Monthly).is_valid());
        assert!(validate(&[d(2024, 1, 7)], Granularity::Monthly).is_valid());
        assert!(validate(&[d(2024, 1, 7)], Granularity::Daily).is_valid());
    }

    #[test]
    fn february_gap_is_accepted() {
        let dates = [d(2023, 1, 1), d(2023, 2, 1), d(2023, 3, 1), d(2023, 4, 1)];
        assert!(validate(&dates, Granularity::Monthly).is_valid());
    }

    #[test]
    fn missing_month_is_gap_too_large() {
        let report = validate(&[d(2024, 1, 1), d(2024, 3, 1)], Granularity::Monthly);
        assert_eq!(
            report.violation().unwrap().kind,
            ViolationKind::GapTooLarge { days: 60 }
        );
    }

    #[test]
    fn duplicate_month_is_gap_too_small() {
        let report = validate(&[d(2024, 1, 1), d(2024, 1, 1)], Granularity::Monthly);
        assert_eq!(
            report.violation().unwrap().kind,
            ViolationKind::GapTooSmall { days: 0 }
        );
    }

    #[test]
    fn mid_month_anchor_is_misaligned() {
        let report = validate(&[d(2024, 1, 1), d(2024, 2, 2)], Granularity::Monthly);
        assert_eq!(report.violation().unwrap().kind, ViolationKind::MisalignedAnchor);
    }

    #[test]
    fn first_violation_wins() {
        let dates = [d(2024, 1, 1), d(2024, 1, 3), d(2024, 1, 4), d(2024, 1, 9)];
        let v = *validate(&dates, Granularity::Daily).violation().unwrap();
        assert_eq!(v.previous, d(2024, 1, 1));
        assert_eq!(v.next, d(2024, 1, 3));
        assert_eq!(v.kind, ViolationKind::NonUnitStep { days: 2 });
    }

    #[test]
    fn violation_message_names_both_dates() {
        let report = validate(&[d(2024, 1, 1), d(2024, 1, 3)], Granularity::Daily);
        let msg = report.violation().unwrap().to_string();
        assert!(msg.contains("2024-01-03"));
        assert!(msg.contains("2024-01-01"));
    }
}
