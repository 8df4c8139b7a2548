//! Property tests for the calendar and reconciliation invariants.
//!
//! Uses proptest to verify:
//! 1. Partition tiling: monthly + daily coverage is every day of the range once
//! 2. Partition output is continuous, and breaks when a middle element is removed
//! 3. Reconciliation never keeps a daily date inside a monthly-covered month

use chrono::{Datelike, Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::HashSet;

use bdms_core::calendar::{month_start, partition, validate, Granularity};
use bdms_core::merge::reconcile;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    // 2015-01-01 .. roughly 2035
    (0i64..7300).prop_map(|offset| NaiveDate::from_ymd_opt(2015, 1, 1).unwrap() + Duration::days(offset))
}

fn arb_range() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (arb_date(), 0i64..1200).prop_map(|(start, len)| (start, start + Duration::days(len)))
}

fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day < end {
        days.push(day);
        day += Duration::days(1);
    }
    days
}

// ── 1. Partition tiling ──────────────────────────────────────────────

proptest! {
    /// Coverage is exact and ascending. An unaligned start is widened to its
    /// month start once a whole month is emitted.
    #[test]
    fn partition_tiles_range((start, end) in arb_range()) {
        let parts = partition(start, end).unwrap();
        let effective_start = if parts.monthly.is_empty() { start } else { month_start(start) };
        prop_assert_eq!(parts.covered_days().unwrap(), days_between(effective_start, end));
    }

    /// Aligned starts are tiled without widening.
    #[test]
    fn aligned_partition_is_exact((start, end) in arb_range()) {
        let start = month_start(start);
        let parts = partition(start, end.max(start)).unwrap();
        prop_assert_eq!(parts.covered_days().unwrap(), days_between(start, end.max(start)));
    }

    #[test]
    fn monthly_units_sit_on_first_of_month((start, end) in arb_range()) {
        let parts = partition(start, end).unwrap();
        prop_assert!(parts.monthly_dates().iter().all(|d| d.day() == 1));
    }
}

// ── 2. Continuity of partition output ────────────────────────────────

proptest! {
    #[test]
    fn partition_output_is_continuous((start, end) in arb_range()) {
        let parts = partition(start, end).unwrap();
        prop_assert!(validate(&parts.monthly_dates(), Granularity::Monthly).is_valid());
        prop_assert!(validate(&parts.daily_dates(), Granularity::Daily).is_valid());
    }

    #[test]
    fn removing_a_middle_element_breaks_continuity((start, end) in arb_range(), pick in any::<prop::sample::Index>()) {
        let parts = partition(start, end).unwrap();
        for (mut dates, granularity) in [
            (parts.monthly_dates(), Granularity::Monthly),
            (parts.daily_dates(), Granularity::Daily),
        ] {
            if dates.len() >= 3 {
                let middle = 1 + pick.index(dates.len() - 2);
                dates.remove(middle);
                prop_assert!(!validate(&dates, granularity).is_valid());
            }
        }
    }
}

// ── 3. Reconciliation month membership ───────────────────────────────

proptest! {
    #[test]
    fn reconciled_days_avoid_monthly_months(
        monthly in prop::collection::vec(arb_date(), 0..12),
        daily in prop::collection::vec(arb_date(), 0..60),
    ) {
        let monthly: Vec<NaiveDate> = monthly.into_iter().map(month_start).collect();
        let covered: HashSet<(i32, u32)> = monthly.iter().map(|d| (d.year(), d.month())).collect();

        if let Ok(set) = reconcile(monthly, daily) {
            prop_assert!(set.daily.iter().all(|d| !covered.contains(&(d.year(), d.month()))));
            if let Some(first) = set.monthly.first() {
                prop_assert!(set.daily.iter().all(|d| d >= first));
            }
        }
    }

    /// A partition always reconciles with itself.
    #[test]
    fn partition_output_reconciles((start, end) in arb_range()) {
        let parts = partition(start, end).unwrap();
        let set = reconcile(parts.monthly_dates(), parts.daily_dates()).unwrap();
        prop_assert_eq!(set.len(), parts.monthly.len() + parts.daily.len());
        prop_assert!(set.dropped_overlap.is_empty());
    }
}
