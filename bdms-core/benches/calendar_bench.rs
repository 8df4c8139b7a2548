//! Criterion benchmarks for the calendar and reconciliation hot paths.
//!
//! Benchmarks:
//! 1. Range partitioning over spans of increasing length
//! 2. Continuity validation of long daily sequences
//! 3. Reconciliation of overlapping monthly and daily sets

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bdms_core::calendar::{partition, validate, Granularity};
use bdms_core::merge::reconcile;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 8, 15).unwrap()
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    for years in [1i64, 5, 20] {
        let end = start() + Duration::days(365 * years);
        group.bench_with_input(BenchmarkId::from_parameter(years), &end, |b, &end| {
            b.iter(|| partition(black_box(start()), black_box(end)))
        });
    }
    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let days: Vec<NaiveDate> = (0..10_000).map(|i| start() + Duration::days(i)).collect();
    c.bench_function("validate_daily_10k", |b| {
        b.iter(|| validate(black_box(&days), Granularity::Daily))
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let end = start() + Duration::days(365 * 8);
    let parts = partition(start(), end).unwrap();
    let monthly = parts.monthly_dates();
    // every day of the range, so most are dropped as overlap
    let daily: Vec<NaiveDate> = (0..365 * 8).map(|i| start() + Duration::days(i)).collect();
    c.bench_function("reconcile_overlap_8y", |b| {
        b.iter(|| reconcile(black_box(monthly.clone()), black_box(daily.clone())))
    });
}

criterion_group!(benches, bench_partition, bench_validate, bench_reconcile);
criterion_main!(benches);
