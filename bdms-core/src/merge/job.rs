//! Merge job planning.
//!
//! For every requested key the builder lists monthly and daily segments,
//! bounds them to the requested window, reconciles the two granularities,
//! checks continuity according to the configured policy, and emits at most
//! one [`MergeJob`]. Anything short of a configuration error only skips the
//! key; the reason is returned alongside the jobs that were built.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info_span, warn};

use super::reconcile::{reconcile, ReconcileError};
use crate::calendar::{validate, ContinuityReport, Granularity, Violation};
use crate::data::{ArchiveLayout, ConcatError, ConcatStats, SegmentCatalog, StreamingConcatenator};
use crate::domain::{ConfigurationError, LogicalKey, OutputFormat, Registry, Segment, StorageFormat};

// ── Options ──

/// Half-open `[start, end)` window applied to segment dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateBounds {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigurationError> {
        if start > end {
            return Err(ConfigurationError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// What a continuity violation does to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuityPolicy {
    /// Do not validate.
    Off,
    /// Log the violation and merge anyway.
    Warn,
    /// Log the violation and skip the key.
    #[default]
    Skip,
    /// Abort the whole request.
    Fatal,
}

impl fmt::Display for ContinuityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContinuityPolicy::Off => "off",
            ContinuityPolicy::Warn => "warn",
            ContinuityPolicy::Skip => "skip",
            ContinuityPolicy::Fatal => "fatal",
        })
    }
}

impl std::str::FromStr for ContinuityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(ContinuityPolicy::Off),
            "warn" => Ok(ContinuityPolicy::Warn),
            "skip" => Ok(ContinuityPolicy::Skip),
            "fatal" => Ok(ContinuityPolicy::Fatal),
            other => Err(format!("unknown continuity policy '{other}' (expected off, warn, skip, fatal)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub source_format: StorageFormat,
    pub output_format: OutputFormat,
    pub bounds: DateBounds,
    pub continuity: ContinuityPolicy,
    /// Enable the identifier guard for data types that declare one.
    pub strict_identifiers: bool,
}

// ── Jobs ──

/// Everything needed to produce one merged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeJob {
    pub key: LogicalKey,
    /// Monthly ascending, then daily ascending.
    pub sources: Vec<Segment>,
    pub destination: PathBuf,
    pub output_format: OutputFormat,
    pub columns: &'static [&'static str],
    pub identifier_column: Option<&'static str>,
}

impl MergeJob {
    /// Concatenate the sources into the destination.
    pub fn run(&self) -> Result<ConcatStats, ConcatError> {
        let mut concat = StreamingConcatenator::new(self.output_format).with_columns(self.columns);
        if let Some(column) = self.identifier_column {
            concat = concat.with_identifier_guard(column);
        }
        concat.run(
            self.sources.iter().map(|s| (s.path.as_path(), s.format)),
            &self.destination,
        )
    }
}

/// Why a key produced no job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Continuity {
        granularity: Granularity,
        violation: Violation,
    },
    Adjacency {
        resume_from: NaiveDate,
        found: NaiveDate,
    },
    EmptySelection,
    Catalog {
        message: String,
    },
    Calendar {
        message: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Continuity { granularity, violation } => {
                write!(f, "{granularity} segments are not continuous: {violation}")
            }
            SkipReason::Adjacency { resume_from, found } => write!(
                f,
                "daily segments start at {found}, not {resume_from}; re-acquire segments from {resume_from}"
            ),
            SkipReason::EmptySelection => f.write_str("no files found within the requested dates"),
            SkipReason::Catalog { message } => write!(f, "segment listing failed: {message}"),
            SkipReason::Calendar { message } => write!(f, "calendar error: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedKey {
    pub key: LogicalKey,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    pub jobs: Vec<MergeJob>,
    pub skipped: Vec<SkippedKey>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{key}: {granularity} segments are not continuous: {violation}")]
    Continuity {
        key: LogicalKey,
        granularity: Granularity,
        violation: Violation,
    },
}

// ── Builder ──

pub struct MergeJobBuilder<'a> {
    catalog: &'a dyn SegmentCatalog,
    layout: &'a ArchiveLayout,
    registry: &'a Registry,
    options: BuildOptions,
}

impl<'a> MergeJobBuilder<'a> {
    pub fn new(
        catalog: &'a dyn SegmentCatalog,
        layout: &'a ArchiveLayout,
        registry: &'a Registry,
        options: BuildOptions,
    ) -> Self {
        Self {
            catalog,
            layout,
            registry,
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Plan every key. Keys are planned in parallel; the outcome keeps the
    /// request order.
    pub fn build(&self, keys: &[LogicalKey]) -> Result<BuildOutcome, BuildError> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key) {
                return Err(ConfigurationError::DuplicateKey(key.to_string()).into());
            }
        }

        let planned: Vec<(&LogicalKey, Result<MergeJob, SkipReason>)> =
            keys.par_iter().map(|key| (key, self.plan(key))).collect();

        let mut outcome = BuildOutcome::default();
        for (key, result) in planned {
            match result {
                Ok(job) => outcome.jobs.push(job),
                Err(SkipReason::Continuity { granularity, violation })
                    if self.options.continuity == ContinuityPolicy::Fatal =>
                {
                    return Err(BuildError::Continuity {
                        key: key.clone(),
                        granularity,
                        violation,
                    });
                }
                Err(reason) => {
                    warn!(key = %key, %reason, "skipping");
                    outcome.skipped.push(SkippedKey {
                        key: key.clone(),
                        reason,
                    });
                }
            }
        }

        if outcome.jobs.is_empty() {
            warn!(requested = keys.len(), "no valid combinations to merge");
        }
        Ok(outcome)
    }

    /// Plan a single key.
    pub fn plan(&self, key: &LogicalKey) -> Result<MergeJob, SkipReason> {
        let _span = info_span!("plan", key = %key).entered();

        let monthly = self.select(key, Granularity::Monthly)?;
        let daily = self.select(key, Granularity::Daily)?;

        let set = reconcile(monthly, daily).map_err(|e| match e {
            ReconcileError::Adjacency(failure) => SkipReason::Adjacency {
                resume_from: failure.expected,
                found: failure.found,
            },
            ReconcileError::Calendar(e) => SkipReason::Calendar {
                message: e.to_string(),
            },
        })?;

        if self.options.continuity != ContinuityPolicy::Off {
            for (granularity, segments) in [
                (Granularity::Monthly, &set.monthly),
                (Granularity::Daily, &set.daily),
            ] {
                let dates: Vec<NaiveDate> = segments.iter().map(|s| s.date).collect();
                if let ContinuityReport::Violated(violation) = validate(&dates, granularity) {
                    if self.options.continuity == ContinuityPolicy::Warn {
                        warn!(%granularity, %violation, "continuity violation, merging anyway");
                    } else {
                        return Err(SkipReason::Continuity { granularity, violation });
                    }
                }
            }
        }

        if set.is_empty() {
            return Err(SkipReason::EmptySelection);
        }

        let mut sources = set.monthly;
        sources.extend(set.daily);
        let data_type = key.data_type();
        Ok(MergeJob {
            key: key.clone(),
            sources,
            destination: self.layout.merged_path(key, self.options.output_format),
            output_format: self.options.output_format,
            columns: self.registry.columns(key.trading_type(), data_type),
            identifier_column: if self.options.strict_identifiers {
                self.registry.identifier_column(data_type)
            } else {
                None
            },
        })
    }

    fn select(&self, key: &LogicalKey, granularity: Granularity) -> Result<Vec<Segment>, SkipReason> {
        let segments = self
            .catalog
            .segments(key, granularity, self.options.source_format)
            .map_err(|e| SkipReason::Catalog { message: e.to_string() })?;
        Ok(segments
            .into_iter()
            .filter(|s| self.options.bounds.contains(s.date))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ViolationKind;
    use crate::data::StaticCatalog;
    use crate::domain::{Interval, MarketDataType, TradingType};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn key(symbol: &str) -> LogicalKey {
        LogicalKey::new(symbol, TradingType::Spot, MarketDataType::AggTrades, None, Registry::standard())
            .unwrap()
    }

    fn options(continuity: ContinuityPolicy) -> BuildOptions {
        BuildOptions {
            source_format: StorageFormat::Zip,
            output_format: OutputFormat::Parquet,
            bounds: DateBounds::new(d(2020, 1, 1), d(2030, 1, 1)).unwrap(),
            continuity,
            strict_identifiers: true,
        }
    }

    fn add(catalog: &mut StaticCatalog, key: &LogicalKey, granularity: Granularity, date: NaiveDate) {
        catalog.insert(
            key.clone(),
            Segment {
                date,
                granularity,
                format: StorageFormat::Zip,
                path: PathBuf::from(format!("{}-{date}.zip", key.symbol())),
            },
        );
    }

    #[test]
    fn bounds_are_half_open() {
        let b = DateBounds::new(d(2024, 1, 1), d(2024, 2, 1)).unwrap();
        assert!(b.contains(d(2024, 1, 1)));
        assert!(b.contains(d(2024, 1, 31)));
        assert!(!b.contains(d(2024, 2, 1)));
        assert!(DateBounds::new(d(2024, 2, 1), d(2024, 1, 1)).is_err());
    }

    #[test]
    fn policy_parses() {
        assert_eq!("FATAL".parse::<ContinuityPolicy>().unwrap(), ContinuityPolicy::Fatal);
        assert!("sometimes".parse::<ContinuityPolicy>().is_err());
        assert_eq!(ContinuityPolicy::default(), ContinuityPolicy::Skip);
    }

    #[test]
    fn job_orders_monthly_before_daily() {
        let k = key("BTCUSDT");
        let mut catalog = StaticCatalog::new();
        add(&mut catalog, &k, Granularity::Daily, d(2024, 3, 2));
        add(&mut catalog, &k, Granularity::Monthly, d(2024, 2, 1));
        add(&mut catalog, &k, Granularity::Daily, d(2024, 3, 1));
        add(&mut catalog, &k, Granularity::Monthly, d(2024, 1, 1));

        let layout = ArchiveLayout::new("/archive");
        let builder = MergeJobBuilder::new(&catalog, &layout, Registry::standard(), options(ContinuityPolicy::Skip));
        let outcome = builder.build(&[k.clone()]).unwrap();

        assert!(outcome.skipped.is_empty());
        let job = &outcome.jobs[0];
        let dates: Vec<NaiveDate> = job.sources.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1), d(2024, 3, 2)]);
        assert_eq!(job.destination, PathBuf::from("/archive/merged/spot/aggTrades/BTCUSDT.parquet"));
        assert_eq!(job.identifier_column, Some("agg_id"));
    }

    #[test]
    fn adjacency_gap_skips_only_that_key() {
        let good = key("BTCUSDT");
        let gap = key("ETHUSDT");
        let mut catalog = StaticCatalog::new();
        add(&mut catalog, &good, Granularity::Monthly, d(2024, 1, 1));
        add(&mut catalog, &gap, Granularity::Monthly, d(2024, 1, 1));
        add(&mut catalog, &gap, Granularity::Daily, d(2024, 3, 1));

        let layout = ArchiveLayout::new("/archive");
        let builder = MergeJobBuilder::new(&catalog, &layout, Registry::standard(), options(ContinuityPolicy::Skip));
        let outcome = builder.build(&[good, gap.clone()]).unwrap();

        assert_eq!(outcome.jobs.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].key, gap);
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::Adjacency {
                resume_from: d(2024, 2, 1),
                found: d(2024, 3, 1),
            }
        );
        assert!(outcome.skipped[0].reason.to_string().contains("2024-02-01"));
    }

    #[test]
    fn continuity_policy_controls_outcome() {
        let k = key("BTCUSDT");
        let mut catalog = StaticCatalog::new();
        add(&mut catalog, &k, Granularity::Daily, d(2024, 5, 1));
        add(&mut catalog, &k, Granularity::Daily, d(2024, 5, 3));
        let layout = ArchiveLayout::new("/archive");
        let registry = Registry::standard();

        let skip = MergeJobBuilder::new(&catalog, &layout, registry, options(ContinuityPolicy::Skip))
            .build(&[k.clone()])
            .unwrap();
        assert!(skip.jobs.is_empty());
        match &skip.skipped[0].reason {
            SkipReason::Continuity { granularity, violation } => {
                assert_eq!(*granularity, Granularity::Daily);
                assert_eq!(violation.kind, ViolationKind::NonUnitStep { days: 2 });
            }
            other => panic!("unexpected skip reason: {other:?}"),
        }

        let warn = MergeJobBuilder::new(&catalog, &layout, registry, options(ContinuityPolicy::Warn))
            .build(&[k.clone()])
            .unwrap();
        assert_eq!(warn.jobs.len(), 1);

        let fatal = MergeJobBuilder::new(&catalog, &layout, registry, options(ContinuityPolicy::Fatal))
            .build(&[k.clone()]);
        assert!(matches!(fatal, Err(BuildError::Continuity { .. })));
    }

    #[test]
    fn out_of_bounds_segments_are_ignored() {
        let k = key("BTCUSDT");
        let mut catalog = StaticCatalog::new();
        add(&mut catalog, &k, Granularity::Daily, d(2019, 12, 31));
        let layout = ArchiveLayout::new("/archive");
        let outcome = MergeJobBuilder::new(&catalog, &layout, Registry::standard(), options(ContinuityPolicy::Skip))
            .build(&[k])
            .unwrap();
        assert_eq!(outcome.skipped[0].reason, SkipReason::EmptySelection);
    }

    #[test]
    fn duplicate_keys_are_a_configuration_error() {
        let k = key("BTCUSDT");
        let catalog = StaticCatalog::new();
        let layout = ArchiveLayout::new("/archive");
        let err = MergeJobBuilder::new(&catalog, &layout, Registry::standard(), options(ContinuityPolicy::Skip))
            .build(&[k.clone(), k])
            .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(ConfigurationError::DuplicateKey(_))));
    }

    #[test]
    fn klines_have_no_identifier_guard() {
        let k = LogicalKey::new(
            "BTCUSDT",
            TradingType::Spot,
            MarketDataType::Klines,
            Some(Interval::H1),
            Registry::standard(),
        )
        .unwrap();
        let mut catalog = StaticCatalog::new();
        add(&mut catalog, &k, Granularity::Monthly, d(2024, 1, 1));
        let layout = ArchiveLayout::new("/archive");
        let job = MergeJobBuilder::new(&catalog, &layout, Registry::standard(), options(ContinuityPolicy::Skip))
            .plan(&k)
            .unwrap();
        assert_eq!(job.identifier_column, None);
        assert_eq!(job.columns.len(), 12);
    }
}
