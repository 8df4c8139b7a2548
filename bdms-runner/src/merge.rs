//! Merge request pipeline: expand keys, plan jobs, run them on the pool,
//! collect a report.

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use bdms_core::data::{ConcatError, ConcatStats, DirectoryCatalog, SegmentCatalog};
use bdms_core::domain::{ConfigurationError, LogicalKey, Registry};
use bdms_core::merge::{BuildError, MergeJob, MergeJobBuilder};

use crate::config::{ConfigError, MergeConfig};
use crate::executor::{ExecutorError, ExecutorProgress, ParallelExecutor, PoolJob};
use crate::report::{FailedEntry, MergeReport, MergedEntry};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("planning aborted: {0}")]
    Build(#[from] BuildError),

    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identity of a merge job in executor outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTaskId {
    pub key: LogicalKey,
    pub destination: PathBuf,
}

impl fmt::Display for MergeTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key, self.destination.display())
    }
}

/// A [`MergeJob`] as the pool sees it.
pub struct MergeTask(pub MergeJob);

impl PoolJob for MergeTask {
    type Id = MergeTaskId;
    type Output = ConcatStats;
    type Error = ConcatError;

    fn id(&self) -> MergeTaskId {
        MergeTaskId {
            key: self.0.key.clone(),
            destination: self.0.destination.clone(),
        }
    }

    fn run(self) -> Result<ConcatStats, ConcatError> {
        self.0.run()
    }
}

/// Run a merge request against the directory archive described by `config`.
pub fn run_merge(
    config: &MergeConfig,
    registry: &Registry,
    today: NaiveDate,
    progress: Option<&dyn Fn(&ExecutorProgress)>,
) -> Result<MergeReport, RunError> {
    let catalog = DirectoryCatalog::new(config.layout());
    run_merge_with(config, &catalog, registry, today, progress)
}

/// Same as [`run_merge`] with an explicit segment catalog.
pub fn run_merge_with(
    config: &MergeConfig,
    catalog: &dyn SegmentCatalog,
    registry: &Registry,
    today: NaiveDate,
    progress: Option<&dyn Fn(&ExecutorProgress)>,
) -> Result<MergeReport, RunError> {
    let keys = config.keys(registry)?;
    let options = config.build_options(today)?;
    let layout = config.layout();

    let outcome = MergeJobBuilder::new(catalog, &layout, registry, options).build(&keys)?;
    info!(
        keys = keys.len(),
        jobs = outcome.jobs.len(),
        skipped = outcome.skipped.len(),
        start = %options.bounds.start(),
        end = %options.bounds.end(),
        "merge planned"
    );

    let tasks: Vec<MergeTask> = outcome.jobs.into_iter().map(MergeTask).collect();
    let results = ParallelExecutor::new(config.executor).run(tasks, progress)?;

    let mut report = MergeReport {
        requested: keys.len(),
        bounds: options.bounds,
        merged: Vec::new(),
        skipped: outcome.skipped,
        failed: Vec::new(),
    };
    for outcome in results {
        let MergeTaskId { key, destination } = outcome.id;
        match outcome.result {
            Ok(stats) => report.merged.push(MergedEntry {
                key,
                destination,
                segments: stats.segments,
                rows: stats.rows,
            }),
            Err(failure) => report.failed.push(FailedEntry {
                key,
                destination,
                failure,
            }),
        }
    }
    report.sort();
    info!(summary = %report.summary(), "merge finished");
    Ok(report)
}
