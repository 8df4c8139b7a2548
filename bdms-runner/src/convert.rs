//! Bulk conversion: discover files of one format, shuffle them, convert each
//! on the worker pool.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use bdms_core::data::{convert_file, ConvertError, Converted};
use bdms_core::domain::{OutputFormat, Registry, StorageFormat};

use crate::config::ConvertConfig;
use crate::executor::{ExecutorProgress, ParallelExecutor, PoolJob};
use crate::merge::RunError;
use crate::report::{ConvertFailure, ConvertReport, ConvertedEntry};

pub struct ConvertTask {
    pub input: PathBuf,
    pub output_format: OutputFormat,
    pub delete_original: bool,
    pub columns: Option<&'static [&'static str]>,
}

impl PoolJob for ConvertTask {
    type Id = PathDisplay;
    type Output = Converted;
    type Error = ConvertError;

    fn id(&self) -> PathDisplay {
        PathDisplay(self.input.clone())
    }

    fn run(self) -> Result<Converted, ConvertError> {
        convert_file(&self.input, self.output_format, self.delete_original, self.columns)
    }
}

/// A path that formats as its display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDisplay(pub PathBuf);

impl std::fmt::Display for PathDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Every file under `dir` whose extension matches `format`, sorted.
pub fn discover_inputs(dir: &Path, format: StorageFormat, recursive: bool) -> Result<Vec<PathBuf>, RunError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|source| RunError::Scan {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| RunError::Scan {
                    path: current.clone(),
                    source,
                })?
                .path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if StorageFormat::from_path(&path) == Some(format) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

pub fn run_convert(
    config: &ConvertConfig,
    registry: &Registry,
    progress: Option<&dyn Fn(&ExecutorProgress)>,
) -> Result<ConvertReport, RunError> {
    let columns = config.columns(registry)?;
    let mut inputs = discover_inputs(&config.input_dir, config.input_format, config.recursive)?;
    if inputs.is_empty() {
        warn!(dir = %config.input_dir.display(), format = %config.input_format, "no files to convert");
        return Ok(ConvertReport::default());
    }

    // interleave large and small files instead of processing them in name order
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    inputs.shuffle(&mut rng);
    info!(files = inputs.len(), from = %config.input_format, to = %config.output_format, "converting");

    let tasks: Vec<ConvertTask> = inputs
        .into_iter()
        .map(|input| ConvertTask {
            input,
            output_format: config.output_format,
            delete_original: config.delete_original,
            columns,
        })
        .collect();
    let results = ParallelExecutor::new(config.executor).run(tasks, progress)?;

    let mut report = ConvertReport::default();
    for outcome in results {
        let PathDisplay(input) = outcome.id;
        match outcome.result {
            Ok(Converted { output, rows }) => report.converted.push(ConvertedEntry { input, output, rows }),
            Err(failure) => report.failed.push(ConvertFailure { input, failure }),
        }
    }
    report.converted.sort_by(|a, b| a.input.cmp(&b.input));
    report.failed.sort_by(|a, b| a.input.cmp(&b.input));
    info!(summary = %report.summary(), "conversion finished");
    Ok(report)
}
