//! BDMS Runner: merge orchestration on top of `bdms-core`.
//!
//! - TOML/serde configuration for merge and conversion requests
//! - Bounded worker pool with job budgets and fault isolation
//! - Merge pipeline (keys, planning, execution, report)
//! - Bulk conversion pipeline
//! - JSON-serialisable reports

pub mod config;
pub mod convert;
pub mod executor;
pub mod merge;
pub mod report;

pub use config::{ConfigError, ConvertConfig, MergeConfig};
pub use convert::{discover_inputs, run_convert, ConvertTask};
pub use executor::{ExecutorError, ExecutorOptions, ExecutorProgress, JobFailure, JobOutcome, ParallelExecutor, PoolJob};
pub use merge::{run_merge, run_merge_with, MergeTask, MergeTaskId, RunError};
pub use report::{ConvertReport, MergeReport};
