//! Reconciliation of monthly and daily segments and merge job planning.

pub mod job;
pub mod reconcile;

pub use job::{
    BuildError, BuildOptions, BuildOutcome, ContinuityPolicy, DateBounds, MergeJob, MergeJobBuilder, SkipReason,
    SkippedKey,
};
pub use reconcile::{reconcile, AdjacencyFailure, Dated, ReconcileError, ReconciledSet};
