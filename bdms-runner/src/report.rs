//! Serialisable outcome of a merge or conversion request.

use serde::Serialize;
use std::path::PathBuf;

use bdms_core::domain::LogicalKey;
use bdms_core::merge::{DateBounds, SkippedKey};

use crate::executor::JobFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedEntry {
    pub key: LogicalKey,
    pub destination: PathBuf,
    pub segments: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub key: LogicalKey,
    pub destination: PathBuf,
    pub failure: JobFailure,
}

/// Everything a merge request produced, skipped, or failed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub requested: usize,
    pub bounds: DateBounds,
    pub merged: Vec<MergedEntry>,
    pub skipped: Vec<SkippedKey>,
    pub failed: Vec<FailedEntry>,
}

impl MergeReport {
    /// True when no job failed. Skipped keys do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} requested: {} merged, {} skipped, {} failed",
            self.requested,
            self.merged.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Sort every section by key so reports from different runs diff cleanly.
    pub fn sort(&mut self) {
        self.merged.sort_by(|a, b| a.key.cmp(&b.key));
        self.skipped.sort_by(|a, b| a.key.cmp(&b.key));
        self.failed.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertFailure {
    pub input: PathBuf,
    pub failure: JobFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertReport {
    pub converted: Vec<ConvertedEntry>,
    pub failed: Vec<ConvertFailure>,
}

impl ConvertReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("{} converted, {} failed", self.converted.len(), self.failed.len())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
