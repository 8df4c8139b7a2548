//! Segment discovery.
//!
//! A catalog answers one question: which segment files exist for a key at a
//! granularity in a given storage format. The merge planner only talks to the
//! [`SegmentCatalog`] trait, so tests and alternative stores can feed it
//! directly.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use super::layout::{extract_date, ArchiveLayout};
use crate::calendar::Granularity;
use crate::domain::{LogicalKey, Segment, StorageFormat};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to list segments in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of segment listings. Returned segments are sorted by date.
pub trait SegmentCatalog: Send + Sync {
    fn segments(
        &self,
        key: &LogicalKey,
        granularity: Granularity,
        format: StorageFormat,
    ) -> Result<Vec<Segment>, CatalogError>;
}

/// Lists segments from the archive directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    layout: ArchiveLayout,
}

impl DirectoryCatalog {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }
}

impl SegmentCatalog for DirectoryCatalog {
    fn segments(
        &self,
        key: &LogicalKey,
        granularity: Granularity,
        format: StorageFormat,
    ) -> Result<Vec<Segment>, CatalogError> {
        let dir = self.layout.segment_dir(key, granularity);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CatalogError::Io { path: dir, source }),
        };

        let mut segments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CatalogError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || StorageFormat::from_path(&path) != Some(format) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match extract_date(name) {
                Some((date, found)) if found == granularity => segments.push(Segment {
                    date,
                    granularity,
                    format,
                    path,
                }),
                Some((_, found)) => {
                    debug!(file = %path.display(), expected = %granularity, %found, "granularity mismatch, ignoring");
                }
                None => {
                    debug!(file = %path.display(), "no date in file name, ignoring");
                }
            }
        }
        segments.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
        Ok(segments)
    }
}

/// In-memory catalog fed by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<(LogicalKey, Granularity), Vec<Segment>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: LogicalKey, segment: Segment) {
        self.entries
            .entry((key, segment.granularity))
            .or_default()
            .push(segment);
    }
}

impl SegmentCatalog for StaticCatalog {
    fn segments(
        &self,
        key: &LogicalKey,
        granularity: Granularity,
        format: StorageFormat,
    ) -> Result<Vec<Segment>, CatalogError> {
        let mut segments: Vec<Segment> = self
            .entries
            .get(&(key.clone(), granularity))
            .map(|list| list.iter().filter(|s| s.format == format).cloned().collect())
            .unwrap_or_default();
        segments.sort_by_key(|s| s.date);
        Ok(segments)
    }
}
