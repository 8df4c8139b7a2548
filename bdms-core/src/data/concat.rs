//! Streaming concatenation of ordered segments into one destination file.
//!
//! Segments are read one at a time and appended to the destination in the
//! order given, so peak memory is bounded by the largest single segment.
//! Output goes to `{destination}.tmp` and is renamed into place only after
//! the writer is finalised; any failure removes both the temp file and any
//! stale destination, so a partial merge never survives on disk.

use polars::io::parquet::write::BatchedWriter;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::reader::{read_segment, ReadError};
use crate::domain::{OutputFormat, StorageFormat};

#[derive(Debug, Error)]
pub enum ConcatError {
    #[error("no source segments to concatenate")]
    NoSources,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    #[error("schema of {path} differs from the first segment: {detail}")]
    SchemaMismatch { path: PathBuf, detail: String },

    #[error("identifier column '{column}' missing or non-integer in {path}")]
    MissingIdentifier { path: PathBuf, column: String },

    #[error("identifier continuity broken at {path}: expected first {column} {expected}, found {found}")]
    ContinuityBreak {
        path: PathBuf,
        column: String,
        expected: i64,
        found: i64,
    },

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("failed to append {path} to {destination}: {reason}")]
    Append {
        path: PathBuf,
        destination: PathBuf,
        reason: String,
    },
}

impl ConcatError {
    /// The file the failure is attributed to.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConcatError::NoSources => None,
            ConcatError::Read { path, .. }
            | ConcatError::SchemaMismatch { path, .. }
            | ConcatError::MissingIdentifier { path, .. }
            | ConcatError::ContinuityBreak { path, .. }
            | ConcatError::Write { path, .. }
            | ConcatError::Append { path, .. } => Some(path),
        }
    }
}

/// Totals for one successful concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConcatStats {
    pub segments: usize,
    pub rows: usize,
}

/// Appends segments into one destination of a fixed output format.
#[derive(Debug, Clone, Copy)]
pub struct StreamingConcatenator<'a> {
    output_format: OutputFormat,
    columns: Option<&'a [&'a str]>,
    identifier_column: Option<&'a str>,
}

impl<'a> StreamingConcatenator<'a> {
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            columns: None,
            identifier_column: None,
        }
    }

    /// Column names applied to headerless CSV segments.
    pub fn with_columns(mut self, columns: &'a [&'a str]) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Require each segment's first `column` value to follow the previous
    /// segment's last value by exactly one.
    pub fn with_identifier_guard(mut self, column: &'a str) -> Self {
        self.identifier_column = Some(column);
        self
    }

    pub fn run<'p, I>(&self, sources: I, destination: &Path) -> Result<ConcatStats, ConcatError>
    where
        I: IntoIterator<Item = (&'p Path, StorageFormat)>,
    {
        let sources: Vec<(&Path, StorageFormat)> = sources.into_iter().collect();
        if sources.is_empty() {
            return Err(ConcatError::NoSources);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(destination, e))?;
        }
        let tmp = temp_path(destination);

        let result = self
            .write_all(&sources, &tmp)
            .and_then(|stats| {
                fs::rename(&tmp, destination).map_err(|e| write_error(destination, e))?;
                Ok(stats)
            });

        if let Err(e) = &result {
            discard(&tmp);
            discard(destination);
            warn!(destination = %destination.display(), error = %e, "concatenation failed, partial output removed");
        }
        result
    }

    fn write_all(&self, sources: &[(&Path, StorageFormat)], tmp: &Path) -> Result<ConcatStats, ConcatError> {
        let mut sink: Option<Sink> = None;
        let mut last_path = None;
        let mut guard = self.identifier_column.map(IdentifierGuard::new);
        let mut stats = ConcatStats::default();

        for &(path, format) in sources {
            let mut df = read_segment(path, format, self.columns).map_err(|source| ConcatError::Read {
                path: path.to_path_buf(),
                source,
            })?;

            if let Some(guard) = guard.as_mut() {
                guard.observe(&df, path)?;
            }

            match sink.as_mut() {
                None => {
                    let mut opened =
                        Sink::open(self.output_format, tmp, &df).map_err(|e| append_error(path, tmp, e))?;
                    opened.append(&mut df, true).map_err(|e| append_error(path, tmp, e))?;
                    sink = Some(opened);
                }
                Some(open) => {
                    open.check_schema(&df, path)?;
                    open.append(&mut df, false).map_err(|e| append_error(path, tmp, e))?;
                }
            }

            last_path = Some(path);
            stats.segments += 1;
            stats.rows += df.height();
            debug!(segment = %path.display(), rows = df.height(), "appended");
        }

        match (sink, last_path) {
            (Some(sink), Some(last)) => sink.finish().map_err(|e| append_error(last, tmp, e))?,
            _ => return Err(ConcatError::NoSources),
        }
        Ok(stats)
    }
}

// ── Output sinks ──

enum Sink {
    Csv {
        writer: BufWriter<File>,
        columns: Vec<String>,
    },
    Parquet {
        writer: BatchedWriter<File>,
        fields: Vec<Field>,
    },
}

impl Sink {
    fn open(format: OutputFormat, tmp: &Path, first: &DataFrame) -> Result<Self, String> {
        let file = File::create(tmp).map_err(|e| e.to_string())?;
        match format {
            OutputFormat::Csv => Ok(Sink::Csv {
                writer: BufWriter::new(file),
                columns: column_names(first),
            }),
            OutputFormat::Parquet => {
                let schema = Schema::from_iter(first.schema().iter_fields());
                let writer = ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Zstd(None))
                    .batched(&schema)
                    .map_err(|e| e.to_string())?;
                Ok(Sink::Parquet {
                    writer,
                    fields: schema.iter_fields().collect(),
                })
            }
        }
    }

    fn check_schema(&self, df: &DataFrame, path: &Path) -> Result<(), ConcatError> {
        let detail = match self {
            Sink::Csv { columns, .. } => {
                let found = column_names(df);
                (&found != columns).then(|| format!("columns {found:?}, expected {columns:?}"))
            }
            Sink::Parquet { fields, .. } => {
                let found: Vec<Field> = df.schema().iter_fields().collect();
                (&found != fields).then(|| format!("fields {found:?}, expected {fields:?}"))
            }
        };
        match detail {
            Some(detail) => Err(ConcatError::SchemaMismatch {
                path: path.to_path_buf(),
                detail,
            }),
            None => Ok(()),
        }
    }

    fn append(&mut self, df: &mut DataFrame, first: bool) -> Result<(), String> {
        match self {
            Sink::Csv { writer, .. } => CsvWriter::new(writer)
                .include_header(first)
                .finish(df)
                .map_err(|e| e.to_string()),
            Sink::Parquet { writer, .. } => writer.write_batch(df).map_err(|e| e.to_string()),
        }
    }

    fn finish(self) -> Result<(), String> {
        match self {
            Sink::Csv { mut writer, .. } => {
                writer.flush().map_err(|e| e.to_string())?;
                writer.get_ref().sync_all().map_err(|e| e.to_string())
            }
            Sink::Parquet { writer, .. } => {
                writer.finish().map_err(|e| e.to_string())?;
                Ok(())
            }
        }
    }
}

// ── Identifier guard ──

struct IdentifierGuard<'a> {
    column: &'a str,
    last: Option<i64>,
}

impl<'a> IdentifierGuard<'a> {
    fn new(column: &'a str) -> Self {
        Self { column, last: None }
    }

    fn observe(&mut self, df: &DataFrame, path: &Path) -> Result<(), ConcatError> {
        if df.height() == 0 {
            return Ok(());
        }
        let missing = || ConcatError::MissingIdentifier {
            path: path.to_path_buf(),
            column: self.column.to_string(),
        };
        let ids = df
            .column(self.column)
            .and_then(|c| c.cast(&DataType::Int64))
            .map_err(|_| missing())?;
        let ids = ids.i64().map_err(|_| missing())?;
        let (Some(first), Some(last)) = (ids.get(0), ids.get(ids.len() - 1)) else {
            return Err(missing());
        };

        if let Some(previous) = self.last {
            let expected = previous + 1;
            if first != expected {
                return Err(ConcatError::ContinuityBreak {
                    path: path.to_path_buf(),
                    column: self.column.to_string(),
                    expected,
                    found: first,
                });
            }
        }
        self.last = Some(last);
        Ok(())
    }
}

// ── Helpers ──

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

/// A failure while writing `segment` into the temp destination.
fn append_error(segment: &Path, tmp: &Path, reason: String) -> ConcatError {
    ConcatError::Append {
        path: segment.to_path_buf(),
        destination: tmp.to_path_buf(),
        reason,
    }
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> ConcatError {
    ConcatError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// `{destination}.tmp` in the same directory, so the final rename stays on
/// one filesystem.
pub fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    destination.with_file_name(name)
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial output");
        }
    }
}
