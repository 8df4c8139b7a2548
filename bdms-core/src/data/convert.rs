//! Single-file format conversion.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::concat::{ConcatError, ConcatStats, StreamingConcatenator};
use crate::domain::{OutputFormat, StorageFormat};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unrecognised input format: {0}")]
    UnknownFormat(PathBuf),

    #[error("{0} is already {1}")]
    SameFormat(PathBuf, OutputFormat),

    #[error(transparent)]
    Concat(#[from] ConcatError),

    #[error("converted {path} but failed to remove the original: {source}")]
    RemoveOriginal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub output: PathBuf,
    pub rows: usize,
}

/// Sibling of `input` with the extension of `format`.
pub fn converted_path(input: &Path, format: OutputFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// Rewrite `input` as `format` next to it (same stem, new extension).
///
/// The original is only removed after the converted file is in place.
pub fn convert_file(
    input: &Path,
    format: OutputFormat,
    delete_original: bool,
    columns: Option<&[&str]>,
) -> Result<Converted, ConvertError> {
    let source_format =
        StorageFormat::from_path(input).ok_or_else(|| ConvertError::UnknownFormat(input.to_path_buf()))?;
    if source_format == format.as_storage() {
        return Err(ConvertError::SameFormat(input.to_path_buf(), format));
    }

    let output = converted_path(input, format);
    let mut concat = StreamingConcatenator::new(format);
    if let Some(columns) = columns {
        concat = concat.with_columns(columns);
    }
    let ConcatStats { rows, .. } = concat.run([(input, source_format)], &output)?;

    if delete_original {
        fs::remove_file(input).map_err(|source| ConvertError::RemoveOriginal {
            path: input.to_path_buf(),
            source,
        })?;
    }
    info!(input = %input.display(), output = %output.display(), rows, "converted");
    Ok(Converted { output, rows })
}
