//! Physical segment files and their storage formats.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::registry::ConfigurationError;
use crate::calendar::Granularity;

/// On-disk encoding of a raw segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// A single CSV table wrapped in a zip archive.
    Zip,
    Csv,
    Parquet,
}

impl StorageFormat {
    pub const ALL: [StorageFormat; 3] = [StorageFormat::Zip, StorageFormat::Csv, StorageFormat::Parquet];

    pub fn extension(self) -> &'static str {
        match self {
            StorageFormat::Zip => "zip",
            StorageFormat::Csv => "csv",
            StorageFormat::Parquet => "parquet",
        }
    }

    pub fn is_columnar(self) -> bool {
        matches!(self, StorageFormat::Parquet)
    }

    /// Format implied by a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        StorageFormat::ALL.into_iter().find(|f| f.extension() == ext)
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for StorageFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageFormat::ALL
            .into_iter()
            .find(|f| f.extension() == s.to_ascii_lowercase())
            .ok_or_else(|| ConfigurationError::UnknownFormat(s.to_string()))
    }
}

/// Encoding of a merged (or converted) destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Row-oriented text table with a single header row.
    Csv,
    /// Columnar table, zstd-compressed.
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }

    pub fn as_storage(self) -> StorageFormat {
        match self {
            OutputFormat::Csv => StorageFormat::Csv,
            OutputFormat::Parquet => StorageFormat::Parquet,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            _ => Err(ConfigurationError::UnknownFormat(s.to_string())),
        }
    }
}

/// One discovered file covering a single month or day of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub date: NaiveDate,
    pub granularity: Granularity,
    pub format: StorageFormat,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path_ignores_case() {
        assert_eq!(
            StorageFormat::from_path(Path::new("a/BTCUSDT-1m-2024-01.ZIP")),
            Some(StorageFormat::Zip)
        );
        assert_eq!(StorageFormat::from_path(Path::new("a/notes.txt")), None);
        assert_eq!(StorageFormat::from_path(Path::new("a/noext")), None);
    }

    #[test]
    fn output_format_parses() {
        assert_eq!("Parquet".parse::<OutputFormat>().unwrap(), OutputFormat::Parquet);
        assert!("zip".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Csv.as_storage(), StorageFormat::Csv);
    }
}
