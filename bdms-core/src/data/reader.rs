//! Load one segment file into a DataFrame.
//!
//! Archive CSVs come both with and without a header row. A table whose first
//! field parses as a number is treated as headerless. Either way, a table as
//! wide as the registry schema ends up with the registry's column names, so
//! headered and headerless segments of one series line up.

use polars::prelude::*;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;
use thiserror::Error;
use ::zip::ZipArchive;

use crate::domain::StorageFormat;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("zip: {0}")]
    Zip(#[from] ::zip::result::ZipError),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error("archive contains no csv table")]
    NoCsvInArchive,

    #[error("headerless table has {found} columns, expected {expected}")]
    ColumnCount { expected: usize, found: usize },
}

/// Read `path` as `format`. `columns` names the columns of CSV tables; a
/// headered table of a different width keeps its own names.
pub fn read_segment(
    path: &Path,
    format: StorageFormat,
    columns: Option<&[&str]>,
) -> Result<DataFrame, ReadError> {
    match format {
        StorageFormat::Parquet => Ok(ParquetReader::new(File::open(path)?).finish()?),
        StorageFormat::Csv => read_csv_bytes(fs::read(path)?, columns),
        StorageFormat::Zip => read_csv_bytes(read_zipped_csv(path)?, columns),
    }
}

fn read_zipped_csv(path: &Path) -> Result<Vec<u8>, ReadError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let name = archive
        .file_names()
        .find(|n| n.to_ascii_lowercase().ends_with(".csv"))
        .map(str::to_owned)
        .ok_or(ReadError::NoCsvInArchive)?;
    let mut entry = archive.by_name(&name)?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_csv_bytes(bytes: Vec<u8>, columns: Option<&[&str]>) -> Result<DataFrame, ReadError> {
    let has_header = has_header_row(&bytes);
    let mut df = CsvReadOptions::default()
        .with_has_header(has_header)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    if let Some(columns) = columns {
        if df.width() == columns.len() {
            df.set_column_names(columns.iter().copied())?;
        } else if !has_header {
            return Err(ReadError::ColumnCount {
                expected: columns.len(),
                found: df.width(),
            });
        }
    }
    Ok(df)
}

/// True unless the first field of the first line is numeric.
pub fn has_header_row(bytes: &[u8]) -> bool {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let first_field = first_line.split(|&b| b == b',').next().unwrap_or_default();
    match std::str::from_utf8(first_field) {
        Ok(field) => {
            let field = field.trim().trim_start_matches('\u{feff}');
            field.is_empty() || field.parse::<f64>().is_err()
        }
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_first_field_means_headerless() {
        assert!(!has_header_row(b"1,0.5,2\n2,0.6,3\n"));
        assert!(!has_header_row(b"1704067200000,42000.1\n"));
        assert!(has_header_row(b"agg_trade_id,price\n1,0.5\n"));
        assert!(has_header_row(b"\xef\xbb\xbfid,price\n"));
    }

    #[test]
    fn headerless_table_gets_registry_names() {
        let df = read_csv_bytes(b"1,0.5\n2,0.6\n".to_vec(), Some(&["id", "price"])).unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["id", "price"]);
    }

    #[test]
    fn header_row_is_renamed_to_registry_names() {
        let df = read_csv_bytes(b"agg_trade_id,price\n1,2\n".to_vec(), Some(&["agg_id", "price"])).unwrap();
        assert_eq!(df.height(), 1);
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["agg_id", "price"]);
    }

    #[test]
    fn header_row_of_other_width_is_kept() {
        let df = read_csv_bytes(b"a,b,c\n1,2,3\n".to_vec(), Some(&["id", "price"])).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let df = read_csv_bytes(b"a,b\n1,2\n".to_vec(), None).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        let err = read_csv_bytes(b"1,2,3\n".to_vec(), Some(&["id", "price"])).unwrap_err();
        assert!(matches!(err, ReadError::ColumnCount { expected: 2, found: 3 }));
    }
}
